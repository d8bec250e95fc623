use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{orchestrator::Action, quiz::QuizPhase};

pub const TRANSPORT_ERROR_TEXT: &str = "Error connecting to the study server.";
pub const READING_NOTES_ERROR_TEXT: &str = "Sorry, I encountered an error reading the notes.";
pub const UPLOAD_FIRST_TEXT: &str =
    "Please upload at least one PDF file first so I have context to answer you!";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("failed to reach study server: {0}")]
    Transport(String),
    #[error("study server responded with status {status}")]
    Status { status: u16 },
    #[error("failed to decode study server response: {0}")]
    Decode(String),
}

impl BackendError {
    /// Fixed text recorded as `last_error` for the presentation layer.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport(_) => TRANSPORT_ERROR_TEXT.to_string(),
            Self::Status { status } => {
                format!("The study server reported an error (status {status}).")
            }
            Self::Decode(_) => "The study server returned an unreadable response.".to_string(),
        }
    }

    /// Assistant reply appended to the conversation when a question fails.
    /// A reachable server that refuses the question points at the notes;
    /// anything else points at the connection.
    pub fn chat_fallback(&self) -> &'static str {
        match self {
            Self::Status { .. } => READING_NOTES_ERROR_TEXT,
            Self::Transport(_) | Self::Decode(_) => TRANSPORT_ERROR_TEXT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    #[error("{action} request already in flight")]
    AlreadyInFlight { action: Action },
    #[error(transparent)]
    Failed(#[from] BackendError),
}

impl OrchestratorError {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::AlreadyInFlight { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    #[error("document name must not be empty")]
    EmptyName,
    #[error("document '{0}' is already in the corpus")]
    Duplicate(String),
    #[error("an upload is already in progress")]
    InFlight,
    #[error("upload failed: {0}")]
    Request(BackendError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidStateError {
    #[error("quiz cannot be submitted while {phase:?}")]
    NotReady { phase: QuizPhase },
    #[error("only {answered} of {total} questions answered")]
    Incomplete { answered: usize, total: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid server url '{value}': {reason}")]
    InvalidServerUrl { value: String, reason: String },
}
