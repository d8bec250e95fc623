//! Change notifications broadcast to the presentation layer.

use shared::domain::{Document, Message};

use crate::{orchestrator::Action, quiz::QuizPhase, Mode};

#[derive(Debug, Clone)]
pub enum SessionEvent {
    DocumentAdded(Document),
    MessageAppended(Message),
    FlashcardsReplaced { count: usize },
    QuizChanged(QuizPhase),
    RequestFailed { action: Action, message: String },
    ModeChanged(Mode),
}
