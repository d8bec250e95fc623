use std::sync::Arc;

use shared::domain::Document;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

pub mod config;
pub mod conversation;
pub mod corpus;
pub mod error;
pub mod events;
pub mod flashcards;
pub mod orchestrator;
pub mod quiz;
pub mod transport;

pub use config::{load_config, ChatConfig, ClientConfig};
pub use conversation::{ConversationLog, ConversationSnapshot, SendOutcome};
pub use corpus::CorpusRegistry;
pub use error::{BackendError, InvalidStateError, OrchestratorError, UploadError};
pub use events::SessionEvent;
pub use flashcards::{FlashcardDeck, FlashcardSnapshot, FlashcardView};
pub use orchestrator::{Action, RequestOrchestrator, RequestStatus};
pub use quiz::{OptionMark, QuestionReview, QuizPhase, QuizSession, QuizSnapshot};
pub use transport::{HttpBackend, MissingStudyBackend, StudyBackend, UploadFile};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Which study mode the presentation layer has in front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Chat,
    Flashcards,
    Quiz,
}

/// Immutable view of the whole session for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub documents: Vec<String>,
    pub upload: RequestStatus,
    pub conversation: ConversationSnapshot,
    pub flashcards: FlashcardSnapshot,
    pub quiz: QuizSnapshot,
}

/// Entry point for user intents. Each intent is validated against current
/// state and delegated to the component that owns the affected data.
pub struct StudySession {
    corpus: CorpusRegistry,
    upload: RequestOrchestrator,
    conversation: ConversationLog,
    flashcards: FlashcardDeck,
    quiz: QuizSession,
    mode: Mutex<Mode>,
    events: broadcast::Sender<SessionEvent>,
}

impl StudySession {
    pub fn new(backend: Arc<dyn StudyBackend>, chat: &ChatConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            corpus: CorpusRegistry::new(Arc::clone(&backend), events.clone()),
            upload: RequestOrchestrator::new(Action::Upload, events.clone()),
            conversation: ConversationLog::new(Arc::clone(&backend), chat, events.clone()),
            flashcards: FlashcardDeck::new(Arc::clone(&backend), events.clone()),
            quiz: QuizSession::new(backend, events.clone()),
            mode: Mutex::new(Mode::default()),
            events,
        })
    }

    /// Builds a session talking HTTP to the configured server.
    pub fn connect(config: &ClientConfig) -> Result<Arc<Self>, BackendError> {
        let backend = HttpBackend::new(config)?;
        info!(server_url = %backend.server_url(), "study session created");
        Ok(Self::new(Arc::new(backend), &config.chat))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn corpus(&self) -> &CorpusRegistry {
        &self.corpus
    }

    pub fn conversation(&self) -> &ConversationLog {
        &self.conversation
    }

    pub fn flashcards(&self) -> &FlashcardDeck {
        &self.flashcards
    }

    pub fn quiz(&self) -> &QuizSession {
        &self.quiz
    }

    pub async fn mode(&self) -> Mode {
        *self.mode.lock().await
    }

    /// Switching modes never cancels work started in another mode.
    pub async fn set_mode(&self, mode: Mode) {
        let changed = {
            let mut current = self.mode.lock().await;
            std::mem::replace(&mut *current, mode) != mode
        };
        if changed {
            let _ = self.events.send(SessionEvent::ModeChanged(mode));
        }
    }

    pub async fn upload_file(&self, file: UploadFile) -> Result<Document, UploadError> {
        self.corpus.check_new(&file.name).await?;

        let registered = self
            .upload
            .run(|| async move {
                // Only network failures count against the orchestrator; a
                // name that raced in during the upload is a validation error.
                match self.corpus.register_upload(file).await {
                    Err(UploadError::Request(err)) => Err(err),
                    other => Ok(other),
                }
            })
            .await;

        match registered {
            Ok(result) => result,
            Err(OrchestratorError::AlreadyInFlight { .. }) => Err(UploadError::InFlight),
            Err(OrchestratorError::Failed(err)) => Err(UploadError::Request(err)),
        }
    }

    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let has_documents = !self.corpus.is_empty().await;
        self.conversation.send(text, has_documents).await
    }

    pub async fn generate_flashcards(&self) -> Result<usize, OrchestratorError> {
        self.flashcards.generate().await
    }

    pub async fn flip_flashcard(&self, index: usize) -> Option<bool> {
        self.flashcards.flip(index).await
    }

    pub async fn generate_quiz(&self) -> Result<usize, OrchestratorError> {
        self.quiz.generate().await
    }

    pub async fn select_answer(&self, index: usize, option: impl Into<String>) -> bool {
        self.quiz.select_answer(index, option).await
    }

    pub async fn submit_quiz(&self) -> Result<usize, InvalidStateError> {
        self.quiz.submit().await
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode().await,
            documents: self.corpus.list_documents().await,
            upload: self.upload.status().await,
            conversation: self.conversation.snapshot().await,
            flashcards: self.flashcards.snapshot().await,
            quiz: self.quiz.snapshot().await,
        }
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
