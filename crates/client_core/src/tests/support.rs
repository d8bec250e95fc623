//! Scripted in-memory backend shared by the unit tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use shared::domain::{FlashcardItem, QuizItem};
use tokio::sync::{broadcast, Mutex, Notify};

use crate::{
    error::BackendError,
    events::SessionEvent,
    transport::{StudyBackend, UploadFile},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Upload(String),
    Ask(String),
    Flashcards,
    Quiz,
}

/// Replies are popped from per-operation queues; an empty queue yields a
/// default success. When `hold` is set every call parks until `release`.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    calls: Mutex<Vec<Call>>,
    upload_replies: Mutex<VecDeque<Result<(), BackendError>>>,
    ask_replies: Mutex<VecDeque<Result<String, BackendError>>>,
    flashcard_replies: Mutex<VecDeque<Result<Vec<FlashcardItem>, BackendError>>>,
    quiz_replies: Mutex<VecDeque<Result<Vec<QuizItem>, BackendError>>>,
    hold: AtomicBool,
    pub started: Notify,
    gate: Notify,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn held() -> Arc<Self> {
        let backend = Self::default();
        backend.hold.store(true, Ordering::SeqCst);
        Arc::new(backend)
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn push_upload(&self, reply: Result<(), BackendError>) {
        self.upload_replies.lock().await.push_back(reply);
    }

    pub async fn push_ask(&self, reply: Result<String, BackendError>) {
        self.ask_replies.lock().await.push_back(reply);
    }

    pub async fn push_flashcards(&self, reply: Result<Vec<FlashcardItem>, BackendError>) {
        self.flashcard_replies.lock().await.push_back(reply);
    }

    pub async fn push_quiz(&self, reply: Result<Vec<QuizItem>, BackendError>) {
        self.quiz_replies.lock().await.push_back(reply);
    }

    async fn enter(&self, call: Call) {
        self.calls.lock().await.push(call);
        self.started.notify_one();
        if self.hold.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
    }
}

#[async_trait]
impl StudyBackend for ScriptedBackend {
    async fn upload_document(&self, file: UploadFile) -> Result<(), BackendError> {
        self.enter(Call::Upload(file.name)).await;
        self.upload_replies
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn ask(&self, query: &str) -> Result<String, BackendError> {
        self.enter(Call::Ask(query.to_string())).await;
        self.ask_replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(format!("answer to {query}")))
    }

    async fn generate_flashcards(&self) -> Result<Vec<FlashcardItem>, BackendError> {
        self.enter(Call::Flashcards).await;
        self.flashcard_replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(sample_cards(3)))
    }

    async fn generate_quiz(&self) -> Result<Vec<QuizItem>, BackendError> {
        self.enter(Call::Quiz).await;
        self.quiz_replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(sample_quiz(3)))
    }
}

pub(crate) fn events() -> broadcast::Sender<SessionEvent> {
    broadcast::channel(64).0
}

pub(crate) fn sample_cards(count: usize) -> Vec<FlashcardItem> {
    (0..count)
        .map(|i| FlashcardItem {
            front: format!("term {i}"),
            back: format!("definition {i}"),
        })
        .collect()
}

/// Question `i` has options `a{i}`..`d{i}` with `b{i}` correct.
pub(crate) fn sample_quiz(count: usize) -> Vec<QuizItem> {
    (0..count)
        .map(|i| QuizItem {
            question: format!("question {i}"),
            options: ["a", "b", "c", "d"]
                .iter()
                .map(|letter| format!("{letter}{i}"))
                .collect(),
            correct_answer: format!("b{i}"),
        })
        .collect()
}

pub(crate) fn transport_down() -> BackendError {
    BackendError::Transport("connection refused".into())
}
