use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::domain::Message;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::{
    config::ChatConfig,
    error::{OrchestratorError, TRANSPORT_ERROR_TEXT, UPLOAD_FIRST_TEXT},
    events::SessionEvent,
    orchestrator::{Action, RequestOrchestrator, RequestStatus},
    transport::StudyBackend,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank input; nothing was appended.
    Empty,
    /// A previous question is still waiting for its reply; nothing was appended.
    Busy,
    /// No documents yet; the canned upload prompt was appended.
    NeedsDocuments,
    Answered,
    /// The question failed and a fallback reply was appended.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub awaiting_reply: bool,
    pub request: RequestStatus,
}

pub struct ConversationLog {
    backend: Arc<dyn StudyBackend>,
    orchestrator: RequestOrchestrator,
    messages: Mutex<Vec<Message>>,
    awaiting_reply: AtomicBool,
    canned_reply_delay: Duration,
    events: broadcast::Sender<SessionEvent>,
}

impl ConversationLog {
    pub fn new(
        backend: Arc<dyn StudyBackend>,
        config: &ChatConfig,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let messages = config
            .greeting
            .iter()
            .map(|greeting| Message::assistant(greeting.clone()))
            .collect();
        Self {
            backend,
            orchestrator: RequestOrchestrator::new(Action::Ask, events.clone()),
            messages: Mutex::new(messages),
            awaiting_reply: AtomicBool::new(false),
            canned_reply_delay: config.canned_reply_delay,
            events,
        }
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }

    pub async fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: self.messages().await,
            awaiting_reply: self.awaiting_reply.load(Ordering::Acquire),
            request: self.orchestrator.status().await,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.orchestrator.is_in_flight()
    }

    /// Appends the question, then exactly one assistant reply.
    ///
    /// `has_documents` is read from the corpus by the caller at send time.
    pub async fn send(&self, query: &str, has_documents: bool) -> SendOutcome {
        if query.trim().is_empty() {
            debug!("ignoring blank question");
            return SendOutcome::Empty;
        }

        if self
            .awaiting_reply
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("ignoring question while previous reply is pending");
            return SendOutcome::Busy;
        }
        let mut pending = PendingReply {
            log: self,
            question_at: None,
        };

        {
            let mut messages = self.messages.lock().await;
            messages.push(Message::user(query));
            pending.question_at = Some(messages.len() - 1);
        }
        let _ = self
            .events
            .send(SessionEvent::MessageAppended(Message::user(query)));

        let outcome = if has_documents {
            self.ask_backend(query).await
        } else {
            tokio::time::sleep(self.canned_reply_delay).await;
            self.append_reply(Message::assistant(UPLOAD_FIRST_TEXT))
                .await;
            SendOutcome::NeedsDocuments
        };

        drop(pending);
        outcome
    }

    async fn ask_backend(&self, query: &str) -> SendOutcome {
        let result = self
            .orchestrator
            .run(|| async move {
                let answer = self.backend.ask(query).await;
                let reply = match &answer {
                    Ok(text) => Message::assistant(text.clone()),
                    Err(err) => Message::assistant(err.chat_fallback()),
                };
                self.append_reply(reply).await;
                answer
            })
            .await;

        match result {
            Ok(_) => SendOutcome::Answered,
            Err(OrchestratorError::AlreadyInFlight { .. }) => {
                // awaiting_reply is only cleared after the guard is released,
                // so this is not expected; the question still gets its reply.
                self.append_reply(Message::assistant(TRANSPORT_ERROR_TEXT))
                    .await;
                SendOutcome::Failed
            }
            Err(OrchestratorError::Failed(_)) => SendOutcome::Failed,
        }
    }

    async fn append_reply(&self, reply: Message) {
        self.messages.lock().await.push(reply.clone());
        let _ = self.events.send(SessionEvent::MessageAppended(reply));
    }
}

/// Clears `awaiting_reply` however `send` ends. If the send is dropped
/// after its question was logged but before a reply landed, the question
/// gets the connection fallback so it is never left unanswered.
struct PendingReply<'a> {
    log: &'a ConversationLog,
    question_at: Option<usize>,
}

impl Drop for PendingReply<'_> {
    fn drop(&mut self) {
        if let Some(question_at) = self.question_at {
            match self.log.messages.try_lock() {
                Ok(mut messages) if messages.len() == question_at + 1 => {
                    let reply = Message::assistant(TRANSPORT_ERROR_TEXT);
                    messages.push(reply.clone());
                    drop(messages);
                    warn!("question abandoned before its reply; appended connection fallback");
                    let _ = self.log.events.send(SessionEvent::MessageAppended(reply));
                }
                Ok(_) => {}
                Err(_) => warn!("question abandoned while the log was locked; reply not appended"),
            }
        }
        self.log.awaiting_reply.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "tests/conversation_tests.rs"]
mod tests;
