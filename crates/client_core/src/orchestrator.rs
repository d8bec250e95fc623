//! Single-flight wrapper around one network-bound action.
//!
//! Each logical action (upload, ask, flashcards, quiz) owns one
//! [`RequestOrchestrator`]. A call made while the previous one is still
//! outstanding is skipped, never queued.

use std::{
    fmt,
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::{BackendError, OrchestratorError},
    events::SessionEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Upload,
    Ask,
    GenerateFlashcards,
    GenerateQuiz,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Ask => "ask",
            Self::GenerateFlashcards => "generate_flashcards",
            Self::GenerateQuiz => "generate_quiz",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestStatus {
    pub in_flight: bool,
    pub last_error: Option<String>,
}

pub struct RequestOrchestrator {
    action: Action,
    in_flight: AtomicBool,
    last_error: Mutex<Option<String>>,
    events: broadcast::Sender<SessionEvent>,
}

/// Clears the in-flight flag when dropped, including when the request
/// future is dropped before it settles.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl RequestOrchestrator {
    pub fn new(action: Action, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            action,
            in_flight: AtomicBool::new(false),
            last_error: Mutex::new(None),
            events,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn last_error(&self) -> Option<String> {
        self.last_error.lock().await.clone()
    }

    pub async fn status(&self) -> RequestStatus {
        RequestStatus {
            in_flight: self.is_in_flight(),
            last_error: self.last_error().await,
        }
    }

    fn try_acquire(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                flag: &self.in_flight,
            })
    }

    /// Runs `producer` unless a request for this action is already
    /// outstanding. The producer is expected to perform exactly one
    /// network call and commit its own state before returning; the guard
    /// stays held until then.
    pub async fn run<T, F, Fut>(&self, producer: F) -> Result<T, OrchestratorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let Some(_guard) = self.try_acquire() else {
            debug!(action = %self.action, "request skipped; already in flight");
            return Err(OrchestratorError::AlreadyInFlight {
                action: self.action,
            });
        };

        *self.last_error.lock().await = None;

        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let result = producer().await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(value) => {
                info!(
                    action = %self.action,
                    %request_id,
                    latency_ms,
                    success = true,
                    "request completed"
                );
                Ok(value)
            }
            Err(err) => {
                let message = err.user_message();
                warn!(
                    action = %self.action,
                    %request_id,
                    latency_ms,
                    success = false,
                    error = %err,
                    "request failed"
                );
                *self.last_error.lock().await = Some(message.clone());
                let _ = self.events.send(SessionEvent::RequestFailed {
                    action: self.action,
                    message,
                });
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
