use std::sync::Arc;

use shared::domain::FlashcardItem;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info};

use crate::{
    error::OrchestratorError,
    events::SessionEvent,
    orchestrator::{Action, RequestOrchestrator, RequestStatus},
    transport::StudyBackend,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardView {
    pub card: FlashcardItem,
    pub flipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardSnapshot {
    pub cards: Vec<FlashcardView>,
    pub request: RequestStatus,
}

#[derive(Default)]
struct DeckState {
    cards: Vec<FlashcardItem>,
    flipped: Vec<bool>,
}

pub struct FlashcardDeck {
    backend: Arc<dyn StudyBackend>,
    orchestrator: RequestOrchestrator,
    state: Mutex<DeckState>,
    events: broadcast::Sender<SessionEvent>,
}

impl FlashcardDeck {
    pub fn new(backend: Arc<dyn StudyBackend>, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            backend,
            orchestrator: RequestOrchestrator::new(Action::GenerateFlashcards, events.clone()),
            state: Mutex::new(DeckState::default()),
            events,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.orchestrator.is_in_flight()
    }

    /// Replaces the whole set with a freshly generated one and returns its
    /// size. An empty result keeps the current set and returns 0.
    pub async fn generate(&self) -> Result<usize, OrchestratorError> {
        self.orchestrator
            .run(|| async move {
                let cards = self.backend.generate_flashcards().await?;
                if cards.is_empty() {
                    debug!("flashcard generation returned no cards; keeping current set");
                    return Ok(0);
                }

                let count = cards.len();
                {
                    let mut state = self.state.lock().await;
                    state.flipped = vec![false; count];
                    state.cards = cards;
                }
                info!(count, "flashcards replaced");
                let _ = self.events.send(SessionEvent::FlashcardsReplaced { count });
                Ok(count)
            })
            .await
    }

    /// Turns a card over. Returns the new side, or `None` for an unknown index.
    pub async fn flip(&self, index: usize) -> Option<bool> {
        let mut state = self.state.lock().await;
        let flipped = state.flipped.get_mut(index)?;
        *flipped = !*flipped;
        Some(*flipped)
    }

    pub async fn cards(&self) -> Vec<FlashcardItem> {
        self.state.lock().await.cards.clone()
    }

    pub async fn snapshot(&self) -> FlashcardSnapshot {
        let cards = {
            let state = self.state.lock().await;
            state
                .cards
                .iter()
                .zip(&state.flipped)
                .map(|(card, flipped)| FlashcardView {
                    card: card.clone(),
                    flipped: *flipped,
                })
                .collect()
        };
        FlashcardSnapshot {
            cards,
            request: self.orchestrator.status().await,
        }
    }
}

#[cfg(test)]
#[path = "tests/flashcards_tests.rs"]
mod tests;
