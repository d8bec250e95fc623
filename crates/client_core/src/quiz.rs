//! Quiz lifecycle: `Idle -> Generating -> Ready -> Scored`.
//!
//! `Ready` covers both answering and "all answered, not submitted yet".
//! Answers freeze once the quiz is scored; generating again starts over.

use std::{collections::BTreeMap, sync::Arc};

use shared::domain::QuizItem;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{InvalidStateError, OrchestratorError},
    events::SessionEvent,
    orchestrator::{Action, RequestOrchestrator, RequestStatus},
    transport::StudyBackend,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    Idle,
    Generating,
    Ready,
    Scored,
}

/// How an option should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionMark {
    Unselected,
    Selected,
    Correct,
    WrongSelection,
    Dimmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionReview {
    pub selected: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizSnapshot {
    pub phase: QuizPhase,
    pub items: Vec<QuizItem>,
    pub answers: BTreeMap<usize, String>,
    pub score: Option<usize>,
    pub request: RequestStatus,
}

impl QuizSnapshot {
    pub fn can_submit(&self) -> bool {
        self.phase == QuizPhase::Ready && all_answered(&self.answers, self.items.len())
    }

    pub fn option_mark(&self, question: usize, option: &str) -> OptionMark {
        let Some(item) = self.items.get(question) else {
            return OptionMark::Unselected;
        };
        let selected = self.answers.get(&question).map(String::as_str);

        if self.score.is_some() {
            if option == item.correct_answer {
                OptionMark::Correct
            } else if selected == Some(option) {
                OptionMark::WrongSelection
            } else {
                OptionMark::Dimmed
            }
        } else if selected == Some(option) {
            OptionMark::Selected
        } else {
            OptionMark::Unselected
        }
    }

    /// Per-question outcome, available once the quiz is scored.
    pub fn review(&self) -> Option<Vec<QuestionReview>> {
        self.score?;
        Some(
            self.items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let selected = self.answers.get(&index).cloned();
                    QuestionReview {
                        is_correct: selected.as_deref().is_some_and(|s| item.is_correct(s)),
                        selected,
                        correct_answer: item.correct_answer.clone(),
                    }
                })
                .collect(),
        )
    }
}

struct QuizState {
    phase: QuizPhase,
    items: Vec<QuizItem>,
    answers: BTreeMap<usize, String>,
    score: Option<usize>,
}

pub struct QuizSession {
    backend: Arc<dyn StudyBackend>,
    orchestrator: RequestOrchestrator,
    state: Mutex<QuizState>,
    events: broadcast::Sender<SessionEvent>,
}

fn all_answered(answers: &BTreeMap<usize, String>, total: usize) -> bool {
    (0..total).all(|index| answers.contains_key(&index))
}

fn score_answers(items: &[QuizItem], answers: &BTreeMap<usize, String>) -> usize {
    items
        .iter()
        .enumerate()
        .filter(|(index, item)| {
            answers
                .get(index)
                .is_some_and(|answer| item.is_correct(answer))
        })
        .count()
}

/// The phase a quiz with this content rests in when nothing is generating.
fn settled_phase(state: &QuizState) -> QuizPhase {
    if state.score.is_some() {
        QuizPhase::Scored
    } else if state.items.is_empty() {
        QuizPhase::Idle
    } else {
        QuizPhase::Ready
    }
}

/// Restores the pre-generation phase if `generate` is dropped while its
/// request is still out.
struct GeneratingPhase<'a> {
    quiz: &'a QuizSession,
    previous: QuizPhase,
    settled: bool,
}

impl Drop for GeneratingPhase<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let Ok(mut state) = self.quiz.state.try_lock() else {
            warn!("quiz generation abandoned while state was locked");
            return;
        };
        if state.phase == QuizPhase::Generating {
            state.phase = self.previous;
            drop(state);
            warn!(phase = ?self.previous, "quiz generation abandoned; phase restored");
            self.quiz.notify(self.previous);
        }
    }
}

impl QuizSession {
    pub fn new(backend: Arc<dyn StudyBackend>, events: broadcast::Sender<SessionEvent>) -> Self {
        Self {
            backend,
            orchestrator: RequestOrchestrator::new(Action::GenerateQuiz, events.clone()),
            state: Mutex::new(QuizState {
                phase: QuizPhase::Idle,
                items: Vec::new(),
                answers: BTreeMap::new(),
                score: None,
            }),
            events,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.orchestrator.is_in_flight()
    }

    pub async fn phase(&self) -> QuizPhase {
        self.state.lock().await.phase
    }

    fn notify(&self, phase: QuizPhase) {
        let _ = self.events.send(SessionEvent::QuizChanged(phase));
    }

    /// Requests a new quiz and returns its length.
    ///
    /// On failure, or when the backend returns no questions, the previous
    /// phase and quiz are restored untouched.
    pub async fn generate(&self) -> Result<usize, OrchestratorError> {
        self.orchestrator
            .run(|| async move {
                let previous = {
                    let mut state = self.state.lock().await;
                    let previous = match state.phase {
                        QuizPhase::Generating => settled_phase(&state),
                        phase => phase,
                    };
                    state.phase = QuizPhase::Generating;
                    previous
                };
                self.notify(QuizPhase::Generating);
                let mut generating = GeneratingPhase {
                    quiz: self,
                    previous,
                    settled: false,
                };

                let result = self.backend.generate_quiz().await;

                let mut state = self.state.lock().await;
                generating.settled = true;
                match result {
                    Ok(items) if !items.is_empty() => {
                        let count = items.len();
                        state.items = items;
                        state.answers.clear();
                        state.score = None;
                        state.phase = QuizPhase::Ready;
                        drop(state);
                        info!(count, "quiz ready");
                        self.notify(QuizPhase::Ready);
                        Ok(count)
                    }
                    Ok(_) => {
                        state.phase = previous;
                        drop(state);
                        debug!("quiz generation returned no questions; keeping current quiz");
                        self.notify(previous);
                        Ok(0)
                    }
                    Err(err) => {
                        state.phase = previous;
                        drop(state);
                        self.notify(previous);
                        Err(err)
                    }
                }
            })
            .await
    }

    /// Records or overwrites the answer for one question. Ignored unless the
    /// quiz is ready and unscored, or when `index` is out of range.
    pub async fn select_answer(&self, index: usize, option: impl Into<String>) -> bool {
        let mut state = self.state.lock().await;
        if state.phase != QuizPhase::Ready || state.score.is_some() {
            debug!(index, phase = ?state.phase, "answer ignored; quiz not accepting answers");
            return false;
        }
        if index >= state.items.len() {
            debug!(index, total = state.items.len(), "answer ignored; no such question");
            return false;
        }
        state.answers.insert(index, option.into());
        true
    }

    /// Scores the quiz once every question has an answer. Submitting an
    /// already scored quiz returns the cached score.
    pub async fn submit(&self) -> Result<usize, InvalidStateError> {
        let mut state = self.state.lock().await;
        match state.phase {
            QuizPhase::Scored => {
                if let Some(score) = state.score {
                    return Ok(score);
                }
            }
            QuizPhase::Ready => {}
            phase => return Err(InvalidStateError::NotReady { phase }),
        }

        let total = state.items.len();
        if !all_answered(&state.answers, total) {
            let answered = (0..total)
                .filter(|index| state.answers.contains_key(index))
                .count();
            return Err(InvalidStateError::Incomplete { answered, total });
        }

        let score = score_answers(&state.items, &state.answers);
        state.score = Some(score);
        state.phase = QuizPhase::Scored;
        drop(state);

        info!(score, total, "quiz submitted");
        self.notify(QuizPhase::Scored);
        Ok(score)
    }

    pub async fn snapshot(&self) -> QuizSnapshot {
        let (phase, items, answers, score) = {
            let state = self.state.lock().await;
            (
                state.phase,
                state.items.clone(),
                state.answers.clone(),
                state.score,
            )
        };
        QuizSnapshot {
            phase,
            items,
            answers,
            score,
            request: self.orchestrator.status().await,
        }
    }
}

#[cfg(test)]
#[path = "tests/quiz_tests.rs"]
mod tests;
