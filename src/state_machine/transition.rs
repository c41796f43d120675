//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! new state and effects. All I/O (transcript, model calls, timers, client
//! notifications) happens in the runtime by executing the returned effects.

use super::state::Interview;
use super::{ConvContext, ConvState, Effect, Event};
use crate::llm::LlmErrorKind;
use crate::prompt::assemble_prompt;
use crate::trip::ValidationError;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Total generation attempts (first request plus retries)
pub const MAX_GENERATION_ATTEMPTS: u32 = 3;

/// Upper bound on any retry delay, including server-provided hints
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

const GENERATING_MESSAGE: &str = "Creating your perfect itinerary...";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    /// Input rejected without changing state
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("No interview in progress")]
    NoActiveInterview,
    #[error("Itinerary is being generated, wait for it to finish or cancel first")]
    GenerationInProgress,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl TransitionError {
    /// Validation failures are absorbed at the boundary rather than reported
    pub fn is_validation(&self) -> bool {
        matches!(self, TransitionError::Validation(_))
    }
}

/// Pure transition function
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Starting an interview
        // ============================================================

        // A start while answering discards the unfinished interview; the
        // outcome is identical to starting from Idle.
        (ConvState::Idle | ConvState::AwaitingAnswer { .. }, Event::Start { metadata }) => {
            let first_question = context.questions.get(0).ok_or_else(|| {
                TransitionError::InvalidTransition("question list is empty".to_string())
            })?;
            let greeting = metadata.greeting(first_question);
            let total_steps = context.questions.len();

            Ok(TransitionResult::new(ConvState::AwaitingAnswer {
                step: 0,
                interview: Interview::new(metadata),
            })
            .with_effect(Effect::ResetTranscript)
            .with_effect(Effect::append_assistant(greeting))
            .with_effect(Effect::notify_state_change(
                "awaiting_answer",
                json!({ "step": 0, "total_steps": total_steps }),
            )))
        }

        (ConvState::Finalizing { .. }, Event::Start { .. }) => {
            Err(TransitionError::GenerationInProgress)
        }

        // ============================================================
        // Answering questions
        // ============================================================
        (ConvState::AwaitingAnswer { step, interview }, Event::Answer { text }) => {
            if text.trim().is_empty() {
                return Err(ValidationError::EmptyAnswer.into());
            }
            let question = context.questions.get(*step).ok_or_else(|| {
                TransitionError::InvalidTransition(format!("step {step} has no question"))
            })?;

            let mut interview = interview.clone();
            interview.responses.insert(question, text.clone());
            let next_step = step + 1;

            if let Some(next_question) = context.questions.get(next_step) {
                Ok(TransitionResult::new(ConvState::AwaitingAnswer {
                    step: next_step,
                    interview,
                })
                .with_effect(Effect::append_user(text))
                .with_effect(Effect::append_assistant(next_question))
                .with_effect(Effect::notify_state_change(
                    "awaiting_answer",
                    json!({ "step": next_step, "total_steps": context.questions.len() }),
                )))
            } else {
                let prompt = assemble_prompt(&interview.responses);
                Ok(
                    TransitionResult::new(ConvState::Finalizing {
                        interview,
                        attempt: 1,
                    })
                    .with_effect(Effect::append_user(text))
                    .with_effect(Effect::RequestGeneration { prompt })
                    .with_effect(Effect::notify_state_change(
                        "finalizing",
                        json!({ "attempt": 1, "message": GENERATING_MESSAGE }),
                    )),
                )
            }
        }

        (ConvState::Idle, Event::Answer { .. }) => Err(TransitionError::NoActiveInterview),

        (ConvState::Finalizing { .. }, Event::Answer { .. }) => {
            Err(TransitionError::GenerationInProgress)
        }

        // ============================================================
        // Generation results
        // ============================================================
        (ConvState::Finalizing { .. }, Event::GenerationComplete { itinerary }) => {
            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::append_assistant(itinerary))
                .with_effect(Effect::notify_itinerary_ready()))
        }

        // Retryable failure with attempts left -> back off and try again
        (
            ConvState::Finalizing { interview, attempt },
            Event::GenerationFailed {
                error_kind,
                attempt: failed_attempt,
                retry_after,
                ..
            },
        ) if failed_attempt == *attempt && should_retry(error_kind, *attempt) =>
        {
            let new_attempt = attempt + 1;
            let delay = retry_after
                .unwrap_or_else(|| retry_delay(new_attempt))
                .min(MAX_RETRY_DELAY);

            Ok(TransitionResult::new(ConvState::Finalizing {
                interview: interview.clone(),
                attempt: new_attempt,
            })
            .with_effect(Effect::ScheduleRetry {
                delay,
                attempt: new_attempt,
            })
            .with_effect(Effect::notify_state_change(
                "finalizing",
                json!({
                    "attempt": new_attempt,
                    "max_attempts": MAX_GENERATION_ATTEMPTS,
                    "message": format!("Retrying... (attempt {new_attempt})")
                }),
            )))
        }

        // Non-retryable or exhausted -> give up, back to Idle
        (
            ConvState::Finalizing { attempt, .. },
            Event::GenerationFailed {
                message,
                error_kind,
                attempt: failed_attempt,
                ..
            },
        ) if failed_attempt == *attempt => {
            let error_message = if error_kind.is_retryable() {
                format!("Failed after {attempt} attempts: {message}")
            } else {
                message
            };

            Ok(TransitionResult::new(ConvState::Idle)
                .with_effect(Effect::append_failure(format!(
                    "Sorry, I couldn't create your itinerary: {error_message}"
                )))
                .with_effect(Effect::notify_error(error_message)))
        }

        (ConvState::Finalizing { interview, attempt }, Event::RetryTimeout { attempt: retry })
            if retry == *attempt =>
        {
            Ok(TransitionResult::new(ConvState::Finalizing {
                interview: interview.clone(),
                attempt: *attempt,
            })
            .with_effect(Effect::RequestGeneration {
                prompt: assemble_prompt(&interview.responses),
            }))
        }

        // ============================================================
        // Cancellation
        // ============================================================
        (ConvState::AwaitingAnswer { .. }, Event::Cancel) => Ok(TransitionResult::new(
            ConvState::Idle,
        )
        .with_effect(Effect::append_assistant("Trip planning cancelled."))
        .with_effect(Effect::notify_state_change("idle", json!({})))),

        (ConvState::Finalizing { .. }, Event::Cancel) => Ok(TransitionResult::new(ConvState::Idle)
            .with_effect(Effect::AbortGeneration)
            .with_effect(Effect::append_assistant("Itinerary generation cancelled."))
            .with_effect(Effect::notify_state_change("idle", json!({})))),

        (ConvState::Idle, Event::Cancel) => Err(TransitionError::NoActiveInterview),

        // ============================================================
        // Everything else (late or stale generation events)
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "{event:?} is not valid in state {}",
            state.name()
        ))),
    }
}

/// Delay before the given attempt: 1s before the second, 2s before the third
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(2).min(6))
}

/// Whether a failed attempt should be followed by another one
pub fn should_retry(kind: LlmErrorKind, attempt: u32) -> bool {
    kind.is_retryable() && attempt < MAX_GENERATION_ATTEMPTS
}
