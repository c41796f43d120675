//! Session runtime executor

use super::traits::LlmClient;
use super::{SessionCommand, SessionView, SseEvent};

use crate::llm::{LlmError, LlmRequest};
use crate::state_machine::{
    transition, ConvContext, ConvState, Effect, Event, TranscriptEntry, TransitionError,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Owns one session's state and transcript, executing effects produced by
/// the state machine
pub struct SessionRuntime<L: LlmClient + 'static> {
    context: ConvContext,
    state: ConvState,
    transcript: Vec<TranscriptEntry>,
    llm_client: Arc<L>,
    generation_timeout: Duration,
    command_rx: mpsc::Receiver<SessionCommand>,
    command_tx: mpsc::Sender<SessionCommand>,
    view_tx: watch::Sender<SessionView>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    shutdown: CancellationToken,
    /// Token to cancel the running generation request or pending retry
    generation_cancel_token: Option<CancellationToken>,
}

impl<L: LlmClient + 'static> SessionRuntime<L> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: ConvContext,
        llm_client: L,
        generation_timeout: Duration,
        command_rx: mpsc::Receiver<SessionCommand>,
        command_tx: mpsc::Sender<SessionCommand>,
        view_tx: watch::Sender<SessionView>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            context,
            state: ConvState::Idle,
            transcript: Vec::new(),
            llm_client: Arc::new(llm_client),
            generation_timeout,
            command_rx,
            command_tx,
            view_tx,
            broadcast_tx,
            shutdown,
            generation_cancel_token: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            session_id = %self.context.session_id,
            model = %self.context.model_id,
            "Starting session runtime"
        );

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                Some(command) = self.command_rx.recv() => {
                    self.handle_command(command);
                }

                else => break,
            }
        }

        if let Some(token) = self.generation_cancel_token.take() {
            token.cancel();
        }
        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        let outcome = self.process_event(command.event);

        if let Err(e) = &outcome {
            if e.is_validation() {
                tracing::debug!(session_id = %self.context.session_id, error = %e, "Input rejected");
            } else if command.reply.is_none() {
                // Results of cancelled or superseded generations land here
                tracing::debug!(session_id = %self.context.session_id, error = %e, "Dropping stale event");
            } else {
                tracing::warn!(session_id = %self.context.session_id, error = %e, "Event rejected");
            }
        }

        if let Some(reply) = command.reply {
            let _ = reply.send(outcome);
        }
    }

    fn process_event(&mut self, event: Event) -> Result<SessionView, TransitionError> {
        // Pure state transition
        let result = transition(&self.state, &self.context, event)?;

        let old_state = std::mem::replace(&mut self.state, result.new_state);
        if old_state.name() != self.state.name() {
            tracing::info!(
                session_id = %self.context.session_id,
                from = old_state.name(),
                to = self.state.name(),
                "State transition"
            );
        }

        for effect in result.effects {
            self.execute_effect(effect);
        }

        Ok(self.publish_view())
    }

    fn publish_view(&self) -> SessionView {
        let view = SessionView::new(&self.context, &self.state, &self.transcript);
        self.view_tx.send_replace(view.clone());
        view
    }

    /// Replace the generation token, cancelling whatever the old one guarded
    fn arm_generation_token(&mut self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(old) = self.generation_cancel_token.replace(token.clone()) {
            old.cancel();
        }
        token
    }

    fn execute_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ResetTranscript => {
                self.transcript.clear();
                let _ = self.broadcast_tx.send(SseEvent::TranscriptReset);
            }

            Effect::AppendTranscript { entry } => {
                self.transcript.push(entry.clone());
                let _ = self.broadcast_tx.send(SseEvent::Message { entry });
            }

            Effect::RequestGeneration { prompt } => {
                let cancel_token = self.arm_generation_token();
                let attempt = match &self.state {
                    ConvState::Finalizing { attempt, .. } => *attempt,
                    _ => 1,
                };

                let llm_client = self.llm_client.clone();
                let command_tx = self.command_tx.clone();
                let generation_timeout = self.generation_timeout;
                let session_id = self.context.session_id.clone();

                tokio::spawn(async move {
                    tracing::info!(
                        session_id = %session_id,
                        attempt,
                        model = llm_client.model_id(),
                        "Requesting itinerary (background)"
                    );
                    let request = LlmRequest::from_prompt(prompt);

                    tokio::select! {
                        biased;

                        () = cancel_token.cancelled() => {
                            tracing::info!(session_id = %session_id, "Generation cancelled");
                        }

                        result = tokio::time::timeout(generation_timeout, llm_client.complete(&request)) => {
                            if cancel_token.is_cancelled() {
                                return;
                            }
                            let event = match result {
                                Ok(Ok(response)) if !response.text.trim().is_empty() => {
                                    Event::GenerationComplete { itinerary: response.text }
                                }
                                Ok(Ok(_)) => generation_failed(
                                    LlmError::empty_response("The model returned an empty itinerary"),
                                    attempt,
                                ),
                                Ok(Err(e)) => generation_failed(e, attempt),
                                Err(_) => generation_failed(
                                    LlmError::timeout(format!(
                                        "No response within {} seconds",
                                        generation_timeout.as_secs()
                                    )),
                                    attempt,
                                ),
                            };
                            let _ = command_tx.send(SessionCommand::internal(event)).await;
                        }
                    }
                });
            }

            Effect::AbortGeneration => {
                tracing::info!(session_id = %self.context.session_id, "Aborting generation");
                if let Some(token) = self.generation_cancel_token.take() {
                    token.cancel();
                }
            }

            Effect::ScheduleRetry { delay, attempt } => {
                tracing::info!(
                    session_id = %self.context.session_id,
                    attempt,
                    delay_ms = %delay.as_millis(),
                    "Scheduling generation retry"
                );
                let cancel_token = self.arm_generation_token();
                let command_tx = self.command_tx.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        () = cancel_token.cancelled() => {}
                        () = tokio::time::sleep(delay) => {
                            let _ = command_tx
                                .send(SessionCommand::internal(Event::RetryTimeout { attempt }))
                                .await;
                        }
                    }
                });
            }

            Effect::NotifyClient { event_type, data } => match event_type.as_str() {
                "state_change" => {
                    let _ = self.broadcast_tx.send(SseEvent::StateChange { state: data });
                }
                "itinerary_ready" => {
                    let _ = self.broadcast_tx.send(SseEvent::ItineraryReady);
                }
                "error" => {
                    let message = data
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown error")
                        .to_string();
                    let _ = self.broadcast_tx.send(SseEvent::Error { message });
                }
                other => {
                    tracing::warn!(event_type = other, "Unknown client notification");
                }
            },
        }
    }
}

fn generation_failed(error: LlmError, attempt: u32) -> Event {
    Event::GenerationFailed {
        message: error.message,
        error_kind: error.kind,
        attempt,
        retry_after: error.retry_after,
    }
}
