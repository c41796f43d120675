//! Runtime for executing interview sessions
//!
//! Each session runs as its own task that owns the conversation state and
//! transcript. Callers talk to it through a [`SessionHandle`].

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

use executor::SessionRuntime;
use traits::{LlmClient, RegistryLlmClient};

use crate::llm::ModelRegistry;
use crate::state_machine::{ConvContext, ConvState, Event, TranscriptEntry, TransitionError};
use crate::trip::QuestionList;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Errors returned to callers driving a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Session is no longer running")]
    Closed,
}

/// Event delivered to a session runtime, with an optional reply channel for
/// the caller that triggered it
#[derive(Debug)]
pub struct SessionCommand {
    pub event: Event,
    pub reply: Option<oneshot::Sender<Result<SessionView, TransitionError>>>,
}

impl SessionCommand {
    /// Command raised by the runtime itself; nobody waits on the outcome
    pub fn internal(event: Event) -> Self {
        Self { event, reply: None }
    }
}

/// Snapshot of a session for presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub state: &'static str,
    /// -1 when idle, step index while answering, question count while finalizing
    pub position: i64,
    pub total_steps: usize,
    /// Question awaiting an answer, if any
    pub current_question: Option<String>,
    pub destination: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
}

impl SessionView {
    pub fn new(context: &ConvContext, state: &ConvState, transcript: &[TranscriptEntry]) -> Self {
        Self {
            session_id: context.session_id.clone(),
            state: state.name(),
            position: state.position(context.questions.len()),
            total_steps: context.questions.len(),
            current_question: state
                .current_step()
                .and_then(|step| context.questions.get(step))
                .map(str::to_string),
            destination: state
                .interview()
                .map(|i| i.metadata.destination().to_string()),
            transcript: transcript.to_vec(),
        }
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init { view: SessionView },
    Message { entry: TranscriptEntry },
    TranscriptReset,
    StateChange { state: serde_json::Value },
    ItineraryReady,
    Error { message: String },
}

/// Handle to interact with a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub session_id: String,
    command_tx: mpsc::Sender<SessionCommand>,
    view_rx: watch::Receiver<SessionView>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    /// Deliver an event and wait for the resulting view
    pub async fn send(&self, event: Event) -> Result<SessionView, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(SessionCommand {
                event,
                reply: Some(reply_tx),
            })
            .await
            .map_err(|_| SessionError::Closed)?;

        let outcome = reply_rx.await.map_err(|_| SessionError::Closed)?;
        Ok(outcome?)
    }

    /// Latest published view
    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    /// Wait until the published view satisfies `predicate`
    #[allow(dead_code)] // Used by runtime tests
    pub async fn wait_for_view(
        &self,
        predicate: impl Fn(&SessionView) -> bool,
    ) -> Result<SessionView, SessionError> {
        let mut rx = self.view_rx.clone();
        let view = rx
            .wait_for(|v| predicate(v))
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(view.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Number of open event streams
    pub fn subscriber_count(&self) -> usize {
        self.broadcast_tx.receiver_count()
    }

    /// Stop the session task; in-flight generation is aborted
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Spawn a session runtime task and return its handle
pub fn spawn_session<L: LlmClient + 'static>(
    context: ConvContext,
    llm_client: L,
    generation_timeout: Duration,
) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::channel(32);
    let (broadcast_tx, _) = broadcast::channel(128);
    let initial_view = SessionView::new(&context, &ConvState::Idle, &[]);
    let (view_tx, view_rx) = watch::channel(initial_view);
    let shutdown = CancellationToken::new();
    let session_id = context.session_id.clone();

    let runtime = SessionRuntime::new(
        context,
        llm_client,
        generation_timeout,
        command_rx,
        command_tx.clone(),
        view_tx,
        broadcast_tx.clone(),
        shutdown.clone(),
    );
    tokio::spawn(runtime.run());

    SessionHandle {
        session_id,
        command_tx,
        view_rx,
        broadcast_tx,
        shutdown,
    }
}

struct SessionEntry {
    handle: SessionHandle,
    last_access: Mutex<Instant>,
}

impl SessionEntry {
    fn new(handle: SessionHandle) -> Self {
        Self {
            handle,
            last_access: Mutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        if let Ok(mut last) = self.last_access.lock() {
            *last = Instant::now();
        }
    }

    /// Idle sessions have no open stream and no request within `max_idle`
    fn is_idle(&self, now: Instant, max_idle: Duration) -> bool {
        let last = self.last_access.lock().map_or(now, |last| *last);
        self.handle.subscriber_count() == 0 && now.duration_since(last) >= max_idle
    }
}

/// Manager for all session runtimes
pub struct RuntimeManager {
    llm_registry: Arc<ModelRegistry>,
    questions: QuestionList,
    generation_timeout: Duration,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl RuntimeManager {
    pub fn new(llm_registry: Arc<ModelRegistry>, generation_timeout: Duration) -> Self {
        Self {
            llm_registry,
            questions: QuestionList::default(),
            generation_timeout,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn questions(&self) -> &QuestionList {
        &self.questions
    }

    /// Start a new idle session
    pub async fn create_session(&self) -> SessionHandle {
        let session_id = uuid::Uuid::new_v4().to_string();
        let model_id = self.llm_registry.default_model_id().to_string();
        let context = ConvContext::new(&session_id, self.questions.clone(), &model_id);
        let client = RegistryLlmClient::new(self.llm_registry.clone(), model_id);

        let handle = spawn_session(context, client, self.generation_timeout);
        self.sessions
            .write()
            .await
            .insert(session_id.clone(), SessionEntry::new(handle.clone()));

        tracing::info!(session_id = %session_id, "Created session");
        handle
    }

    /// Look up a session, counting the lookup as activity
    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(session_id)?;
        entry.touch();
        Some(entry.handle.clone())
    }

    /// Stop and forget a session. Returns false if it did not exist.
    pub async fn remove(&self, session_id: &str) -> bool {
        match self.sessions.write().await.remove(session_id) {
            Some(entry) => {
                entry.handle.shutdown();
                tracing::info!(session_id = %session_id, "Removed session");
                true
            }
            None => false,
        }
    }

    /// Stop and forget every idle session. Returns how many were evicted.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|session_id, entry| {
            if entry.is_idle(now, max_idle) {
                entry.handle.shutdown();
                tracing::info!(session_id = %session_id, "Evicted idle session");
                false
            } else {
                true
            }
        });
        before - sessions.len()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Spawn a background task that periodically evicts idle sessions
pub fn spawn_idle_sweeper(
    manager: Arc<RuntimeManager>,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    let period = (max_idle / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let evicted = manager.evict_idle(max_idle).await;
            if evicted > 0 {
                let remaining = manager.session_count().await;
                tracing::info!(
                    evicted,
                    remaining,
                    "Idle session sweep"
                );
            }
        }
    })
}
