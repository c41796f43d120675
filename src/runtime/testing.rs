//! Mock implementations for testing
//!
//! These mocks enable integration testing of session runtimes without
//! network access.

use super::traits::LlmClient;
use super::{spawn_session, SessionHandle, SessionView, SseEvent};
use crate::llm::{LlmError, LlmRequest, LlmResponse, Usage};
use crate::state_machine::{ConvContext, Event};
use crate::trip::{BudgetTier, QuestionList, TripMetadata};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

#[allow(dead_code)]
impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response with the given text
    pub fn queue_text(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(LlmResponse {
            text: text.into(),
            finish_reason: Some("STOP".to_string()),
            usage: Usage::default(),
        }));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<LlmResponse, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::unknown("No mock response queued")))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.next_response()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Delayed Mock LLM Client (for cancellation and timeout testing)
// ============================================================================

/// Mock LLM client with configurable delay
pub struct DelayedMockLlmClient {
    inner: MockLlmClient,
    delay: Duration,
    /// Notified when request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockLlmClient {
    pub fn new(model_id: impl Into<String>, delay: Duration) -> Self {
        Self {
            inner: MockLlmClient::new(model_id),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_text(&self, text: impl Into<String>) {
        self.inner.queue_text(text);
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl LlmClient for DelayedMockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.next_response()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// Test Session Helper
// ============================================================================

pub fn paris_trip() -> TripMetadata {
    TripMetadata::new(
        "Paris",
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 6, 5).unwrap(),
        2,
        BudgetTier::Moderate,
    )
    .unwrap()
}

/// A spawned session wired to a mock client, with an SSE subscription
pub struct TestSession<L: LlmClient + 'static> {
    pub handle: SessionHandle,
    pub llm: Arc<L>,
    pub events: broadcast::Receiver<SseEvent>,
}

impl<L: LlmClient + 'static> TestSession<L> {
    pub fn new(llm: L) -> Self {
        Self::with_timeout(llm, Duration::from_secs(5))
    }

    pub fn with_timeout(llm: L, generation_timeout: Duration) -> Self {
        let llm = Arc::new(llm);
        let context = ConvContext::new("test-session", QuestionList::default(), llm.model_id());
        let handle = spawn_session(context, llm.clone(), generation_timeout);
        let events = handle.subscribe();
        Self {
            handle,
            llm,
            events,
        }
    }

    pub async fn start(&self) -> SessionView {
        self.handle
            .send(Event::Start {
                metadata: paris_trip(),
            })
            .await
            .expect("start accepted")
    }

    /// Answer every question, returning the view after the last answer
    pub async fn answer_all(&self) -> SessionView {
        let total = QuestionList::default().len();
        let mut view = None;
        for i in 0..total {
            let answer = self
                .handle
                .send(Event::Answer {
                    text: format!("answer {i}"),
                })
                .await
                .expect("answer accepted");
            view = Some(answer);
        }
        view.expect("at least one question")
    }

    pub async fn wait_for_view(&self, predicate: impl Fn(&SessionView) -> bool) -> SessionView {
        tokio::time::timeout(Duration::from_secs(2), self.handle.wait_for_view(predicate))
            .await
            .expect("view reached before timeout")
            .expect("session still running")
    }

    pub async fn wait_until_idle(&self) -> SessionView {
        self.wait_for_view(|v| v.state == "idle").await
    }

    /// Wait for the first SSE event matching `predicate`
    pub async fn wait_for_event(&mut self, predicate: impl Fn(&SseEvent) -> bool) -> SseEvent {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            match tokio::time::timeout_at(deadline, self.events.recv()).await {
                Ok(Ok(event)) if predicate(&event) => return event,
                Ok(Ok(_) | Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => panic!("event stream closed"),
                Err(_) => panic!("event not received before timeout"),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;
    use crate::runtime::SessionError;
    use crate::state_machine::{Role, TransitionError};
    use crate::trip::ValidationError;

    fn quick_retry(error: LlmError) -> LlmError {
        error.with_retry_after(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_mock_llm_client() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_text("Day 1: Louvre");

        let response = llm
            .complete(&LlmRequest::from_prompt("plan"))
            .await
            .unwrap();
        assert_eq!(response.text, "Day 1: Louvre");
        assert_eq!(llm.recorded_requests().len(), 1);

        let err = llm.complete(&LlmRequest::from_prompt("again")).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_start_publishes_greeting() {
        let mut session = TestSession::new(MockLlmClient::new("test-model"));
        let view = session.start().await;

        assert_eq!(view.state, "awaiting_answer");
        assert_eq!(view.position, 0);
        assert_eq!(view.total_steps, 6);
        assert_eq!(view.destination.as_deref(), Some("Paris"));
        assert_eq!(view.transcript.len(), 1);
        assert!(view.transcript[0]
            .content
            .starts_with("Hello! Let's plan your 5-day trip to Paris!\n"));
        assert_eq!(view.current_question.as_deref(), QuestionList::default().get(0));

        assert!(matches!(
            session.events.recv().await.unwrap(),
            SseEvent::TranscriptReset
        ));
        assert!(matches!(
            session.events.recv().await.unwrap(),
            SseEvent::Message { entry } if entry.role == Role::Assistant
        ));
        assert!(matches!(
            session.events.recv().await.unwrap(),
            SseEvent::StateChange { .. }
        ));
    }

    /// Full walk: greeting, six answers, one generation request, itinerary
    #[tokio::test]
    async fn test_full_interview_produces_itinerary() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_text("Day 1: Eiffel Tower");
        let mut session = TestSession::new(llm);

        session.start().await;
        let view = session.answer_all().await;
        assert_eq!(view.position, 6);

        session
            .wait_for_event(|e| matches!(e, SseEvent::ItineraryReady))
            .await;
        let view = session.wait_until_idle().await;

        // greeting + 5 x (answer, next question) + last answer + itinerary
        assert_eq!(view.transcript.len(), 13);
        let last = view.transcript.last().unwrap();
        assert_eq!(last.content, "Day 1: Eiffel Tower");
        assert!(!last.is_error);
        assert_eq!(view.position, -1);
        assert!(view.current_question.is_none());

        let requests = session.llm.recorded_requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].prompt;
        assert!(prompt.contains("Destination: Paris\n"));
        assert!(prompt.contains("Number of People: 2\n"));
        assert!(prompt.contains("answer 5"));
    }

    #[tokio::test]
    async fn test_blank_answer_leaves_session_unchanged() {
        let session = TestSession::new(MockLlmClient::new("test-model"));
        let before = session.start().await;

        let result = session
            .handle
            .send(Event::Answer {
                text: "   ".to_string(),
            })
            .await;
        assert!(matches!(
            result,
            Err(SessionError::Transition(TransitionError::Validation(
                ValidationError::EmptyAnswer
            )))
        ));
        assert_eq!(session.handle.view(), before);
    }

    #[tokio::test]
    async fn test_retryable_failure_then_success() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_error(quick_retry(LlmError::rate_limit("Too many requests")));
        llm.queue_text("Day 1: Montmartre");
        let session = TestSession::new(llm);

        session.start().await;
        session.answer_all().await;

        let view = session
            .wait_for_view(|v| v.state == "idle" && v.transcript.len() == 13)
            .await;
        assert_eq!(view.transcript.last().unwrap().content, "Day 1: Montmartre");
        assert_eq!(session.llm.recorded_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted_resets_to_idle() {
        let llm = MockLlmClient::new("test-model");
        for _ in 0..3 {
            llm.queue_error(quick_retry(LlmError::server_error("Server error: 503")));
        }
        let mut session = TestSession::new(llm);

        session.start().await;
        session.answer_all().await;

        let event = session
            .wait_for_event(|e| matches!(e, SseEvent::Error { .. }))
            .await;
        let SseEvent::Error { message } = event else {
            unreachable!()
        };
        assert_eq!(message, "Failed after 3 attempts: Server error: 503");

        let view = session.wait_until_idle().await;
        let last = view.transcript.last().unwrap();
        assert!(last.is_error);
        assert!(last.content.starts_with("Sorry, I couldn't create your itinerary"));
        assert_eq!(session.llm.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_makes_one_attempt() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_error(LlmError::auth("API key not valid"));
        let session = TestSession::new(llm);

        session.start().await;
        session.answer_all().await;

        let view = session.wait_until_idle().await;
        let last = view.transcript.last().unwrap();
        assert!(last.is_error);
        assert!(last.content.ends_with("API key not valid"));
        assert_eq!(session.llm.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_response_is_a_failure() {
        let llm = MockLlmClient::new("test-model");
        llm.queue_text("   ");
        let session = TestSession::new(llm);

        session.start().await;
        session.answer_all().await;

        let view = session.wait_until_idle().await;
        assert!(view.transcript.last().unwrap().is_error);
        assert_eq!(session.llm.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_events_rejected_while_generating() {
        let llm = DelayedMockLlmClient::new("test-model", Duration::from_secs(5));
        let session = TestSession::new(llm);

        session.start().await;
        session.answer_all().await;

        let answer = session
            .handle
            .send(Event::Answer {
                text: "one more".to_string(),
            })
            .await;
        assert!(matches!(
            answer,
            Err(SessionError::Transition(TransitionError::GenerationInProgress))
        ));

        let restart = session
            .handle
            .send(Event::Start {
                metadata: paris_trip(),
            })
            .await;
        assert!(matches!(
            restart,
            Err(SessionError::Transition(TransitionError::GenerationInProgress))
        ));
        assert_eq!(session.handle.view().state, "finalizing");
    }

    /// Cancelling discards the in-flight request; its result never lands
    #[tokio::test]
    async fn test_cancel_during_generation() {
        let llm = DelayedMockLlmClient::new("test-model", Duration::from_millis(200));
        llm.queue_text("Itinerary that should be discarded");
        let started = llm.request_started.clone();
        let session = TestSession::new(llm);

        session.start().await;
        session.answer_all().await;
        started.notified().await;

        let view = session.handle.send(Event::Cancel).await.unwrap();
        assert_eq!(view.state, "idle");
        assert_eq!(
            view.transcript.last().unwrap().content,
            "Itinerary generation cancelled."
        );

        tokio::time::sleep(Duration::from_millis(400)).await;
        let after = session.handle.view();
        assert_eq!(after, view);
        assert_eq!(session.llm.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_timeout_schedules_retry() {
        let llm = DelayedMockLlmClient::new("test-model", Duration::from_secs(5));
        let mut session = TestSession::with_timeout(llm, Duration::from_millis(50));

        session.start().await;
        session.answer_all().await;

        session
            .wait_for_event(|e| {
                matches!(e, SseEvent::StateChange { state }
                    if state["state_data"]["attempt"] == 2)
            })
            .await;
        assert_eq!(session.llm.recorded_requests().len(), 1);

        let view = session.handle.send(Event::Cancel).await.unwrap();
        assert_eq!(view.state, "idle");
    }

    #[tokio::test]
    async fn test_restart_mid_interview_clears_transcript() {
        let session = TestSession::new(MockLlmClient::new("test-model"));
        session.start().await;
        session
            .handle
            .send(Event::Answer {
                text: "relaxation".to_string(),
            })
            .await
            .unwrap();

        let view = session.start().await;
        assert_eq!(view.position, 0);
        assert_eq!(view.transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_rejected() {
        let session = TestSession::new(MockLlmClient::new("test-model"));
        let result = session.handle.send(Event::Cancel).await;
        assert!(matches!(
            result,
            Err(SessionError::Transition(TransitionError::NoActiveInterview))
        ));
    }
}
