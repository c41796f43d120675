//! Effects produced by state transitions

use crate::state_machine::state::TranscriptEntry;
use serde_json::Value;
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Drop all transcript messages (a new interview is starting)
    ResetTranscript,

    /// Append a message to the transcript
    AppendTranscript { entry: TranscriptEntry },

    /// Send the assembled prompt to the generation collaborator
    RequestGeneration { prompt: String },

    /// Abort the in-flight generation request
    AbortGeneration,

    /// Notify connected clients
    NotifyClient { event_type: String, data: Value },

    /// Schedule a retry
    ScheduleRetry { delay: Duration, attempt: u32 },
}

impl Effect {
    pub fn append_assistant(content: impl Into<String>) -> Self {
        Effect::AppendTranscript {
            entry: TranscriptEntry::assistant(content),
        }
    }

    pub fn append_user(content: impl Into<String>) -> Self {
        Effect::AppendTranscript {
            entry: TranscriptEntry::user(content),
        }
    }

    pub fn append_failure(content: impl Into<String>) -> Self {
        Effect::AppendTranscript {
            entry: TranscriptEntry::failure(content),
        }
    }

    #[allow(clippy::needless_pass_by_value)] // data is consumed by json! macro
    pub fn notify_state_change(state: &str, data: Value) -> Self {
        Effect::NotifyClient {
            event_type: "state_change".to_string(),
            data: serde_json::json!({
                "state": state,
                "state_data": data
            }),
        }
    }

    pub fn notify_itinerary_ready() -> Self {
        Effect::NotifyClient {
            event_type: "itinerary_ready".to_string(),
            data: Value::Null,
        }
    }

    pub fn notify_error(message: impl Into<String>) -> Self {
        Effect::NotifyClient {
            event_type: "error".to_string(),
            data: serde_json::json!({ "message": message.into() }),
        }
    }
}
