//! Events that can occur in a session

use crate::llm::LlmErrorKind;
use crate::trip::TripMetadata;
use std::time::Duration;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Start {
        metadata: TripMetadata,
    },
    Answer {
        text: String,
    },
    Cancel,

    // Generation events
    GenerationComplete {
        itinerary: String,
    },
    GenerationFailed {
        message: String,
        error_kind: LlmErrorKind,
        attempt: u32,
        /// Server-provided backoff hint (e.g. `Retry-After`)
        retry_after: Option<Duration>,
    },
    RetryTimeout {
        attempt: u32,
    },
}
