//! Conversation state types

use crate::trip::{QuestionList, TripMetadata};
use serde::Serialize;

// ============================================================================
// Response Map
// ============================================================================

/// One collected `key: value` pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseEntry {
    pub key: String,
    pub value: String,
}

/// Insertion-ordered map of prompt keys to collected values.
///
/// Trip metadata is inserted first, followed by one entry per answered
/// question. Re-inserting an existing key replaces the value in place and
/// keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResponseMap {
    entries: Vec<ResponseEntry>,
}

impl ResponseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a map with the trip metadata entries
    pub fn from_metadata(metadata: &TripMetadata) -> Self {
        let mut map = Self::new();
        for (key, value) in metadata.response_entries() {
            map.insert(key, value);
        }
        map
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(existing) => existing.value = value,
            None => self.entries.push(ResponseEntry { key, value }),
        }
    }

    #[allow(dead_code)] // Lookup by question, used in tests
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.key.as_str(), e.value.as_str()))
    }
}

// ============================================================================
// Transcript Entries
// ============================================================================

/// Who authored a transcript message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Assistant,
    User,
}

/// A single display message in the session transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub content: String,
    /// Set on assistant messages that report a failed generation
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl TranscriptEntry {
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            is_error: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            is_error: false,
        }
    }

    pub fn failure(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            is_error: true,
        }
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Data captured for one run through the interview
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interview {
    pub metadata: TripMetadata,
    pub responses: ResponseMap,
}

impl Interview {
    pub fn new(metadata: TripMetadata) -> Self {
        let responses = ResponseMap::from_metadata(&metadata);
        Self {
            metadata,
            responses,
        }
    }
}

/// Conversation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// No interview in progress
    #[default]
    Idle,

    /// Waiting for the answer to `questions[step]`
    AwaitingAnswer { step: usize, interview: Interview },

    /// All questions answered, itinerary generation in flight
    Finalizing { interview: Interview, attempt: u32 },
}

impl ConvState {
    /// Conversation cursor: -1 when idle, the step index while answering,
    /// and the question count while finalizing.
    pub fn position(&self, question_count: usize) -> i64 {
        match self {
            ConvState::Idle => -1,
            ConvState::AwaitingAnswer { step, .. } => i64::try_from(*step).unwrap_or(i64::MAX),
            ConvState::Finalizing { .. } => i64::try_from(question_count).unwrap_or(i64::MAX),
        }
    }

    /// Step index of the question currently awaiting an answer
    pub fn current_step(&self) -> Option<usize> {
        match self {
            ConvState::AwaitingAnswer { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn interview(&self) -> Option<&Interview> {
        match self {
            ConvState::Idle => None,
            ConvState::AwaitingAnswer { interview, .. } | ConvState::Finalizing { interview, .. } => {
                Some(interview)
            }
        }
    }

    /// Short state name used in client notifications
    pub fn name(&self) -> &'static str {
        match self {
            ConvState::Idle => "idle",
            ConvState::AwaitingAnswer { .. } => "awaiting_answer",
            ConvState::Finalizing { .. } => "finalizing",
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(self, ConvState::Finalizing { .. })
    }
}

/// Context for a session (immutable configuration)
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub session_id: String,
    pub questions: QuestionList,
    pub model_id: String,
}

impl ConvContext {
    pub fn new(
        session_id: impl Into<String>,
        questions: QuestionList,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            questions,
            model_id: model_id.into(),
        }
    }
}
