//! API request and response types

use crate::runtime::SessionView;
use crate::trip::BudgetTier;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Request to start (or restart) an interview
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub destination: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub party_size: u32,
    pub budget: BudgetTier,
}

/// Request to answer the current question
#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub text: String,
}

/// Outcome of a user action.
///
/// Rejected input is reported with `accepted: false`; the view is the
/// unchanged session.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub view: SessionView,
}

impl ActionResponse {
    pub fn accepted(view: SessionView) -> Self {
        Self {
            accepted: true,
            reason: None,
            view,
        }
    }

    pub fn rejected(reason: impl Into<String>, view: SessionView) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
            view,
        }
    }
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Response with the interview questions
#[derive(Debug, Serialize)]
pub struct QuestionsResponse {
    pub questions: Vec<String>,
}

/// Response with the selectable budget tiers, in display order
#[derive(Debug, Serialize)]
pub struct BudgetTiersResponse {
    pub budget_tiers: Vec<&'static str>,
}

/// Model information with metadata
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub description: String,
}

/// Response for model list
#[derive(Debug, Serialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub default: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
