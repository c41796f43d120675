//! Model catalog
//!
//! All model definitions live here so adding a model is a one-line change.

use super::gemini::GeminiModel;

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "gemini-2.5-flash")
    pub id: &'static str,
    /// Gemini model backing this ID
    pub model: GeminiModel,
    /// Human-readable description
    pub description: &'static str,
}

/// Model used when `DEFAULT_MODEL` is not set
pub const DEFAULT_MODEL_ID: &str = "gemini-2.5-flash";

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "gemini-2.5-pro",
            model: GeminiModel::Gemini25Pro,
            description: "Gemini 2.5 Pro (most capable, slower)",
        },
        ModelDef {
            id: "gemini-2.5-flash",
            model: GeminiModel::Gemini25Flash,
            description: "Gemini 2.5 Flash (balanced, fast)",
        },
        ModelDef {
            id: "gemini-2.0-flash",
            model: GeminiModel::Gemini20Flash,
            description: "Gemini 2.0 Flash (previous generation)",
        },
    ]
}
