//! Model registry for managing available Gemini models

use super::gemini::{GeminiService, IMPLICIT_API_KEY};
use super::models::DEFAULT_MODEL_ID;
use super::{all_models, LlmService, LoggingService, ModelDef};
use crate::config::ConfigError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for the generation collaborator
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub gemini_api_key: Option<String>,
    /// Gateway URL that injects credentials itself
    pub gateway: Option<String>,
    /// Default model ID, always one of [`all_models`] when read from the environment
    pub default_model: Option<String>,
    /// Cap on generated tokens; the provider default applies when unset
    pub max_output_tokens: Option<u32>,
}

impl LlmConfig {
    /// Build from an arbitrary variable source.
    ///
    /// `GEMINI_API_KEY` wins over `GEMINI_API_KEY_FILE`; the file form lets
    /// the key come from a mounted secret instead of the environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let gemini_api_key = match non_empty("GEMINI_API_KEY") {
            Some(key) => Some(key.trim().to_string()),
            None => match non_empty("GEMINI_API_KEY_FILE") {
                Some(path) => {
                    let path = PathBuf::from(path);
                    let contents = std::fs::read_to_string(&path)
                        .map_err(|source| ConfigError::SecretFile { path, source })?;
                    Some(contents.trim().to_string()).filter(|k| !k.is_empty())
                }
                None => None,
            },
        };

        let default_model = match non_empty("DEFAULT_MODEL") {
            Some(id) if all_models().iter().any(|def| def.id == id.trim()) => {
                Some(id.trim().to_string())
            }
            Some(value) => {
                return Err(ConfigError::InvalidValue {
                    name: "DEFAULT_MODEL",
                    value,
                })
            }
            None => None,
        };

        let max_output_tokens = match non_empty("GEMINI_MAX_OUTPUT_TOKENS") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(tokens) if tokens > 0 => Some(tokens),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "GEMINI_MAX_OUTPUT_TOKENS",
                        value,
                    })
                }
            },
            None => None,
        };

        Ok(Self {
            gemini_api_key,
            gateway: non_empty("LLM_GATEWAY"),
            default_model,
            max_output_tokens,
        })
    }
}

/// Registry of available LLM models
pub struct ModelRegistry {
    services: HashMap<String, Arc<dyn LlmService>>,
    default_model: String,
}

impl ModelRegistry {
    pub fn new(config: &LlmConfig) -> Self {
        let mut services: HashMap<String, Arc<dyn LlmService>> = HashMap::new();

        for model_def in all_models() {
            if let Some(service) = Self::try_create_model(model_def, config) {
                services.insert(model_def.id.to_string(), service);
            }
        }

        let default_model = match config.default_model.as_deref() {
            Some(id) if all_models().iter().any(|def| def.id == id) => id.to_string(),
            Some(id) => {
                tracing::warn!(
                    requested = id,
                    fallback = DEFAULT_MODEL_ID,
                    "Unknown default model, using fallback"
                );
                DEFAULT_MODEL_ID.to_string()
            }
            None => DEFAULT_MODEL_ID.to_string(),
        };

        Self {
            services,
            default_model,
        }
    }

    /// Try to create a model service, validating prerequisites
    fn try_create_model(model_def: &ModelDef, config: &LlmConfig) -> Option<Arc<dyn LlmService>> {
        // In gateway mode the gateway handles the actual authentication
        let api_key = if config.gateway.is_some() {
            IMPLICIT_API_KEY.to_string()
        } else {
            config.gemini_api_key.clone()?
        };

        match GeminiService::new(
            api_key,
            model_def.model,
            model_def.id,
            config.gateway.as_deref(),
            config.max_output_tokens,
        ) {
            Ok(service) => Some(Arc::new(LoggingService::new(Arc::new(service)))),
            Err(e) => {
                tracing::warn!(model = model_def.id, error = %e, "Failed to create model service");
                None
            }
        }
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LlmService>> {
        self.services.get(model_id).cloned()
    }

    /// Get the default model
    pub fn default(&self) -> Option<Arc<dyn LlmService>> {
        self.get(&self.default_model)
    }

    /// Get the default model ID
    pub fn default_model_id(&self) -> &str {
        &self.default_model
    }

    /// List all available model IDs
    pub fn available_models(&self) -> Vec<String> {
        let mut models: Vec<_> = self.services.keys().cloned().collect();
        models.sort();
        models
    }

    /// Get detailed information about available models
    pub fn available_model_info(&self) -> Vec<crate::api::ModelInfo> {
        all_models()
            .iter()
            .filter(|def| self.services.contains_key(def.id))
            .map(|def| crate::api::ModelInfo {
                id: def.id.to_string(),
                description: def.description.to_string(),
            })
            .collect()
    }

    /// Check if any models are available
    pub fn has_models(&self) -> bool {
        !self.services.is_empty()
    }
}
