//! HTTP API for the itinerary wizard
//!
//! Each session is driven through explicit start/answer/cancel requests and
//! observed through its view or an SSE stream.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::llm::ModelRegistry;
use crate::runtime::RuntimeManager;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RuntimeManager>,
    pub llm_registry: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(llm_registry: Arc<ModelRegistry>, generation_timeout: Duration) -> Self {
        Self {
            runtime: Arc::new(RuntimeManager::new(
                llm_registry.clone(),
                generation_timeout,
            )),
            llm_registry,
        }
    }
}
