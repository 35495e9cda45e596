use std::sync::Arc;

use crate::config::Config;
use crate::interview::store::SessionStore;
use crate::llm_client::LanguageModel;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    /// Model backend handed to every new session. Default: `GeminiClient`.
    pub llm: Arc<dyn LanguageModel>,
    pub config: Config,
}
