//! Application state management

use sauti_core::audio::StreamingConfig;
use sauti_core::InferenceEngine;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InferenceEngine>,
    pub streaming: StreamingConfig,
}

impl AppState {
    pub fn new(engine: Arc<InferenceEngine>, streaming: StreamingConfig) -> Self {
        Self { engine, streaming }
    }
}
