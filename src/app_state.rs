use std::sync::Arc;

use crate::llm::TextGenerator;

/// Shared by every request task. The generator is fully loaded before the
/// state exists, and nothing mutates it afterwards.
pub struct AppState {
    pub generator: Arc<dyn TextGenerator>,
}

impl AppState {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}
