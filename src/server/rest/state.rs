use crate::assistant::Assistant;
use crate::shared::config::ServerConfig;

pub struct AppState {
    pub assistant: Assistant,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(assistant: Assistant, config: ServerConfig) -> Self {
        Self { assistant, config }
    }
}
