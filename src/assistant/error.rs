use std::time::Duration;

use thiserror::Error;

use crate::shared::models::FailureKind;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("could not reach inference endpoint: {0}")]
    Connectivity(String),

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("path escapes workspace: {0}")]
    PathEscape(String),

    #[error("search provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    #[error("execution failed: {0}")]
    ExecutionFailure(String),

    #[error("execution timed out after {0:?}")]
    ExecutionTimeout(Duration),

    #[error("file system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AssistantError {
    pub fn provider(provider: &str, message: impl ToString) -> Self {
        AssistantError::ProviderUnavailable {
            provider: provider.to_string(),
            message: message.to_string(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            AssistantError::Connectivity(_) => FailureKind::Connectivity,
            AssistantError::UnsupportedLanguage(_) => FailureKind::UnsupportedLanguage,
            AssistantError::PathEscape(_) => FailureKind::PathEscape,
            AssistantError::ProviderUnavailable { .. } => FailureKind::ProviderUnavailable,
            AssistantError::ExecutionFailure(_) => FailureKind::ExecutionFailure,
            AssistantError::ExecutionTimeout(_) => FailureKind::ExecutionTimeout,
            AssistantError::FileSystem(_) => FailureKind::FileSystem,
            AssistantError::Json(_) | AssistantError::Config(_) => FailureKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, AssistantError>;
