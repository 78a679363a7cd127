use serde::Serialize;

/// Machine-readable failure category carried by structured outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Connectivity,
    UnsupportedLanguage,
    PathEscape,
    ProviderUnavailable,
    ExecutionFailure,
    ExecutionTimeout,
    FileSystem,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub error_message: Option<String>,
    pub failure: Option<FailureKind>,
}

impl ExecutionOutcome {
    pub fn completed(stdout: String, stderr: String) -> Self {
        Self {
            success: true,
            stdout,
            stderr,
            error_message: None,
            failure: None,
        }
    }

    pub fn failed(kind: FailureKind, message: String, stdout: String, stderr: String) -> Self {
        Self {
            success: false,
            stdout,
            stderr,
            error_message: Some(message),
            failure: Some(kind),
        }
    }

    /// Error text shown to the user; empty only for successful runs.
    pub fn error_text(&self) -> &str {
        self.error_message.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub is_directory: bool,
}
