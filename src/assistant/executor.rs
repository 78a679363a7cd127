use std::process::Stdio;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use super::error::AssistantError;
use super::workspace::Workspace;
use crate::shared::config::WorkspaceConfig;
use crate::shared::models::ExecutionOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    JavaScript,
    Python,
    Shell,
}

impl Language {
    pub fn label(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Shell => "shell",
        }
    }

    /// Language of a workspace file, judged by extension. Anything that is not
    /// `.py` or `.sh` runs as JavaScript.
    pub fn from_file_name(name: &str) -> Self {
        match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
            Some(ext) if ext == "py" => Language::Python,
            Some(ext) if ext == "sh" => Language::Shell,
            _ => Language::JavaScript,
        }
    }

    fn script_suffix(&self) -> Option<&'static str> {
        match self {
            Language::JavaScript => Some(".js"),
            Language::Python => Some(".py"),
            Language::Shell => None,
        }
    }
}

impl FromStr for Language {
    type Err = AssistantError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "python" | "py" | "python3" => Ok(Language::Python),
            "bash" | "sh" | "shell" => Ok(Language::Shell),
            other => Err(AssistantError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Seam between the response pipeline and whatever actually runs code.
#[async_trait]
pub trait CodeRunner: Send + Sync {
    async fn run(&self, code: &str, language: Language) -> ExecutionOutcome;

    /// Runs code tagged with a free-form language token. Unknown tokens yield a
    /// failed outcome instead of an error.
    async fn run_tagged(&self, code: &str, language: &str) -> ExecutionOutcome {
        match language.parse::<Language>() {
            Ok(language) => self.run(code, language).await,
            Err(err) => {
                warn!("{}", err);
                ExecutionOutcome::failed(err.kind(), err.to_string(), String::new(), String::new())
            }
        }
    }
}

pub struct CodeExecutor {
    workspace: Workspace,
    timeout: Duration,
    node_program: String,
    python_program: String,
    shell_program: String,
}

struct CommandSpec<'a> {
    label: &'a str,
    program: &'a str,
    args: Vec<String>,
}

impl CodeExecutor {
    pub fn new(workspace: Workspace, config: &WorkspaceConfig) -> Self {
        Self {
            workspace,
            timeout: Duration::from_secs(config.exec_timeout_secs),
            node_program: config.node_program.clone(),
            python_program: config.python_program.clone(),
            shell_program: config.shell_program.clone(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn program_for(&self, language: Language) -> &str {
        match language {
            Language::JavaScript => &self.node_program,
            Language::Python => &self.python_program,
            Language::Shell => &self.shell_program,
        }
    }

    async fn execute_command(&self, spec: CommandSpec<'_>) -> ExecutionOutcome {
        let start = Instant::now();
        info!(tool = "execute_code", language = spec.label, program = spec.program, "tool start");

        let child = Command::new(spec.program)
            .args(&spec.args)
            .current_dir(self.workspace.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(err) => {
                let err = AssistantError::ExecutionFailure(format!(
                    "failed to start {} ({}): {}",
                    spec.label, spec.program, err
                ));
                warn!("{}", err);
                return ExecutionOutcome::failed(err.kind(), err.to_string(), String::new(), String::new());
            }
        };

        // Dropping the child on timeout kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                let err = AssistantError::ExecutionFailure(format!(
                    "failed to collect {} output: {}",
                    spec.label, err
                ));
                warn!("{}", err);
                return ExecutionOutcome::failed(err.kind(), err.to_string(), String::new(), String::new());
            }
            Err(_) => {
                let err = AssistantError::ExecutionTimeout(self.timeout);
                warn!(tool = "execute_code", language = spec.label, "{}", err);
                return ExecutionOutcome::failed(err.kind(), err.to_string(), String::new(), String::new());
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit = output.status.code().unwrap_or(-1);
        info!(
            tool = "execute_code",
            language = spec.label,
            exit,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            took_ms = start.elapsed().as_millis() as u64,
            "tool end"
        );

        if output.status.success() {
            return ExecutionOutcome::completed(stdout, stderr);
        }

        let mut message = format!("{} exited with code {}", spec.label, exit);
        if !stderr.trim().is_empty() {
            message.push_str(":\n");
            message.push_str(stderr.trim());
        }
        let err = AssistantError::ExecutionFailure(message);
        ExecutionOutcome::failed(err.kind(), err.to_string(), stdout, stderr)
    }
}

#[async_trait]
impl CodeRunner for CodeExecutor {
    async fn run(&self, code: &str, language: Language) -> ExecutionOutcome {
        let program = self.program_for(language);

        let Some(suffix) = language.script_suffix() else {
            let spec = CommandSpec {
                label: language.label(),
                program,
                args: vec!["-c".to_string(), code.to_string()],
            };
            return self.execute_command(spec).await;
        };

        // Removed from disk when `script` drops, whatever the outcome
        let script = match tempfile::Builder::new()
            .prefix(".tmp_")
            .suffix(suffix)
            .tempfile_in(self.workspace.root())
        {
            Ok(script) => script,
            Err(err) => {
                let err = AssistantError::FileSystem(err);
                warn!("Failed to create temporary script: {}", err);
                return ExecutionOutcome::failed(err.kind(), err.to_string(), String::new(), String::new());
            }
        };
        if let Err(err) = tokio::fs::write(script.path(), code).await {
            let err = AssistantError::FileSystem(err);
            warn!("Failed to write temporary script: {}", err);
            return ExecutionOutcome::failed(err.kind(), err.to_string(), String::new(), String::new());
        }

        let spec = CommandSpec {
            label: language.label(),
            program,
            args: vec![script.path().to_string_lossy().to_string()],
        };
        let outcome = self.execute_command(spec).await;
        drop(script);
        outcome
    }
}

#[cfg(test)]
pub(crate) fn has_program(program: &str) -> bool {
    std::process::Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
