use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::executor::{CodeRunner, Language};
use super::intent::{self, NamingContext};
use super::search::SearchNormalizer;
use super::tags::{self, ToolInvocation};
use super::workspace::Workspace;
use crate::shared::config::AfterImplicitWrite;
use crate::shared::models::{FileEntry, SearchResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessedResponse {
    pub display_text: String,
    pub tools_invoked: bool,
}

/// Turns one raw model completion into display text, running whatever tools
/// it asks for along the way. Tool failures become text; nothing here errors.
pub struct ResponsePipeline {
    workspace: Workspace,
    runner: Arc<dyn CodeRunner>,
    search: Arc<SearchNormalizer>,
    after_implicit_write: AfterImplicitWrite,
}

impl ResponsePipeline {
    pub fn new(
        workspace: Workspace,
        runner: Arc<dyn CodeRunner>,
        search: Arc<SearchNormalizer>,
        after_implicit_write: AfterImplicitWrite,
    ) -> Self {
        Self {
            workspace,
            runner,
            search,
            after_implicit_write,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub async fn process(&self, response: &str, instruction: &str) -> ProcessedResponse {
        debug!(raw = %response, "processing model response");

        if let Some(confirmation) = self.implicit_write(response, instruction).await {
            let mut display_text = confirmation;
            if self.after_implicit_write == AfterImplicitWrite::ScanTags {
                for tag in tags::scan(response) {
                    display_text.push_str(&self.dispatch(&tag.invocation).await);
                }
            }
            return ProcessedResponse {
                display_text,
                tools_invoked: true,
            };
        }

        if let Some(display_text) = self.execute_file_command(instruction).await {
            return ProcessedResponse {
                display_text,
                tools_invoked: true,
            };
        }

        let mut substitutions = Vec::new();
        for tag in tags::scan(response) {
            debug!(kind = tag.invocation.kind(), tag = %tag.span, "dispatching tag");
            let replacement = self.dispatch(&tag.invocation).await;
            substitutions.push((tag.range, replacement));
        }

        ProcessedResponse {
            display_text: tags::render(response, &substitutions),
            tools_invoked: !substitutions.is_empty(),
        }
    }

    async fn implicit_write(&self, response: &str, instruction: &str) -> Option<String> {
        if !intent::wants_file(instruction) {
            return None;
        }
        let block = tags::first_fenced_block(response)?;
        let file_name = intent::choose_file_name(&NamingContext {
            instruction,
            response,
            block: &block,
        });
        info!(file = %file_name, language = block.language_or_default(), "creating file from fenced code");

        let path = match self.workspace.write(&file_name, &block.body).await {
            Ok(path) => path,
            Err(err) => {
                warn!(file = %file_name, "implicit file write failed: {}", err);
                return None;
            }
        };

        let mut text = format!(
            "Created file {} with the following code:\n\n{}\n\nSaved to: {}",
            file_name,
            block.body,
            path.display()
        );
        if matches!(
            block.language_or_default().parse::<Language>(),
            Ok(Language::JavaScript | Language::Python)
        ) {
            text.push_str(&format!("\n\nTo run it, type: run {}", file_name));
        }
        Some(text)
    }

    async fn execute_file_command(&self, instruction: &str) -> Option<String> {
        let target = intent::execute_target(instruction)?;
        let code = match self.workspace.read(&target).await {
            Ok(code) => code,
            Err(err) => {
                warn!(file = %target, "cannot run file: {}", err);
                return None;
            }
        };

        let language = Language::from_file_name(&target);
        let outcome = self.runner.run(&code, language).await;
        Some(if outcome.success {
            format!("Result of running {}:\n\n{}", target, outcome.stdout)
        } else {
            format!("Error running {}:\n{}", target, outcome.error_text())
        })
    }

    async fn dispatch(&self, invocation: &ToolInvocation) -> String {
        match invocation {
            ToolInvocation::WebSearch { query } => {
                let results = self.search.search(query).await;
                format_search_results(&results)
            }
            ToolInvocation::ExecuteCode { language, body } => {
                let outcome = self.runner.run_tagged(body, language).await;
                if outcome.success {
                    let mut text = format!("\nOutput:\n{}", outcome.stdout);
                    if !outcome.stderr.is_empty() {
                        text.push_str(&format!("\nWarnings:\n{}", outcome.stderr));
                    }
                    text
                } else {
                    format!("\nError:\n{}", outcome.error_text())
                }
            }
            ToolInvocation::WriteFile { path, body } => match self.workspace.write(path, body).await {
                Ok(full) => format!("\nFile saved to: {}", full.display()),
                Err(err) => format!("\nError: {}", err),
            },
            ToolInvocation::ReadFile { path } => match self.workspace.read(path).await {
                Ok(content) => format!("\nContents of {}:\n{}", path, content),
                Err(err) => format!("\nError: {}", err),
            },
            ToolInvocation::ListFiles { dir } => match self.workspace.list(dir).await {
                Ok(entries) => format_listing(dir, &entries),
                Err(err) => format!("\nError: {}", err),
            },
        }
    }
}

pub fn format_search_results(results: &[SearchResult]) -> String {
    let mut text = String::from("\n\nSEARCH RESULTS:\n");
    for (i, r) in results.iter().enumerate() {
        text.push_str(&format!("{}. {}\n{}\nURL: {}\n\n", i + 1, r.title, r.snippet, r.url));
    }
    text
}

fn format_listing(dir: &str, entries: &[FileEntry]) -> String {
    let mut text = format!("\nFiles in {}:\n", dir);
    for entry in entries {
        if entry.is_directory {
            text.push_str(&format!("  [dir] {}/\n", entry.name));
        } else {
            text.push_str(&format!("  [file] {}\n", entry.name));
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::executor::{has_program, CodeExecutor};
    use crate::assistant::search::SearchProvider;
    use crate::assistant::error::Result;
    use crate::shared::config::WorkspaceConfig;
    use crate::shared::models::ExecutionOutcome;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<(String, Language)>>,
    }

    #[async_trait]
    impl CodeRunner for RecordingRunner {
        async fn run(&self, code: &str, language: Language) -> ExecutionOutcome {
            self.calls.lock().unwrap().push((code.to_string(), language));
            ExecutionOutcome::completed("ran\n".to_string(), String::new())
        }
    }

    struct OneResult;

    #[async_trait]
    impl SearchProvider for OneResult {
        fn name(&self) -> String {
            "one".to_string()
        }

        async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchResult>> {
            Ok(vec![SearchResult {
                title: format!("About {query}"),
                snippet: "A snippet".to_string(),
                url: "https://example.com".to_string(),
            }])
        }
    }

    struct Harness {
        _dir: tempfile::TempDir,
        runner: Arc<RecordingRunner>,
        pipeline: ResponsePipeline,
    }

    fn harness(policy: AfterImplicitWrite) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        let runner = Arc::new(RecordingRunner::default());
        let search = Arc::new(SearchNormalizer::new(
            vec![Box::new(OneResult)],
            Duration::from_secs(1),
            5,
        ));
        let pipeline = ResponsePipeline::new(workspace, runner.clone(), search, policy);
        Harness {
            _dir: dir,
            runner,
            pipeline,
        }
    }

    fn executing_harness() -> (tempfile::TempDir, ResponsePipeline) {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::open(dir.path()).unwrap();
        let runner = Arc::new(CodeExecutor::new(workspace.clone(), &WorkspaceConfig::default()));
        let search = Arc::new(SearchNormalizer::new(Vec::new(), Duration::from_secs(1), 5));
        let pipeline = ResponsePipeline::new(workspace, runner, search, AfterImplicitWrite::Stop);
        (dir, pipeline)
    }

    #[tokio::test]
    async fn plain_answer_is_returned_stripped() {
        let h = harness(AfterImplicitWrite::Stop);
        let out = h
            .pipeline
            .process("<think>hmm</think>\n  Closures capture their environment.  ", "what is a closure?")
            .await;
        assert_eq!(out.display_text, "Closures capture their environment.");
        assert!(!out.tools_invoked);
    }

    #[tokio::test]
    async fn execute_tag_runs_once_with_trimmed_body() {
        let h = harness(AfterImplicitWrite::Stop);
        let response = "Running it:\n[EXECUTE_CODE:js]\n   console.log(1)  \n[/EXECUTE_CODE]\nDone.";
        let out = h.pipeline.process(response, "show me").await;

        let calls = h.runner.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![("console.log(1)".to_string(), Language::JavaScript)]);
        assert!(out.tools_invoked);
        assert!(out.display_text.contains("\nOutput:\nran\n"));
        assert!(!out.display_text.contains("EXECUTE_CODE"));
        assert!(out.display_text.ends_with("Done."));
    }

    #[tokio::test]
    async fn unsupported_language_is_reported_inline() {
        let h = harness(AfterImplicitWrite::Stop);
        let out = h
            .pipeline
            .process("[EXECUTE_CODE:cobol]\nDISPLAY 1\n[/EXECUTE_CODE]", "go")
            .await;
        assert!(h.runner.calls.lock().unwrap().is_empty());
        assert!(out.display_text.contains("Error:\nunsupported language: cobol"));
    }

    #[tokio::test]
    async fn list_files_distinguishes_entries() {
        let h = harness(AfterImplicitWrite::Stop);
        let root = h.pipeline.workspace().root().to_path_buf();
        std::fs::write(root.join("a.txt"), "a").unwrap();
        std::fs::create_dir(root.join("sub")).unwrap();

        let out = h.pipeline.process("Here you go: [LIST_FILES:.]", "list").await;
        assert!(out.tools_invoked);
        assert!(!out.display_text.contains("[LIST_FILES"));
        assert!(out.display_text.contains("  [file] a.txt\n"));
        assert!(out.display_text.contains("  [dir] sub/\n"));
    }

    #[tokio::test]
    async fn write_then_read_tags_in_one_response() {
        let h = harness(AfterImplicitWrite::Stop);
        let response = "[WRITE_FILE:notes/todo.txt]\nbuy milk\n[/WRITE_FILE]\n[READ_FILE:notes/todo.txt]";
        let out = h.pipeline.process(response, "take a note").await;
        assert!(out.display_text.contains("File saved to: "));
        assert!(out.display_text.contains("Contents of notes/todo.txt:\nbuy milk"));
    }

    #[tokio::test]
    async fn escaping_paths_are_reported_not_followed() {
        let h = harness(AfterImplicitWrite::Stop);
        let out = h
            .pipeline
            .process("[READ_FILE:../../etc/passwd] [WRITE_FILE:/tmp/x]\nx\n[/WRITE_FILE]", "read it")
            .await;
        assert!(out.tools_invoked);
        assert_eq!(out.display_text.matches("path escapes workspace").count(), 2);
    }

    #[tokio::test]
    async fn tool_output_quoting_a_later_tag_is_left_intact() {
        let h = harness(AfterImplicitWrite::Stop);
        let root = h.pipeline.workspace().root().to_path_buf();
        std::fs::write(root.join("doc.txt"), "usage: [LIST_FILES:.]").unwrap();

        let response = "[READ_FILE:doc.txt]\nNow listing: [LIST_FILES:.]";
        let out = h.pipeline.process(response, "show the docs").await;
        assert!(out.display_text.contains(
            "Contents of doc.txt:\nusage: [LIST_FILES:.]\nNow listing: \nFiles in .:\n  [file] doc.txt\n"
        ));
        assert_eq!(out.display_text.matches("[LIST_FILES:.]").count(), 1);
    }

    #[tokio::test]
    async fn thinking_line_inside_write_body_is_written_and_replaced() {
        let h = harness(AfterImplicitWrite::Stop);
        let response = "[WRITE_FILE:n.txt]\nthinking: draft\nfinal line\n[/WRITE_FILE]";
        let out = h.pipeline.process(response, "save it").await;

        let saved = std::fs::read_to_string(h.pipeline.workspace().root().join("n.txt")).unwrap();
        assert_eq!(saved, "thinking: draft\nfinal line");
        assert!(out.tools_invoked);
        assert!(out.display_text.contains("File saved to: "));
        assert!(!out.display_text.contains("WRITE_FILE"));
        assert!(!out.display_text.contains("final line"));
    }

    #[tokio::test]
    async fn search_tag_is_replaced_by_results() {
        let h = harness(AfterImplicitWrite::Stop);
        let out = h.pipeline.process("Let me check. [SEARCH_WEB: tokio 1.40]", "news?").await;
        assert!(out.tools_invoked);
        assert!(out.display_text.contains(
            "SEARCH RESULTS:\n1. About tokio 1.40\nA snippet\nURL: https://example.com\n"
        ));
    }

    #[tokio::test]
    async fn fenced_code_becomes_a_file_when_asked() {
        let h = harness(AfterImplicitWrite::Stop);
        let response = "Claro, aquí está:\n```js\nconsole.log(\"Hello World\")\n```";
        let out = h
            .pipeline
            .process(response, "Crea un archivo hello.js con un hola mundo")
            .await;

        let saved = std::fs::read_to_string(h.pipeline.workspace().root().join("hello.js")).unwrap();
        assert_eq!(saved, "console.log(\"Hello World\")");
        assert!(out.tools_invoked);
        assert!(out.display_text.contains("hello.js"));
        assert!(out.display_text.contains("console.log(\"Hello World\")"));
        assert!(out.display_text.contains("run hello.js"));
    }

    #[tokio::test]
    async fn fenced_code_without_file_request_is_left_alone() {
        let h = harness(AfterImplicitWrite::Stop);
        let response = "```js\nconsole.log(1)\n```";
        let out = h.pipeline.process(response, "how do I print?").await;
        assert!(!out.tools_invoked);
        assert_eq!(out.display_text, response);
    }

    #[tokio::test]
    async fn implicit_write_stops_tag_scanning_by_default() {
        let h = harness(AfterImplicitWrite::Stop);
        let response = "```python\nprint(1)\n```\n[LIST_FILES:.]";
        let out = h.pipeline.process(response, "write a file in python").await;
        assert!(out.display_text.starts_with("Created file script.py"));
        assert!(!out.display_text.contains("Files in"));
    }

    #[tokio::test]
    async fn scan_tags_policy_appends_tag_results() {
        let h = harness(AfterImplicitWrite::ScanTags);
        let response = "```python\nprint(1)\n```\n[LIST_FILES:.]";
        let out = h.pipeline.process(response, "write a file in python").await;
        assert!(out.display_text.starts_with("Created file script.py"));
        assert!(out.display_text.contains("Files in .:\n  [file] script.py\n"));
    }

    #[tokio::test]
    async fn run_command_executes_workspace_file() {
        let h = harness(AfterImplicitWrite::Stop);
        std::fs::write(h.pipeline.workspace().root().join("tool.py"), "print(2)").unwrap();
        let out = h
            .pipeline
            .process("[READ_FILE:ignored.txt]", "ejecuta tool.py")
            .await;
        assert_eq!(
            h.runner.calls.lock().unwrap().clone(),
            vec![("print(2)".to_string(), Language::Python)]
        );
        assert_eq!(out.display_text, "Result of running tool.py:\n\nran\n");
    }

    #[tokio::test]
    async fn run_command_for_missing_file_falls_back_to_tags() {
        let h = harness(AfterImplicitWrite::Stop);
        let out = h.pipeline.process("Sure. [LIST_FILES:.]", "run nothing.js").await;
        assert!(h.runner.calls.lock().unwrap().is_empty());
        assert!(out.display_text.starts_with("Sure. \nFiles in .:"));
    }

    #[tokio::test]
    async fn run_shell_script_end_to_end() {
        let (dir, pipeline) = executing_harness();
        std::fs::write(dir.path().join("hello.sh"), "echo 1").unwrap();
        let out = pipeline.process("", "run hello.sh").await;
        assert!(out.tools_invoked);
        assert_eq!(out.display_text, "Result of running hello.sh:\n\n1\n");
    }

    #[tokio::test]
    async fn run_javascript_file_end_to_end() {
        if !has_program("node") {
            return;
        }
        let (dir, pipeline) = executing_harness();
        std::fs::write(dir.path().join("hello.js"), "console.log(1)").unwrap();
        let out = pipeline.process("", "ejecuta hello.js").await;
        assert_eq!(out.display_text, "Result of running hello.js:\n\n1\n");
    }
}
