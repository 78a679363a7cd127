use std::path::Path;

use crate::shared::models::SearchResult;

/// A tag the model may emit, with a worked example of its syntax.
#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub title: &'static str,
    pub example: &'static str,
}

pub const TOOLS: &[ToolSpec] = &[
    ToolSpec {
        title: "Search the web",
        example: "[SEARCH_WEB: your query]",
    },
    ToolSpec {
        title: "Run code (javascript, python or bash)",
        example: "[EXECUTE_CODE:javascript]\nconsole.log(\"hello\");\n[/EXECUTE_CODE]",
    },
    ToolSpec {
        title: "Create a file",
        example: "[WRITE_FILE:name.js]\nconst x = 1;\n[/WRITE_FILE]",
    },
    ToolSpec {
        title: "Read a file",
        example: "[READ_FILE:name.js]",
    },
    ToolSpec {
        title: "List files",
        example: "[LIST_FILES:.]",
    },
];

pub struct ToolCatalog;

impl ToolCatalog {
    /// System prompt for tool-using turns.
    pub fn system_prompt(workspace: &Path) -> String {
        let mut prompt = String::from(
            "You are a programming assistant working inside a local workspace. You have these tools:\n\nTOOLS:\n",
        );

        for (i, tool) in TOOLS.iter().enumerate() {
            prompt.push_str(&format!("{}. {}:\n", i + 1, tool.title));
            for line in tool.example.lines() {
                prompt.push_str("   ");
                prompt.push_str(line);
                prompt.push('\n');
            }
            prompt.push('\n');
        }

        prompt.push_str(
            r#"EXAMPLES:
User: "Make a fibonacci script in js"
You: [EXECUTE_CODE:javascript]
let a=0,b=1;
for(let i=0;i<10;i++){console.log(a);let c=a+b;a=b;b=c;}
[/EXECUTE_CODE]

User: "Create file hello.js"
You: [WRITE_FILE:hello.js]
console.log("Hello World");
[/WRITE_FILE]

RULES:
- USE THE TOOLS directly, without explaining first
- Do NOT use markdown code blocks (```), use the tools
- Keep answers short and direct
- File paths are relative to the workspace
"#,
        );

        prompt.push_str(&format!("\nWorkspace: {}\n", workspace.display()));
        prompt
    }

    /// System prompt for the HTTP chat endpoint.
    pub fn conversational_prompt() -> &'static str {
        "You are an expert, concise programming assistant. Give direct, clear answers. \
         When web search information is provided, use it and cite the sources. \
         Only include code examples when they are needed."
    }

    /// Numbered context block appended to a chat prompt.
    pub fn search_context(results: &[SearchResult]) -> String {
        if results.is_empty() {
            return String::new();
        }
        let mut context = String::from("\n\nWEB SEARCH INFORMATION:\n");
        for (i, r) in results.iter().enumerate() {
            context.push_str(&format!("\n[{}] {}\n{}\nURL: {}\n", i + 1, r.title, r.snippet, r.url));
        }
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::tags;

    #[test]
    fn every_example_is_understood_by_the_tag_scanner() {
        for tool in TOOLS {
            assert_eq!(tags::scan(tool.example).len(), 1, "{}", tool.title);
        }
    }

    #[test]
    fn system_prompt_lists_tools_and_workspace() {
        let prompt = ToolCatalog::system_prompt(Path::new("/srv/ws"));
        assert!(prompt.contains("1. Search the web:\n   [SEARCH_WEB: your query]\n"));
        assert!(prompt.contains("5. List files:"));
        assert!(prompt.ends_with("Workspace: /srv/ws\n"));
    }

    #[test]
    fn search_context_numbers_results() {
        assert_eq!(ToolCatalog::search_context(&[]), "");
        let context = ToolCatalog::search_context(&[SearchResult {
            title: "T".to_string(),
            snippet: "S".to_string(),
            url: "https://u".to_string(),
        }]);
        assert_eq!(context, "\n\nWEB SEARCH INFORMATION:\n\n[1] T\nS\nURL: https://u\n");
    }
}
