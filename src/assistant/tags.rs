//! Lexing of model output: reasoning removal, the five bracketed tool tags and
//! markdown code fences.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static THINK_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("think block pattern"));
static THINKING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^[ \t]*thinking:.*$").expect("thinking line pattern"));

static SEARCH_WEB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[SEARCH_WEB:\s*(.+?)\]").expect("search tag pattern"));
static EXECUTE_CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\[EXECUTE_CODE:(\w+)\]\s*(.+?)\s*\[/EXECUTE_CODE\]")
        .expect("execute tag pattern")
});
static WRITE_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\[WRITE_FILE:([^\]\n]+?)\]\s*(.+?)\s*\[/WRITE_FILE\]")
        .expect("write tag pattern")
});
static READ_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[READ_FILE:([^\]\n]+)\]").expect("read tag pattern"));
static LIST_FILES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[LIST_FILES:([^\]\n]+)\]").expect("list tag pattern"));

const MARK_OPEN: char = '\u{E000}';
const MARK_CLOSE: char = '\u{E001}';
static MARK: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}(\\d+)\u{E001}").expect("substitution mark pattern"));

static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(\w+)?[ \t]*\r?\n(.+?)```").expect("fence pattern"));

/// A tool request found in model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    WebSearch { query: String },
    ExecuteCode { language: String, body: String },
    WriteFile { path: String, body: String },
    ReadFile { path: String },
    ListFiles { dir: String },
}

impl ToolInvocation {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolInvocation::WebSearch { .. } => "search_web",
            ToolInvocation::ExecuteCode { .. } => "execute_code",
            ToolInvocation::WriteFile { .. } => "write_file",
            ToolInvocation::ReadFile { .. } => "read_file",
            ToolInvocation::ListFiles { .. } => "list_files",
        }
    }
}

/// One tag occurrence: where it sits in the response, its exact text and what
/// it asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatch {
    pub range: Range<usize>,
    pub span: String,
    pub invocation: ToolInvocation,
}

impl TagMatch {
    fn new(c: &Captures<'_>, invocation: ToolInvocation) -> Self {
        let whole = c.get(0).map(|m| (m.range(), m.as_str().to_string()));
        let (range, span) = whole.unwrap_or_default();
        Self {
            range,
            span,
            invocation,
        }
    }
}

/// First occurrence of each tag kind, in dispatch order
/// (search, execute, write, read, list). Later occurrences of a kind are ignored.
pub fn scan(response: &str) -> Vec<TagMatch> {
    let mut out = Vec::new();

    if let Some(c) = SEARCH_WEB.captures(response) {
        out.push(TagMatch::new(
            &c,
            ToolInvocation::WebSearch {
                query: c[1].trim().to_string(),
            },
        ));
    }
    if let Some(c) = EXECUTE_CODE.captures(response) {
        out.push(TagMatch::new(
            &c,
            ToolInvocation::ExecuteCode {
                language: c[1].to_string(),
                body: c[2].trim().to_string(),
            },
        ));
    }
    if let Some(c) = WRITE_FILE.captures(response) {
        out.push(TagMatch::new(
            &c,
            ToolInvocation::WriteFile {
                path: c[1].trim().to_string(),
                body: c[2].trim().to_string(),
            },
        ));
    }
    if let Some(c) = READ_FILE.captures(response) {
        out.push(TagMatch::new(
            &c,
            ToolInvocation::ReadFile {
                path: c[1].trim().to_string(),
            },
        ));
    }
    if let Some(c) = LIST_FILES.captures(response) {
        out.push(TagMatch::new(
            &c,
            ToolInvocation::ListFiles {
                dir: c[1].trim().to_string(),
            },
        ));
    }

    out
}

/// Removes `<think>...</think>` spans and `thinking:` lines, then trims.
/// Applying it twice gives the same text as applying it once.
pub fn strip_thinking(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let without_blocks = THINK_BLOCK.replace_all(&current, "");
        let next = THINKING_LINE.replace_all(&without_blocks, "").trim().to_string();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Builds display text from a raw response: reasoning is stripped as in
/// [`strip_thinking`] and each substitution range (byte offsets into
/// `response`) is replaced by its text. Ranges overlapping an earlier one are
/// skipped. A range inside stripped reasoning disappears along with it.
/// Substituted text is inserted after stripping and is never altered.
pub fn render(response: &str, substitutions: &[(Range<usize>, String)]) -> String {
    let mut ordered: Vec<(usize, &Range<usize>)> =
        substitutions.iter().map(|(range, _)| range).enumerate().collect();
    ordered.sort_by_key(|(_, range)| range.start);

    let mut marked = String::with_capacity(response.len());
    let mut cursor = 0;
    for (index, range) in ordered {
        if range.start < cursor || range.end > response.len() {
            continue;
        }
        marked.push_str(&response[cursor..range.start].replace([MARK_OPEN, MARK_CLOSE], ""));
        marked.push(MARK_OPEN);
        marked.push_str(&index.to_string());
        marked.push(MARK_CLOSE);
        cursor = range.end;
    }
    marked.push_str(&response[cursor..].replace([MARK_OPEN, MARK_CLOSE], ""));

    let stripped = strip_thinking(&marked);
    MARK.replace_all(&stripped, |c: &Captures<'_>| {
        c[1].parse::<usize>()
            .ok()
            .and_then(|index| substitutions.get(index))
            .map(|(_, text)| text.clone())
            .unwrap_or_default()
    })
    .into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    pub language: Option<String>,
    pub body: String,
}

impl FencedBlock {
    /// Language tag with the untagged default applied.
    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or("javascript")
    }
}

pub fn first_fenced_block(text: &str) -> Option<FencedBlock> {
    let c = FENCED_CODE.captures(text)?;
    Some(FencedBlock {
        language: c.get(1).map(|m| m.as_str().to_ascii_lowercase()),
        body: c[2].trim().to_string(),
    })
}

/// Text with every fenced block removed, used when looking for file names in prose.
pub fn without_fences(text: &str) -> String {
    FENCED_CODE.replace_all(text, " ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_finds_one_of_each_kind_in_dispatch_order() {
        let response = "Listing [list_files:src] then\n\
            [READ_FILE: notes.md ]\n\
            [WRITE_FILE:out/a.txt]\n  hello \n[/WRITE_FILE]\n\
            [EXECUTE_CODE:python]\nprint(1)\n[/EXECUTE_CODE]\n\
            [SEARCH_WEB: rust async]";
        let kinds: Vec<_> = scan(response).iter().map(|m| m.invocation.kind()).collect();
        assert_eq!(
            kinds,
            vec!["search_web", "execute_code", "write_file", "read_file", "list_files"]
        );

        let matches = scan(response);
        assert_eq!(
            matches[2].invocation,
            ToolInvocation::WriteFile {
                path: "out/a.txt".to_string(),
                body: "hello".to_string()
            }
        );
        assert_eq!(
            matches[3].invocation,
            ToolInvocation::ReadFile {
                path: "notes.md".to_string()
            }
        );
        assert_eq!(matches[4].span, "[list_files:src]");
    }

    #[test]
    fn only_the_first_occurrence_of_a_kind_is_returned() {
        let matches = scan("[READ_FILE:a.txt] and [READ_FILE:b.txt]");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].span, "[READ_FILE:a.txt]");
    }

    #[test]
    fn execute_body_is_trimmed_and_multiline() {
        let matches = scan("[execute_code:js]\n\n  const a = 1;\n  console.log(a);\n\n[/Execute_Code]");
        assert_eq!(
            matches[0].invocation,
            ToolInvocation::ExecuteCode {
                language: "js".to_string(),
                body: "const a = 1;\n  console.log(a);".to_string()
            }
        );
    }

    #[test]
    fn write_path_cannot_span_a_bracket() {
        assert!(scan("[WRITE_FILE:a]b]\nx\n[/WRITE_FILE]").iter().all(|m| match &m.invocation {
            ToolInvocation::WriteFile { path, .. } => !path.contains(']'),
            _ => true,
        }));
    }

    #[test]
    fn plain_text_has_no_tags() {
        assert!(scan("Just an answer with [brackets] and a link [x](y).").is_empty());
    }

    #[test]
    fn strip_thinking_removes_blocks_and_labels() {
        let raw = "<THINK>\nplan the answer\n</think>\nthinking: still planning\nThe answer is 42.\n";
        assert_eq!(strip_thinking(raw), "The answer is 42.");
    }

    #[test]
    fn strip_thinking_is_idempotent() {
        let samples = [
            "<think>a<think>b</think>c</think>  done",
            "  thinking: x\n\n  Thinking: y\nkeep me",
            "nothing to strip",
            "<think>only thoughts</think>",
        ];
        for sample in samples {
            let once = strip_thinking(sample);
            assert_eq!(strip_thinking(&once), once, "sample: {sample:?}");
        }
    }

    #[test]
    fn scan_records_byte_ranges() {
        let response = "see [READ_FILE:a.txt] then [LIST_FILES:.]";
        for m in scan(response) {
            assert_eq!(&response[m.range.clone()], m.span);
        }
    }

    #[test]
    fn render_replaces_by_position_not_by_text() {
        let response = "[READ_FILE:doc.txt]\nNow listing: [LIST_FILES:.]";
        let matches = scan(response);
        let substitutions = vec![
            (matches[0].range.clone(), "usage: [LIST_FILES:.]".to_string()),
            (matches[1].range.clone(), "LISTING".to_string()),
        ];
        assert_eq!(
            render(response, &substitutions),
            "usage: [LIST_FILES:.]\nNow listing: LISTING"
        );
    }

    #[test]
    fn render_keeps_thinking_lines_inside_tags_out_of_the_strip() {
        let response = "thinking: plan\n[WRITE_FILE:n.txt]\nthinking: draft\nreal\n[/WRITE_FILE]";
        let matches = scan(response);
        let substitutions = vec![(matches[0].range.clone(), "saved".to_string())];
        assert_eq!(render(response, &substitutions), "saved");
    }

    #[test]
    fn render_drops_tags_inside_reasoning_and_stray_marks() {
        let response = "<think>maybe [LIST_FILES:.]</think>Answer \u{E000}0\u{E001}";
        let matches = scan(response);
        let substitutions = vec![(matches[0].range.clone(), "LISTING".to_string())];
        assert_eq!(render(response, &substitutions), "Answer 0");
    }

    #[test]
    fn render_without_substitutions_matches_strip_thinking() {
        let response = "<think>x</think>\nthinking: y\n  The answer.  ";
        assert_eq!(render(response, &[]), strip_thinking(response));
    }

    #[test]
    fn fenced_block_language_defaults_to_javascript() {
        let block = first_fenced_block("Here:\n```\nconsole.log(1)\n```\n").unwrap();
        assert_eq!(block.language, None);
        assert_eq!(block.language_or_default(), "javascript");
        assert_eq!(block.body, "console.log(1)");

        let block = first_fenced_block("```Python\nprint('hi')\n```\n```js\nx\n```").unwrap();
        assert_eq!(block.language.as_deref(), Some("python"));
        assert_eq!(block.body, "print('hi')");
    }

    #[test]
    fn without_fences_keeps_prose() {
        let text = "Save as app.py:\n```python\nimport os.path\n```\nDone.";
        let prose = without_fences(text);
        assert!(prose.contains("app.py"));
        assert!(!prose.contains("os.path"));
    }
}
