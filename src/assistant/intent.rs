//! Heuristics over the user's instruction for when the model answers with a
//! plain code fence instead of a tool tag.

use once_cell::sync::Lazy;
use regex::Regex;

use super::executor::Language;
use super::tags::{without_fences, FencedBlock};

static CREATE_FILE_VERB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:crear|crea|escribe|escribir|haz|hacer|generar|genera|create|write|make|generate)\s+(?:(?:un|una|a|an|the|el)\s+)?(?:archivo|file)\b",
    )
    .expect("create file pattern")
});
static KNOWN_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(?:js|py|html|css)\b").expect("extension pattern"));
static NAMED_IN_INSTRUCTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:archivo|file)\s+(?:(?:named|called|llamado)\s+)?[`'"]?([\w./-]+\.\w+)"#,
    )
    .expect("instruction file name pattern")
});
static NAMED_IN_RESPONSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([\w/-]+(?:\.[\w-]+)*\.(?:js|mjs|ts|py|sh|html|css|json|md|txt))\b")
        .expect("response file name pattern")
});
static QUOTED_NAME_IN_RESPONSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)[`'"]([\w/-]+(?:\.[\w-]+)*\.(?:js|mjs|ts|py|sh|html|css|json|md|txt))[`'"]"#)
        .expect("quoted response file name pattern")
});
static EXECUTE_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:ejecuta?r?|corre?r?|run|execute)\s+(\S+)")
        .expect("execute command pattern")
});

/// True if the instruction asks for a file to be created, either with a
/// create/write verb followed by "file"/"archivo" or by naming a source file
/// extension. Run commands never count, even though they name a file.
pub fn wants_file(instruction: &str) -> bool {
    if execute_target(instruction).is_some() {
        return false;
    }
    CREATE_FILE_VERB.is_match(instruction) || KNOWN_EXTENSION.is_match(instruction)
}

/// File named by a "run"/"ejecuta"/"corre" command at the start of the instruction.
pub fn execute_target(instruction: &str) -> Option<String> {
    let c = EXECUTE_COMMAND.captures(instruction)?;
    let target = c[1].trim_matches(|ch| matches!(ch, '`' | '\'' | '"'));
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

/// Everything a file-name extractor may look at.
pub struct NamingContext<'a> {
    pub instruction: &'a str,
    pub response: &'a str,
    pub block: &'a FencedBlock,
}

pub type FileNameExtractor = fn(&NamingContext<'_>) -> Option<String>;

/// Extractors in priority order; the first one that produces a name wins.
pub const FILE_NAME_CHAIN: &[FileNameExtractor] =
    &[named_in_instruction, named_in_response, default_for_language];

pub fn choose_file_name(ctx: &NamingContext<'_>) -> String {
    FILE_NAME_CHAIN
        .iter()
        .find_map(|extract| extract(ctx))
        .unwrap_or_else(|| "output".to_string())
}

pub fn named_in_instruction(ctx: &NamingContext<'_>) -> Option<String> {
    NAMED_IN_INSTRUCTION
        .captures(ctx.instruction)
        .map(|c| clean_name(&c[1]))
        .filter(|name| !name.is_empty())
}

// Prose only: identifiers like `console.log` inside the code would otherwise match.
// A quoted name wins over a bare one.
pub fn named_in_response(ctx: &NamingContext<'_>) -> Option<String> {
    let prose = without_fences(ctx.response);
    if let Some(c) = QUOTED_NAME_IN_RESPONSE.captures(&prose) {
        let name = clean_name(&c[1]);
        if !name.is_empty() {
            return Some(name);
        }
    }
    NAMED_IN_RESPONSE
        .captures_iter(&prose)
        .map(|c| clean_name(&c[1]))
        .find(|name| !name.is_empty() && !is_library_name(name))
}

/// `Node.js`, `Vue.js`: capitalised bare `.js` words name libraries, not files.
fn is_library_name(name: &str) -> bool {
    !name.contains('/')
        && name.to_ascii_lowercase().ends_with(".js")
        && name.chars().next().is_some_and(|ch| ch.is_ascii_uppercase())
}

pub fn default_for_language(ctx: &NamingContext<'_>) -> Option<String> {
    let language = ctx.block.language_or_default();
    let name = match language {
        "html" => "index.html",
        "css" => "styles.css",
        _ => match language.parse::<Language>() {
            Ok(Language::JavaScript) => "script.js",
            Ok(Language::Python) => "script.py",
            _ => "output",
        },
    };
    Some(name.to_string())
}

fn clean_name(raw: &str) -> String {
    raw.trim_end_matches(|ch| matches!(ch, '.' | ',' | ';' | ':'))
        .to_string()
}
