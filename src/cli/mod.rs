use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::assistant::{Assistant, AssistantError};
use crate::shared::config::AssistantConfig;
use crate::shared::models::{Conversation, Role};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[1;1H";

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Exit,
    Clear,
    Help,
    History,
    Prompt(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/exit" => Input::Exit,
        "/clear" => Input::Clear,
        "/help" => Input::Help,
        "/history" => Input::History,
        text => Input::Prompt(text),
    }
}

fn say(color: &str, text: &str) {
    println!("{color}{text}{RESET}");
}

fn print_banner(assistant: &Assistant, config: &AssistantConfig) {
    say(CYAN, "\n+------------------------------------------------+");
    say(CYAN, "|      codeassist - programming assistant       |");
    say(CYAN, "+------------------------------------------------+\n");
    say(BLUE, &format!("Workspace: {}", assistant.workspace().root().display()));
    say(BLUE, &format!("Model: {}", assistant.ollama().model()));
    say(
        BLUE,
        &format!(
            "Web search: {}",
            if config.search.serpapi_key.is_some() {
                "SerpAPI"
            } else {
                "public fallbacks (SearXNG, DuckDuckGo)"
            }
        ),
    );
    say(YELLOW, "\nCommands:");
    say(YELLOW, "  /exit - Quit");
    say(YELLOW, "  /clear - Clear the screen");
    say(YELLOW, "  /history - Show this session's conversation");
    say(YELLOW, "  /help - Show help\n");
}

fn print_help() {
    say(CYAN, "\nHelp:");
    println!("  Ask anything. The model can:");
    println!("    - search the web");
    println!("    - run code (JavaScript, Python, shell)");
    println!("    - create, read and list files in the workspace");
    say(YELLOW, "\n  Examples:");
    println!("    \"Search for information about React hooks\"");
    println!("    \"Create a file fibonacci.js with a fibonacci script\"");
    println!("    \"Crea un archivo index.html con un hola mundo\"");
    say(YELLOW, "\n  Commands:");
    println!("    run file.js      - run a workspace file (also: ejecuta, corre)");
    println!("    run script.sh    - run a shell script");
    println!("    /exit /clear /history /help\n");
}

fn format_history(conversation: &Conversation) -> String {
    if conversation.is_empty() {
        return "No messages yet.".to_string();
    }
    let mut out = String::new();
    for turn in conversation.turns() {
        out.push_str(&format!(
            "[{}] {}: {}\n",
            turn.created_at.format("%H:%M:%S"),
            turn.role.as_str(),
            turn.content
        ));
    }
    out
}

async fn check_model(assistant: &Assistant) {
    let ollama = assistant.ollama();
    match ollama.list_models().await {
        Ok(models) if ollama.has_model(&models) => {
            info!("Model {} is available at {}", ollama.model(), ollama.base_url());
        }
        Ok(models) => {
            let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!("Model {} not installed; available: {:?}", ollama.model(), names);
            say(
                YELLOW,
                &format!(
                    "Model {} is not installed. Run: ollama pull {}",
                    ollama.model(),
                    ollama.model()
                ),
            );
        }
        Err(e) => {
            warn!("Ollama check failed: {}", e);
            say(
                YELLOW,
                &format!("Ollama is not reachable at {}. Is it running?", ollama.base_url()),
            );
        }
    }
}

pub async fn run(config: AssistantConfig) -> Result<()> {
    let assistant = Assistant::from_config(&config)?;
    print_banner(&assistant, &config);
    check_model(&assistant).await;

    let options = config.cli.options.clone();
    let mut conversation = Conversation::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{GREEN}> {RESET}");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        let text = match parse_input(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Clear => {
                print!("{CLEAR_SCREEN}");
                continue;
            }
            Input::Help => {
                print_help();
                continue;
            }
            Input::History => {
                println!("{}", format_history(&conversation));
                continue;
            }
            Input::Prompt(text) => text,
        };

        conversation.push(Role::User, text);
        say(CYAN, "Thinking...");

        match assistant.run_turn(text, &options).await {
            Ok(processed) => {
                println!("\n{BOLD}{BLUE}Assistant:{RESET}");
                println!("{}\n", processed.display_text);
                conversation.push(Role::Assistant, processed.display_text);
            }
            Err(e @ AssistantError::Connectivity(_)) => {
                error!("Turn failed: {}", e);
                say(RED, &format!("\nError: {e}. Is Ollama running?\n"));
            }
            Err(e) => {
                error!("Turn failed: {}", e);
                say(RED, &format!("\nError: {e}\n"));
            }
        }
    }

    say(CYAN, "\nGoodbye!");
    Ok(())
}
