use std::error::Error;
use std::io::Write;
use std::time::Duration;
use rustyline::DefaultEditor;

use crate::config::Settings;
use super::command_handlers::{
    handle_attach, handle_infer, handle_init, handle_status, Attachments, ChatContext,
};
use crate::session::Modality;

const GREEN: &str = "\x1b[32m";
const CYAN: &str = "\x1b[36m";
const BRIGHT_CYAN: &str = "\x1b[96m";
const RESET: &str = "\x1b[0m";

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum Command<'a> {
    Exit,
    Help,
    Clear,
    Init,
    Status,
    Attach(Modality, &'a str),
    /// `image`/`audio` without a path
    Usage(&'static str),
    Prompt(&'a str),
}

/// Commands are matched case-insensitively; anything else is a prompt.
pub(super) fn parse_command(input: &str) -> Command<'_> {
    let (word, rest) = match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    };

    match (word.to_lowercase().as_str(), rest.is_empty()) {
        ("exit" | "bye" | "quit", true) => Command::Exit,
        ("help", true) => Command::Help,
        ("clear", true) => Command::Clear,
        ("init", true) => Command::Init,
        ("status", true) => Command::Status,
        ("image", true) => Command::Usage("image <path>"),
        ("audio", true) => Command::Usage("audio <path>"),
        ("image", false) => Command::Attach(Modality::Image, rest),
        ("audio", false) => Command::Attach(Modality::Audio, rest),
        _ => Command::Prompt(input),
    }
}

fn print_help() {
    println!("\n{CYAN}aidy Chat Commands{RESET}");
    println!("{BRIGHT_CYAN}{}{RESET}", "=".repeat(60));
    println!("{GREEN}exit, bye, quit{RESET} - Exit the chat");
    println!("{GREEN}help{RESET}            - Show this help message");
    println!("{GREEN}clear{RESET}           - Clear the screen and staged attachments");
    println!("{GREEN}init{RESET}            - Load the model and open a session");
    println!("{GREEN}status{RESET}          - Show the model state");
    println!("{GREEN}image <path>{RESET}    - Attach an image to the next prompt");
    println!("{GREEN}audio <path>{RESET}    - Attach an audio clip to the next prompt");
    println!("Anything else is sent to the model as the prompt text.");
    println!();
}

/// Runs the interactive client against the server configured in `settings`.
pub async fn chat_loop(settings: &Settings) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("Starting chat session");
    print_help();

    let mut rl = DefaultEditor::new()?;
    let mut builder = reqwest::Client::builder();
    if settings.worker.request_timeout_secs > 0 {
        // Leave the server room to report its own timeout first
        builder = builder.timeout(Duration::from_secs(settings.worker.request_timeout_secs + 5));
    }
    let client = builder.build()?;
    let server_url = format!("http://{}:{}", settings.server.host, settings.server.port);
    let mut staged = Attachments::default();

    loop {
        let prompt_prefix = if staged.is_empty() { "> ".to_string() } else { format!("[{}] > ", staged.summary()) };
        let input = match rl.readline(&prompt_prefix) {
            Ok(input) => input,
            Err(_) => {
                println!("Goodbye!");
                break;
            }
        };
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(input);

        let mut context = ChatContext { client: &client, server_url: &server_url, staged: &mut staged };
        match parse_command(input) {
            Command::Exit => {
                println!("Goodbye!");
                break;
            }
            Command::Help => print_help(),
            Command::Clear => {
                context.staged.clear();
                print!("\x1B[2J\x1B[1;1H");
                std::io::stdout().flush()?;
            }
            Command::Init => handle_init(&context).await,
            Command::Status => handle_status(&context).await,
            Command::Attach(modality, path) => handle_attach(&mut context, modality, path),
            Command::Usage(usage) => println!("Usage: {}", usage),
            Command::Prompt(text) => handle_infer(&mut context, text).await,
        }
    }
    Ok(())
}
