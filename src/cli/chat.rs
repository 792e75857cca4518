//! Interactive line-oriented chat.

use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::cli::render::EventPrinter;
use crate::cli::setup::{build_session, http_client, Settings};
use crate::core::events::TurnEvent;
use crate::core::models::Model;
use crate::core::session::{SharedSession, TurnOutcome};
use crate::core::upload::upload_file;
use crate::utils::transcript::Transcript;

const HELP: &str = "\
Commands:
  /upload <path>    Upload a file; its URL is attached to your next message
  /log <filename>   Enable logging to specified file
  /log              Toggle logging pause/resume
  /model [name]     Show or switch the model (before the first message only)
  /endpoints        List the plugin operations the model may call
  /help             Show this help
  /quit             Exit
Ctrl+C cancels a streaming response; at the prompt it exits.";

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplInput {
    Message(String),
    Upload(PathBuf),
    Log(Option<PathBuf>),
    Model(Option<String>),
    Endpoints,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

impl ReplInput {
    pub fn parse(line: &str) -> ReplInput {
        let line = line.trim();
        if line.is_empty() {
            return ReplInput::Empty;
        }
        let Some(command) = line.strip_prefix('/') else {
            return ReplInput::Message(line.to_string());
        };
        let (name, rest) = match command.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };
        let argument = (!rest.is_empty()).then(|| rest.to_string());
        match (name, argument) {
            ("quit" | "exit", _) => ReplInput::Quit,
            ("help", _) => ReplInput::Help,
            ("endpoints", _) => ReplInput::Endpoints,
            ("upload", Some(path)) => ReplInput::Upload(PathBuf::from(path)),
            ("upload", None) => ReplInput::Unknown("Usage: /upload <path>".to_string()),
            ("log", path) => ReplInput::Log(path.map(PathBuf::from)),
            ("model", model) => ReplInput::Model(model),
            _ => ReplInput::Unknown(format!("Unknown command: /{name}. Type /help for commands.")),
        }
    }
}

/// Sends `text` and renders the turn until it finishes. Ctrl+C cancels.
pub async fn run_turn<W: Write>(
    session: &SharedSession,
    events: &mut mpsc::UnboundedReceiver<TurnEvent>,
    printer: &mut EventPrinter<W>,
    transcript: &Transcript,
    text: &str,
) -> Result<TurnOutcome, Box<dyn Error>> {
    let cancellation = session.cancellation();
    let send = session.send(text);
    tokio::pin!(send);

    let result = loop {
        tokio::select! {
            result = &mut send => break result,
            Some(event) = events.recv() => render_event(printer, transcript, &event)?,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\n⏹  Cancelling…");
                cancellation.cancel();
            }
        }
    };
    // Events emitted just before the turn ended.
    while let Ok(event) = events.try_recv() {
        render_event(printer, transcript, &event)?;
    }

    let outcome = result?;
    if outcome.call_limit_reached {
        eprintln!("⚠️  The model asked for another function call after the limit was reached.");
    }
    Ok(outcome)
}

fn render_event<W: Write>(
    printer: &mut EventPrinter<W>,
    transcript: &Transcript,
    event: &TurnEvent,
) -> Result<(), Box<dyn Error>> {
    if let Some(message) = printer.handle(event)? {
        if let Err(err) = transcript.record(&message) {
            eprintln!("⚠️  Failed to write transcript: {err}");
        }
    }
    Ok(())
}

pub async fn run_chat(settings: Settings, log: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let client = http_client()?;
    let mut session = build_session(&settings, client.clone()).await?;
    let mut events = session.subscribe();
    let shared = SharedSession::new(session);
    let mut transcript = Transcript::new(log)?;
    let mut printer = EventPrinter::new(io::stdout());

    eprintln!("🚀 Sherpa · model: {} · chat: {}", settings.model, settings.chat_url);
    eprintln!("💡 Type /help for commands, /quit to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            return Ok(());
        };

        match ReplInput::parse(&line) {
            ReplInput::Empty => {}
            ReplInput::Quit => return Ok(()),
            ReplInput::Help => println!("{HELP}"),
            ReplInput::Unknown(message) => eprintln!("{message}"),
            ReplInput::Endpoints => {
                let session = shared.lock().await;
                super::endpoints::print_routes(session.plugin().routes());
            }
            ReplInput::Model(None) => {
                let session = shared.lock().await;
                println!("Current model: {}", session.model());
                let labels: Vec<_> = Model::ALL.iter().map(|model| model.label()).collect();
                println!("Available: {}", labels.join(", "));
            }
            ReplInput::Model(Some(name)) => {
                let result = match name.parse::<Model>() {
                    Ok(model) => shared.lock().await.set_model(model).map(|()| model),
                    Err(err) => Err(err),
                };
                match result {
                    Ok(model) => println!("✅ Switched to {model}"),
                    Err(err) => eprintln!("❌ {err}"),
                }
            }
            ReplInput::Log(Some(path)) => match transcript.set_log_file(path) {
                Ok(status) => println!("{status}"),
                Err(err) => eprintln!("❌ Failed to enable logging: {err}"),
            },
            ReplInput::Log(None) => match transcript.toggle_logging() {
                Ok(status) => println!("{status}"),
                Err(err) => eprintln!("❌ {err}"),
            },
            ReplInput::Upload(path) => {
                match upload_file(&client, &settings.upload_url, &path, settings.request_timeout)
                    .await
                {
                    Ok(url) => {
                        println!("📎 Uploaded {} → {url}", path.display());
                        shared.lock().await.attach_upload(url);
                    }
                    Err(err) => eprintln!("❌ {err}"),
                }
            }
            ReplInput::Message(text) => {
                if let Err(err) =
                    run_turn(&shared, &mut events, &mut printer, &transcript, &text).await
                {
                    eprintln!("\n❌ Error: {err}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(
            ReplInput::parse("  list files  "),
            ReplInput::Message("list files".to_string())
        );
        assert_eq!(ReplInput::parse("   "), ReplInput::Empty);
    }

    #[test]
    fn slash_commands_take_arguments() {
        assert_eq!(
            ReplInput::parse("/upload data/sales.csv"),
            ReplInput::Upload(PathBuf::from("data/sales.csv"))
        );
        assert_eq!(ReplInput::parse("/log"), ReplInput::Log(None));
        assert_eq!(
            ReplInput::parse("/log chat.txt"),
            ReplInput::Log(Some(PathBuf::from("chat.txt")))
        );
        assert_eq!(
            ReplInput::parse("/model GPT-4 Code Interpreter"),
            ReplInput::Model(Some("GPT-4 Code Interpreter".to_string()))
        );
        assert_eq!(ReplInput::parse("/exit"), ReplInput::Quit);
        assert_eq!(ReplInput::parse("/endpoints"), ReplInput::Endpoints);
    }

    #[test]
    fn bad_commands_explain_themselves() {
        assert!(matches!(
            ReplInput::parse("/upload"),
            ReplInput::Unknown(msg) if msg.contains("Usage")
        ));
        assert!(matches!(
            ReplInput::parse("/frobnicate"),
            ReplInput::Unknown(msg) if msg.contains("/frobnicate")
        ));
    }
}
