//! One-shot "say" command: a single turn printed to stdout.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use crate::cli::chat::run_turn;
use crate::cli::render::EventPrinter;
use crate::cli::setup::{build_session, http_client, Settings};
use crate::core::session::SharedSession;
use crate::utils::transcript::Transcript;

pub async fn run_say(
    prompt: Vec<String>,
    settings: Settings,
    log: Option<PathBuf>,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    if prompt.trim().is_empty() {
        return Err("Usage: sherpa say <prompt>".into());
    }

    let mut session = build_session(&settings, http_client()?).await?;
    let mut events = session.subscribe();
    let shared = SharedSession::new(session);
    let transcript = Transcript::new(log)?;
    let mut printer = EventPrinter::new(io::stdout());

    let outcome = run_turn(&shared, &mut events, &mut printer, &transcript, &prompt).await?;
    if outcome.cancelled {
        return Err("Cancelled".into());
    }
    Ok(())
}
