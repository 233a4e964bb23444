//! Command execution.
//!
//! Runs one CLI command against a `ClientState` and prints its result as JSON
//! on stdout. Logs go to stderr.

use std::error::Error;

use clap::Subcommand;
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;
use tracing::{info, warn};

use crate::api::StudyMode;
use crate::gateway::ApiRequest;
use crate::session::{EndReason, SessionEvent};
use crate::state::ClientState;

/// Environment variable the password is read from when `--password` is absent.
pub const PASSWORD_ENV: &str = "FLASHGATE_PASSWORD";

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Sign in and store the issued tokens
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "FLASHGATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored tokens
    Logout,

    /// Show the signed-in user, if any
    Whoami,

    /// List decks
    Decks {
        /// Include decks of other users
        #[arg(long)]
        all: bool,
    },

    /// List the cards of a deck
    Cards { deck: i64 },

    /// Draw the next card to study
    Next {
        deck: i64,
        #[arg(long, value_enum, default_value_t = StudyMode::All)]
        mode: StudyMode,
    },

    /// Flip the learned flag of a card
    Toggle { deck: i64, card: i64 },

    /// Reset study progress of a deck
    Reset { deck: i64 },

    /// Authenticated GET of an arbitrary API path; prints the raw body
    Get { path: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Logs every session event already published to `events` and returns them.
pub fn drain_session_events(events: &mut Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => {
                match &event {
                    SessionEvent::Ended {
                        reason: EndReason::RenewalFailed(e),
                    } => warn!("Session ended ({}); log in again", e),
                    other => info!("Session event: {:?}", other),
                }
                seen.push(event);
            }
            Err(TryRecvError::Lagged(skipped)) => warn!("Missed {} session events", skipped),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    seen
}

/// Runs `command` and prints its result.
///
/// # Errors
///
/// Returns an error if the command fails or its result cannot be printed.
pub async fn run(state: ClientState, command: Command) -> Result<(), Box<dyn Error>> {
    let mut events = state.session().subscribe();
    let result = execute(&state, command).await;
    drain_session_events(&mut events);
    result
}

async fn execute(state: &ClientState, command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Login { username, password } => {
            let password = password.ok_or_else(|| {
                format!("a password is required (--password or {})", PASSWORD_ENV)
            })?;
            let profile = state.account.login(&username, &password).await?;
            print_json(&profile)?;
        }
        Command::Logout => {
            state.account.logout();
            print_json(&json!({ "status": "logged_out" }))?;
        }
        Command::Whoami => print_json(&state.account.restore().await)?,
        Command::Decks { all } => print_json(&state.decks.list(all).await?)?,
        Command::Cards { deck } => print_json(&state.decks.cards(deck).await?)?,
        Command::Next { deck, mode } => {
            print_json(&state.decks.next_card(deck, mode, &[]).await?)?
        }
        Command::Toggle { deck, card } => {
            print_json(&state.decks.toggle_learned(deck, card).await?)?
        }
        Command::Reset { deck } => {
            state.decks.reset_progress(deck).await?;
            print_json(&json!({ "status": true }))?;
        }
        Command::Get { path } => {
            let response = state.gateway.send(ApiRequest::get(path)).await?;
            println!("{}", response.text());
        }
    }
    Ok(())
}
