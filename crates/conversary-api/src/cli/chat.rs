//! `conversary chat`: talk to the model from the terminal.
//!
//! Exchanges are stored exactly like API conversations, so the CLI and the
//! REST API share the same daily history.

use anyhow::Result;
use console::style;
use dialoguer::Input;
use indicatif::{ProgressBar, ProgressStyle};

use conversary_types::conversation::ConversationEntry;

use crate::state::AppState;

const EXIT_COMMANDS: [&str; 3] = ["/exit", "/quit", "/bye"];

/// Send one message, or run an interactive loop when `message` is `None`.
pub async fn chat(
    state: &AppState,
    message: Option<String>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    match message {
        Some(message) => {
            let entry = send_with_spinner(state, &message, json || quiet).await?;
            print_reply(&entry, json)
        }
        None => interactive(state, json).await,
    }
}

async fn interactive(state: &AppState, json: bool) -> Result<()> {
    if !json {
        let today = chrono::Local::now().date_naive();
        let history = state.conversation_service.history_for(today).await?;
        println!();
        println!(
            "  {} Talking to {} ({} earlier exchanges today)",
            style("💬").bold(),
            style(&state.config.model.id).cyan(),
            history.len()
        );
        println!("  {}", style("Type /exit to leave").dim());
        println!();
    }

    loop {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let line = line.trim();

        if line.is_empty() {
            continue;
        }
        if EXIT_COMMANDS.contains(&line) {
            break;
        }

        match send_with_spinner(state, line, json).await {
            Ok(entry) => print_reply(&entry, json)?,
            // A failed exchange is not stored; keep the session going.
            Err(e) => eprintln!("  {} {e}", style("✗").red().bold()),
        }
    }

    Ok(())
}

async fn send_with_spinner(
    state: &AppState,
    message: &str,
    hidden: bool,
) -> Result<ConversationEntry> {
    if !state.runtime.is_loaded() {
        // A download draws its own progress bar; a spinner would garble it.
        let downloading = state.runtime.backend().needs_download();
        let loading = spinner("Loading model...", hidden || downloading)?;
        let loaded = state.runtime.ensure_loaded().await;
        loading.finish_and_clear();
        loaded?;
    }

    let thinking = spinner("Thinking...", hidden)?;
    let result = state.conversation_service.send(message).await;
    thinking.finish_and_clear();
    Ok(result?)
}

fn spinner(message: &'static str, hidden: bool) -> Result<ProgressBar> {
    if hidden {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    Ok(spinner)
}

fn print_reply(entry: &ConversationEntry, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entry)?);
    } else {
        println!("{} {}", style("AI:").green().bold(), entry.ai_response);
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_spinner_draws_nothing() {
        let bar = spinner("Loading model...", true).unwrap();
        assert!(bar.is_hidden());
    }
}
