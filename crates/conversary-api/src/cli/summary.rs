//! `conversary summary`: record and show daily summaries.

use anyhow::Result;
use console::style;
use dialoguer::Input;

use conversary_types::conversation::DailySummary;
use conversary_types::error::RepositoryError;

use crate::cli::parse_date_arg;
use crate::state::AppState;

pub async fn add_summary(
    state: &AppState,
    text: Option<String>,
    sentiment: Option<f64>,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    let text = match text {
        Some(t) => t,
        None => Input::<String>::new()
            .with_prompt("How was your day?")
            .interact_text()?,
    };

    let summary = state.summary_service.create(&text, sentiment, notes).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Summary saved for {}",
        style("✓").green().bold(),
        style(summary.date.format("%Y-%m-%d")).cyan()
    );
    println!();
    Ok(())
}

pub async fn show_summary(state: &AppState, date: Option<&str>, json: bool) -> Result<()> {
    let date = parse_date_arg(date)?;

    let summary = match state.summary_service.for_date(date).await {
        Ok(summary) => summary,
        Err(RepositoryError::NotFound) => {
            anyhow::bail!("no summary for {}", date.format("%Y-%m-%d"));
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(summary: &DailySummary) {
    println!();
    println!(
        "  {}  {}",
        style("Date:").bold(),
        style(summary.date.format("%Y-%m-%d")).cyan()
    );
    if let Some(score) = summary.sentiment_score {
        println!("  {}  {score:.2}", style("Sentiment:").bold());
    }
    println!();
    println!("  {}", summary.summary_text);
    if let Some(notes) = &summary.notes {
        println!();
        println!("  {}  {}", style("Notes:").bold(), style(notes).dim());
    }
    println!();
}
