//! `conversary history`: stored exchanges as a table.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use conversary_types::conversation::ConversationEntry;

use crate::cli::parse_date_arg;
use crate::state::AppState;

pub async fn show_history(state: &AppState, date: Option<&str>, all: bool, json: bool) -> Result<()> {
    let (entries, label) = if all {
        (state.conversation_service.all_entries().await?, "all days".to_string())
    } else {
        let date = parse_date_arg(date)?;
        (
            state.conversation_service.entries_for_date(date).await?,
            date.format("%Y-%m-%d").to_string(),
        )
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!();
        println!("  No conversations for {}.", style(&label).cyan());
        println!();
        return Ok(());
    }

    println!();
    println!("{}", history_table(&entries, all));
    println!(
        "  {} exchange(s) for {}",
        entries.len(),
        style(&label).cyan()
    );
    println!();
    Ok(())
}

fn history_table(entries: &[ConversationEntry], with_date: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![Cell::new("ID").fg(Color::White)];
    if with_date {
        header.push(Cell::new("Date").fg(Color::White));
    }
    header.push(Cell::new("Time").fg(Color::White));
    header.push(Cell::new("You").fg(Color::White));
    header.push(Cell::new("AI").fg(Color::White));
    table.set_header(header);

    for entry in entries {
        let mut row = vec![Cell::new(entry.id).fg(Color::DarkGrey)];
        if with_date {
            row.push(Cell::new(entry.date.format("%Y-%m-%d")));
        }
        let local_time = entry.created_at.with_timezone(&chrono::Local);
        row.push(Cell::new(local_time.format("%H:%M")).fg(Color::DarkGrey));
        row.push(Cell::new(&entry.user_message).fg(Color::Cyan));
        row.push(Cell::new(&entry.ai_response));
        table.add_row(row);
    }

    table
}
