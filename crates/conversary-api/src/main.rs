//! Conversary CLI and REST API entry point.
//!
//! Binary name: `conversary`
//!
//! Parses CLI arguments, initializes database and services, then dispatches
//! to the appropriate command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use std::sync::Arc;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, ModelCommand, SummaryCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    conversary_observe::init_tracing(cli.log_filter(), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "conversary", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli).await;
    conversary_observe::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init(cli.show_progress()).await?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            preload,
        } => {
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);
            serve(state, &host, port, preload).await?;
        }

        Commands::Chat { message } => {
            cli::chat::chat(&state, message, cli.json, cli.quiet).await?;
        }

        Commands::History { date, all } => {
            cli::history::show_history(&state, date.as_deref(), all, cli.json).await?;
        }

        Commands::Summary { action } => match action {
            SummaryCommand::Add {
                text,
                sentiment,
                notes,
            } => {
                cli::summary::add_summary(&state, text, sentiment, notes, cli.json).await?;
            }
            SummaryCommand::Show { date } => {
                cli::summary::show_summary(&state, date.as_deref(), cli.json).await?;
            }
        },

        Commands::Model { action } => match action {
            ModelCommand::Pull { force } => {
                cli::model::pull(&state, force, cli.json, cli.quiet).await?;
            }
            ModelCommand::Info => {
                cli::model::info(&state, cli.json).await?;
            }
        },

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}

async fn serve(state: AppState, host: &str, port: u16, preload: bool) -> anyhow::Result<()> {
    if preload {
        let runtime = Arc::clone(&state.runtime);
        tokio::spawn(async move {
            if let Err(e) = runtime.ensure_loaded().await {
                tracing::warn!(error = %e, "Model preload failed; will retry on first request");
            }
        });
    }

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Conversary API listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
