//! html-agent
//!
//! Terminal chat with a DeepSeek-backed agent that can multiply numbers and
//! publish HTML pages to a local preview server.

mod cli;
mod state;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{Agent, LlmProvider};
use agent_runtime::DeepSeekProvider;

use crate::cli::{Cli, is_exit_command};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so answers on stdout stay readable
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let provider = Arc::new(
        DeepSeekProvider::from_env().context("DeepSeek is not configured; set DEEPSEEK_API_KEY")?,
    );

    match provider.health_check().await {
        Ok(true) => tracing::info!("✓ Connected to DeepSeek ({})", provider.config().base_url),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ DeepSeek not reachable - questions will fail until it is");
        }
    }

    let state = AppState::build(&cli, provider)?;

    tracing::info!("Registered {} tools:", state.agent.tools().len());
    for name in state.agent.tools().names() {
        tracing::info!("  • {}", name);
    }
    tracing::info!(
        "Previews are written to {}",
        state.publisher.output_dir().display()
    );

    match cli.one_shot() {
        Some(task) => {
            answer(&state.agent, &task).await;
            // The preview server dies with the process; keep it up for the page just opened
            if state.publisher.server().is_running() {
                println!("Serving previews, press Ctrl-C to stop.");
                tokio::signal::ctrl_c().await?;
            }
        }
        None => prompt_loop(&state.agent).await?,
    }

    Ok(())
}

/// Read questions from stdin until an exit word or end of input
async fn prompt_loop(agent: &Agent) -> anyhow::Result<()> {
    println!("========== type exit, quit or 退出 to leave ==========");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        if is_exit_command(&line) {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        answer(agent, question).await;
    }

    println!("Goodbye.");
    Ok(())
}

async fn answer(agent: &Agent, question: &str) {
    match agent.ask(question).await {
        Ok(reply) => println!("Assistant: {reply}"),
        Err(e) => {
            tracing::error!(error = %e, "Agent failed");
            println!("Assistant: {}", e.user_message());
        }
    }
}
