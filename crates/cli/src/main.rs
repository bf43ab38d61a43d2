use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use novacite_agents::{Assistant, AssistantRuntime};
use novacite_core::Settings;
use novacite_observability::{init_tracing, AppMetrics};
use novacite_scrape::{
    parse_choice, run_daily, CircularMenu, CircularSelector, ListOnlySelector, Selection,
};
use tracing::{error, info};

const FAILURE_MESSAGE: &str =
    "Unexpected error: something went wrong while answering. Please try again.";

#[derive(Debug, Parser)]
#[command(name = "novacite")]
#[command(about = "NovaCite college assistant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive question loop (default).
    Chat,
    /// Answer a single query and exit.
    Ask { query: String },
    /// Scrape faculty listings and rebuild the faculty table.
    IngestFaculty,
    /// Run one circulars refresh pass.
    RefreshCirculars,
    /// Refresh circulars every day at SCRAPE_HOUR.
    Schedule,
}

/// Reads the circular choice from the terminal.
struct StdinSelector;

#[async_trait]
impl CircularSelector for StdinSelector {
    async fn select(&self, menu: &CircularMenu) -> Selection {
        println!("\n{}", menu.render());
        let options = menu.options.len();
        let answer = tokio::task::spawn_blocking(move || {
            print!("Choice: ");
            io::stdout().flush()?;
            let mut line = String::new();
            let read = io::stdin().read_line(&mut line)?;
            Ok::<_, io::Error>((read, line))
        })
        .await;

        match answer {
            Ok(Ok((0, _))) => Selection::Skip,
            Ok(Ok((_, line))) => parse_choice(&line, options),
            Ok(Err(err)) => {
                error!(error = %err, "failed reading circular choice");
                Selection::Invalid
            }
            Err(err) => {
                error!(error = %err, "circular choice task failed");
                Selection::Invalid
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let settings = Settings::from_env();
    init_tracing("novacite_cli", Some(settings.log_dir.as_path()));
    let cli = Cli::parse();

    let runtime = AssistantRuntime::connect(settings).await?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => {
            let assistant = runtime
                .assistant(Arc::new(StdinSelector), AppMetrics::shared())
                .await?;
            run_chat(&assistant).await?;
        }
        Command::Ask { query } => {
            let assistant = runtime
                .assistant(Arc::new(ListOnlySelector), AppMetrics::shared())
                .await?;
            let reply = assistant.respond(&query).await.context("query failed")?;
            println!("{}", reply.result);
        }
        Command::IngestFaculty => {
            let records = runtime.faculty_scraper().scrape_all().await;
            info!(scraped = records.len(), "faculty scrape finished");
            let stored = runtime.faculty_loader().store(records).await?;
            println!("Stored {stored} faculty records.");
        }
        Command::RefreshCirculars => {
            let outcome = runtime
                .circulars_desk(Arc::new(ListOnlySelector))
                .refresh()
                .await?;
            println!("Circulars refresh: {outcome:?}");
        }
        Command::Schedule => {
            let desk = runtime.circulars_desk(Arc::new(ListOnlySelector));
            run_daily(&desk, runtime.settings().scrape_hour).await?;
        }
    }

    Ok(())
}

async fn run_chat(assistant: &Assistant) -> Result<()> {
    println!("NovaCite chat mode. type 'exit' to quit.");

    loop {
        print!("You: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        match assistant.respond(query).await {
            Ok(reply) => {
                info!("USER: {query} | INTENT: {}", reply.intent);
                info!("BOT: {}", reply.result);
                println!("\n{}\n", reply.result);
            }
            Err(err) => {
                error!(query, error = %err, "query failed");
                println!("\n{FAILURE_MESSAGE}\n");
            }
        }
    }

    Ok(())
}
