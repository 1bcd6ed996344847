//! # Analyst Chat CLI (`achat`)
//!
//! The `achat` binary is the terminal interface for Analyst Chat. It drives
//! a conversation with the hosted analyst API, executes the SQL the analyst
//! returns, and renders tables and charts inline.
//!
//! ## Usage
//!
//! ```bash
//! achat --config ./config/achat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `achat chat` | Interactive conversation (REPL) |
//! | `achat ask "<question>"` | One question, one rendered answer |
//! | `achat query "<sql>"` | Run raw SQL and render the result |
//! | `achat models` | List configured semantic models |
//! | `achat serve` | Start the chat HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Interactive chat against the default semantic model
//! achat chat --config ./config/achat.toml
//!
//! # One-shot question
//! achat ask "show total revenue by month"
//!
//! # Raw SQL with an explicit chart
//! achat query "SELECT month, revenue FROM monthly" --x month --y revenue --chart line
//!
//! # Serve the JSON API for a browser front end
//! achat serve
//! ```

mod analyst;
mod chart;
mod config;
mod controller;
mod error;
mod executor;
mod models;
mod render;
mod server;
mod session;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::AsyncBufReadExt;

use crate::analyst::AnalystClient;
use crate::chart::ChartKind;
use crate::config::Config;
use crate::controller::TurnController;
use crate::executor::{create_engine, QueryExecutor};
use crate::models::Role;
use crate::render::{ChartOptions, Renderer, Surface, TermSurface};
use crate::session::Session;

/// Analyst Chat — talk to your warehouse in natural language.
#[derive(Parser)]
#[command(
    name = "achat",
    about = "Analyst Chat — a chat-style natural-language analytics client for managed warehouses",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/achat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Interactive conversation with the analyst.
    ///
    /// Questions are typed directly; suggestions returned by the analyst
    /// are numbered and picked with `:1`..`:9`. `:model <ref>` switches the
    /// semantic model (and clears the conversation), `:reset` clears it
    /// explicitly, `:quit` exits.
    Chat {
        /// Semantic model to start with (defaults to the configured one).
        #[arg(long)]
        model: Option<String>,
    },

    /// Ask one question and render the full exchange.
    Ask {
        /// The question to send.
        question: String,

        /// Semantic model to use (defaults to the configured one).
        #[arg(long)]
        model: Option<String>,
    },

    /// Execute a raw SQL statement through the warehouse engine.
    ///
    /// Renders the result as a table plus a chart when the column set
    /// allows one.
    Query {
        /// The SQL statement to run.
        statement: String,

        /// X axis column (defaults to the first column).
        #[arg(long)]
        x: Option<String>,

        /// Y axis column (defaults to the first column other than X).
        #[arg(long)]
        y: Option<String>,

        /// Chart kind: `line` or `bar`.
        #[arg(long)]
        chart: Option<String>,
    },

    /// List configured semantic models.
    Models,

    /// Start the chat HTTP API server.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Chat { model } => run_chat(&config, model).await,
        Commands::Ask { question, model } => run_ask(&config, &question, model).await,
        Commands::Query {
            statement,
            x,
            y,
            chart,
        } => run_query(&config, &statement, x, y, chart).await,
        Commands::Models => run_models(&config),
        Commands::Serve => run_serve(&config).await,
    }
}

/// Resolve an optional `--model` override against the configured list.
fn resolve_model(config: &Config, model: Option<String>) -> Result<String> {
    match model {
        Some(reference) => {
            if !config.models.available.contains(&reference) {
                bail!(
                    "Model is not in the configured list: {} (see `achat models`)",
                    reference
                );
            }
            Ok(reference)
        }
        None => Ok(config.models.default_model().to_string()),
    }
}

async fn run_chat(config: &Config, model: Option<String>) -> Result<()> {
    let controller = TurnController::new(Box::new(AnalystClient::new(&config.analyst)?));
    let executor = QueryExecutor::new(create_engine(&config.warehouse).await?);
    let renderer = Renderer::new(&executor);
    let mut session = Session::new(resolve_model(config, model)?);
    let mut surface = TermSurface;

    println!("Analyst Chat (model: {})", session.selected_model());
    println!("Type a question. :1-:9 picks a suggestion, :model <ref> switches model, :reset clears, :quit exits.");

    controller.bootstrap(&mut session).await;
    renderer.render_conversation(&session, &mut surface).await;
    announce_api_error(&mut session, &mut surface);

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim().to_string();
        if input.is_empty() {
            prompt();
            continue;
        }

        match input.as_str() {
            ":quit" | ":q" => break,
            ":reset" => {
                session.reset();
                controller.bootstrap(&mut session).await;
                renderer.render_conversation(&session, &mut surface).await;
            }
            other if other.starts_with(":model ") => {
                let reference = other.trim_start_matches(":model ").trim();
                if config.models.available.iter().any(|m| m == reference) {
                    session.select_model(reference);
                    println!("Model: {}", session.selected_model());
                    controller.bootstrap(&mut session).await;
                    renderer.render_conversation(&session, &mut surface).await;
                } else {
                    surface.notice("Model is not in the configured list (see `achat models`)");
                }
            }
            other if is_suggestion_pick(other) => match picked_suggestion(&session, other) {
                Some(suggestion) => {
                    session.set_suggestion(suggestion);
                    let before = session.messages().len();
                    controller.process_pending(&mut session).await;
                    render_from(&renderer, &session, before, &mut surface).await;
                }
                None => surface.notice("No such suggestion"),
            },
            question => {
                let before = session.messages().len();
                controller.process_input(&mut session, question).await;
                render_from(&renderer, &session, before, &mut surface).await;
            }
        }

        announce_api_error(&mut session, &mut surface);
        prompt();
    }

    Ok(())
}

fn prompt() {
    use std::io::Write;
    print!("\n> ");
    let _ = std::io::stdout().flush();
}

/// Render only the turns appended since `from`.
async fn render_from(renderer: &Renderer<'_>, session: &Session, from: usize, surface: &mut dyn Surface) {
    for turn in &session.messages()[from..] {
        renderer.render_turn(turn, surface).await;
    }
}

fn announce_api_error(session: &mut Session, surface: &mut dyn Surface) {
    if session.take_api_error_notice() {
        surface.notice("An analyst API error has occurred");
    }
}

/// `:3` picks the third suggestion from the most recent analyst turn.
fn is_suggestion_pick(input: &str) -> bool {
    input
        .strip_prefix(':')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

fn picked_suggestion(session: &Session, input: &str) -> Option<String> {
    let index: usize = input.strip_prefix(':')?.parse().ok()?;
    let last_analyst = session
        .messages()
        .iter()
        .rev()
        .find(|t| t.role == Role::Analyst)?;
    last_analyst
        .suggestions()?
        .get(index.checked_sub(1)?)
        .cloned()
}

async fn run_ask(config: &Config, question: &str, model: Option<String>) -> Result<()> {
    let controller = TurnController::new(Box::new(AnalystClient::new(&config.analyst)?));
    let executor = QueryExecutor::new(create_engine(&config.warehouse).await?);
    let renderer = Renderer::new(&executor);
    let mut session = Session::new(resolve_model(config, model)?);
    let mut surface = TermSurface;

    controller.process_input(&mut session, question).await;
    renderer.render_conversation(&session, &mut surface).await;
    announce_api_error(&mut session, &mut surface);

    Ok(())
}

async fn run_query(
    config: &Config,
    statement: &str,
    x: Option<String>,
    y: Option<String>,
    chart: Option<String>,
) -> Result<()> {
    let kind = chart.as_deref().map(ChartKind::from_str).transpose()?;
    let executor = QueryExecutor::new(create_engine(&config.warehouse).await?);
    let renderer = Renderer::new(&executor).with_chart_options(ChartOptions {
        kind,
        x_column: x,
        y_column: y,
    });
    let mut surface = TermSurface;

    surface.sql(statement);
    renderer.render_query_result(statement, &mut surface).await;

    Ok(())
}

fn run_models(config: &Config) -> Result<()> {
    let default = config.models.default_model();

    println!("{:<56} {}", "MODEL", "DEFAULT");
    for reference in &config.models.available {
        let marker = if reference == default { "*" } else { "" };
        println!("{:<56} {}", reference, marker);
    }

    Ok(())
}

async fn run_serve(config: &Config) -> Result<()> {
    let controller = TurnController::new(Box::new(AnalystClient::new(&config.analyst)?));
    let executor = QueryExecutor::new(create_engine(&config.warehouse).await?);
    server::run_server(config, controller, executor).await
}
