use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;

#[derive(Parser)]
#[command(name = "histchat")]
#[command(about = "histchat - guest trial conversations with historical figures", long_about = None)]
struct Cli {
    /// Path to config.toml (defaults to the histchat config directory)
    #[arg(long, global = true, env = "HISTCHAT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the figure catalog
    Figures {
        #[command(subcommand)]
        action: FiguresAction,
    },
    /// Start a guest trial and chat interactively
    Trial {
        /// Figure slug
        figure: String,
        /// Model override for every question
        #[arg(long)]
        model: Option<String>,
        /// Interaction mode (e.g. "Young Learner"), used by the safety filter
        #[arg(long)]
        mode: Option<String>,
    },
    /// Ask one question in an existing guest session
    Ask {
        #[arg(long)]
        token: String,
        message: String,
        #[arg(long)]
        model: Option<String>,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the state of a guest session
    Status {
        #[arg(long)]
        token: String,
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a guest transcript into a user thread
    Upgrade {
        #[arg(long)]
        token: String,
        #[arg(long)]
        user: i64,
    },
    /// Delete expired guest sessions
    Purge,
}

#[derive(Subcommand)]
enum FiguresAction {
    /// List figures
    List,
    /// Add or replace figures from a TOML file of `[[figure]]` tables
    Import { path: PathBuf },
    /// Remove a figure
    Remove { slug: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("histchat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = context::CliContext::load(cli.config)?;

    match cli.command {
        Commands::Figures { action } => match action {
            FiguresAction::List => commands::figures::list(&ctx).await?,
            FiguresAction::Import { path } => commands::figures::import(&ctx, &path)?,
            FiguresAction::Remove { slug } => commands::figures::remove(&ctx, &slug)?,
        },
        Commands::Trial {
            figure,
            model,
            mode,
        } => commands::trial::run(&ctx, &figure, model, mode).await?,
        Commands::Ask {
            token,
            message,
            model,
            json,
        } => commands::trial::ask_once(&ctx, &token, &message, model, json).await?,
        Commands::Status { token, json } => commands::trial::status(&ctx, &token, json).await?,
        Commands::Upgrade { token, user } => commands::upgrade::run(&ctx, &token, user).await?,
        Commands::Purge => commands::purge::run(&ctx).await?,
    }

    Ok(())
}
