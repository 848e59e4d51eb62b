//! docsage CLI
//!
//! Main entry point for the docsage command-line tool.
//! Builds or loads persisted document indexes and answers questions over them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    AgentCommand, AskCommand, BuildCommand, ChatCommand, CompleteCommand, EvaluateCommand,
    PromptsCommand, StatsCommand,
};
use docsage_core::{config::AppConfig, logging, AppResult, LogFormat};
use std::path::PathBuf;

/// docsage - ask questions over your documents
#[derive(Parser, Debug)]
#[command(name = "docsage")]
#[command(about = "Ask questions over local documents with persisted indexes", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "DOCSAGE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "DOCSAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// LLM provider (ollama, openai)
    #[arg(short, long, global = true, env = "DOCSAGE_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "DOCSAGE_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a prompt straight to the model, without an index
    Complete(CompleteCommand),

    /// Build declared indexes, or load them if already persisted
    Build(BuildCommand),

    /// Ask a question over one index
    Ask(AskCommand),

    /// Interactive chat over one index
    Chat(ChatCommand),

    /// Route a request across several indexes with an agent
    Agent(AgentCommand),

    /// Check whether an answer is supported by its sources
    Evaluate(EvaluateCommand),

    /// List or show prompt templates
    Prompts(PromptsCommand),

    /// Show what is persisted for each index
    Stats(StatsCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_from(cli.workspace.clone(), cli.config.clone())?;
    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    let log_format = if config.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    logging::init_logging(config.log_level.as_deref(), config.no_color, log_format)?;

    tracing::info!("docsage starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.provider);
    tracing::debug!("Model: {}", config.model);

    config.validate()?;
    config.ensure_docsage_dir()?;

    let command_name = match &cli.command {
        Commands::Complete(_) => "complete",
        Commands::Build(_) => "build",
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Agent(_) => "agent",
        Commands::Evaluate(_) => "evaluate",
        Commands::Prompts(_) => "prompts",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Complete(cmd) => cmd.execute(&config).await,
        Commands::Build(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Agent(cmd) => cmd.execute(&config).await,
        Commands::Evaluate(cmd) => cmd.execute(&config).await,
        Commands::Prompts(cmd) => cmd.execute(&config),
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
