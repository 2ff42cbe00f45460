//! Butler - a personal assistant whose tools live in child processes.
//!
//! Binary entry point: loads configuration, starts every provider,
//! discovers their tools and runs conversation turns.

mod shutdown;

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use butler_core::config::{ButlerConfig, ConfigProvider, FileConfigProvider, ServerConfig, ServerKind};
use butler_core::logging::TracingLogger;
use butler_core::{create_model, ChatMessage, SharedLogger, StopReason, ToolLoop, ToolManager, TurnOutcome};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "butler", version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the workspace file, then the user file)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Chat with the assistant (interactive unless --prompt is given)
    Chat(ChatArgs),
    /// Start every provider and print the tool catalog
    Tools,
    /// Manage provider registrations in the configuration file
    #[command(subcommand)]
    Server(ServerCommand),
}

#[derive(Args, Debug, Default)]
struct ChatArgs {
    /// Run a single turn with this prompt and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Override the configured chat provider (anthropic, mock)
    #[arg(long)]
    model_provider: Option<String>,

    /// Print every tool call made during a turn
    #[arg(long)]
    trace: bool,
}

#[derive(Subcommand, Debug)]
enum ServerCommand {
    /// Register a provider
    Add {
        name: String,
        #[arg(long = "type", value_enum)]
        kind: KindArg,
        #[arg(long, default_value = "")]
        command: String,
        #[arg(long)]
        port: Option<u16>,
        /// Arguments passed to the provider command
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Remove a provider
    Remove { name: String },
    /// List registered providers
    List,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Builtin,
    Command,
    Python,
    Stdio,
}

impl From<KindArg> for ServerKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Builtin => ServerKind::Builtin,
            KindArg::Command => ServerKind::Command,
            KindArg::Python => ServerKind::Python,
            KindArg::Stdio => ServerKind::Stdio,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let provider = config_provider(cli.config.clone());
    match cli.command.unwrap_or(Commands::Chat(ChatArgs::default())) {
        Commands::Server(command) => manage_servers(&provider, command).await,
        Commands::Tools => {
            let config = provider.load().await.context("loading configuration")?;
            let manager = new_manager(&config);
            let listing = Arc::clone(&manager);
            run_until_shutdown(manager, shutdown::signal(), async move {
                for tool in listing.catalog() {
                    println!("{:<32} {}", tool.name, tool.description);
                }
                anyhow::Ok(())
            })
            .await
        }
        Commands::Chat(args) => {
            let mut config = provider.load().await.context("loading configuration")?;
            if let Some(model_provider) = args.model_provider.clone() {
                config.chat.provider = model_provider;
            }
            let manager = new_manager(&config);
            let session = chat(&config, Arc::clone(&manager), &args);
            run_until_shutdown(manager, shutdown::signal(), session).await
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("butler={log_level},butler_core={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn config_provider(explicit: Option<PathBuf>) -> FileConfigProvider {
    if let Some(path) = explicit {
        return FileConfigProvider::at(path);
    }
    if let Ok(cwd) = std::env::current_dir() {
        let workspace = FileConfigProvider::workspace(&cwd);
        if workspace.exists() {
            return workspace;
        }
    }
    FileConfigProvider::user()
}

fn new_manager(config: &ButlerConfig) -> Arc<ToolManager> {
    let logger: SharedLogger = Arc::new(TracingLogger::new());
    Arc::new(ToolManager::new(config, logger))
}

/// Start and discover every provider, then run `work`
///
/// Whichever finishes first, `work` or `shutdown`, all providers are stopped
/// before this returns. Discovery can wait seconds on a slow provider, so it
/// runs inside the race too.
async fn run_until_shutdown<S, W>(manager: Arc<ToolManager>, shutdown: S, work: W) -> Result<()>
where
    S: Future<Output = ()>,
    W: Future<Output = Result<()>>,
{
    let result = tokio::select! {
        result = async {
            start_providers(&manager).await;
            work.await
        } => result,
        _ = shutdown => {
            info!("shutting down");
            Ok(())
        }
    };
    manager.stop_all();
    result
}

async fn start_providers(manager: &ToolManager) {
    let report = manager.start_all();
    for (name, err) in &report.failed {
        warn!(server = %name, "not started: {err}");
    }
    let discovery = manager.discover_all().await;
    info!(
        servers = discovery.per_server.len(),
        tools = discovery.total(),
        "tool discovery finished"
    );
}

async fn chat(config: &ButlerConfig, manager: Arc<ToolManager>, args: &ChatArgs) -> Result<()> {
    let logger: SharedLogger = Arc::new(TracingLogger::with_component("chat"));
    let model = create_model(&config.chat, Arc::clone(&logger)).context("creating chat model")?;
    let tool_loop = ToolLoop::new(model, manager, config.chat.clone(), logger);

    if let Some(prompt) = &args.prompt {
        let outcome = tool_loop.run_turn(vec![ChatMessage::user(prompt.clone())]).await?;
        print_outcome(&outcome, args.trace);
        return Ok(());
    }

    let mut history: Vec<ChatMessage> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/exit" || line == "/quit" {
            return Ok(());
        }

        let mut turn = history.clone();
        turn.push(ChatMessage::user(line));
        match tool_loop.run_turn(turn).await {
            Ok(outcome) => {
                print_outcome(&outcome, args.trace);
                history = outcome.transcript;
            }
            Err(err) => eprintln!("error: {err}"),
        }
    }
}

fn print_outcome(outcome: &TurnOutcome, trace: bool) {
    if trace {
        for call in &outcome.trace {
            let status = if call.ok { "ok" } else { "error" };
            eprintln!("[{}] {} {} -> {}", status, call.name, call.arguments, call.output);
        }
    }
    println!("{}", outcome.final_text);
    if outcome.stop == StopReason::RoundLimit {
        eprintln!("(stopped after {} rounds)", outcome.rounds);
    }
}

async fn manage_servers(provider: &FileConfigProvider, command: ServerCommand) -> Result<()> {
    match command {
        ServerCommand::Add {
            name,
            kind,
            command,
            port,
            args,
        } => {
            let mut server = ServerConfig::new(kind.into(), command).with_args(args);
            if let Some(port) = port {
                server = server.with_port(port);
            }
            if let Some(problem) = server.problem() {
                bail!("invalid server '{}': {}", name, problem);
            }
            provider.add_server(&name, server).await?;
            println!("Added '{}' to {}", name, provider.path().display());
        }
        ServerCommand::Remove { name } => {
            provider.remove_server(&name).await?;
            println!("Removed '{}' from {}", name, provider.path().display());
        }
        ServerCommand::List => {
            let config = provider.load().await?;
            for (name, server) in &config.servers {
                println!("{:<20} {:<8} {} {}", name, server.kind, server.command, server.args.join(" "));
            }
        }
    }
    Ok(())
}
