mod config;
mod error;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use runtime::{OpenAiBackend, ProcessConnector, Session, ToolServerManager, TurnResult};
use tracing_subscriber::EnvFilter;

use config::{CONFIG_FILE, Config};
use error::{Error, Result};

type ChatSession = Session<OpenAiBackend, Arc<ToolServerManager>>;

#[derive(Parser)]
#[command(name = "skillchat")]
#[command(about = "Chat with a model that can call MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Run a single turn and print the answer
    Run {
        /// User message (defaults to run.user_input)
        input: Option<String>,
    },
    /// Connect the configured servers and list their tools
    Tools,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Chat) | None => cmd_chat(config).await,
        Some(Commands::Run { input }) => cmd_run(config, input).await,
        Some(Commands::Tools) => cmd_tools(config).await,
    }
}

/// Load the given file, or `skillchat.toml` if it exists.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) if !path.exists() => Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        }),
        Some(path) => Ok(Config::load(path)?),
        None if Path::new(CONFIG_FILE).exists() => Ok(Config::load(CONFIG_FILE)?),
        None => {
            tracing::debug!("no {CONFIG_FILE}, using defaults");
            Ok(Config::default())
        }
    }
}

fn tool_manager(config: &Config) -> Arc<ToolServerManager> {
    let secrets = config.secrets.clone();
    let connector = ProcessConnector::new().with_secret_lookup(move |key| {
        secrets
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    });
    Arc::new(ToolServerManager::with_connector(
        config.servers.clone(),
        connector,
    ))
}

/// Build the backend and session. Fails before any server is started.
fn build_session(config: &Config, manager: &Arc<ToolServerManager>) -> Result<ChatSession> {
    let endpoint = config.endpoint(|var| std::env::var(var).ok())?;
    let backend = OpenAiBackend::builder(endpoint, &config.backend.model).build()?;

    let mut session = Session::new(backend, Arc::clone(manager))
        .with_max_tool_rounds(config.session.max_tool_rounds)
        .with_params(config.backend.params);

    if let Some(prompt) = config.system_prompt() {
        session.load_system_prompt(prompt);
    }
    Ok(session)
}

async fn cmd_chat(config: Config) -> Result<()> {
    let manager = tool_manager(&config);
    let mut session = build_session(&config, &manager)?;

    println!("skillchat v{}", env!("CARGO_PKG_VERSION"));
    manager.initialize().await;
    print_servers(&manager).await;

    if let Some(skill) = &config.skill {
        println!("Skill: {}", skill.name);
    }
    println!("Model: {}", config.backend.model);
    println!("Commands: /clear, /tools, quit\n");

    let result = repl(&mut session, &manager).await;

    manager.shutdown().await;
    println!("\nSession ended.");
    result
}

async fn repl(session: &mut ChatSession, manager: &ToolServerManager) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // EOF
            break;
        }

        let input = line.trim();
        match input {
            "" => continue,
            "quit" | "exit" => break,
            "/clear" => {
                session.clear_history();
                println!("History cleared.\n");
                continue;
            }
            "/tools" => {
                print_tools(manager).await;
                println!();
                continue;
            }
            _ => {}
        }

        let turn = session.send_message(input).await;
        print_tool_calls(&turn);
        if turn.success {
            println!("\n{}\n", turn.response);
        } else {
            eprintln!("Error: {}\n", turn.response);
        }
    }

    Ok(())
}

async fn cmd_run(config: Config, input: Option<String>) -> Result<()> {
    let input = input
        .or_else(|| config.run.user_input.clone())
        .filter(|i| !i.trim().is_empty())
        .ok_or(Error::MissingInput)?;

    let manager = tool_manager(&config);
    let mut session = build_session(&config, &manager)?;

    manager.initialize().await;
    let turn = session.send_message(input).await;
    manager.shutdown().await;

    print_tool_calls(&turn);
    if !turn.success {
        return Err(Error::TurnFailed(turn.response));
    }
    println!("{}", turn.response);
    Ok(())
}

async fn cmd_tools(config: Config) -> Result<()> {
    let manager = tool_manager(&config);
    manager.initialize().await;

    print_servers(&manager).await;
    print_tools(&manager).await;

    manager.shutdown().await;
    Ok(())
}

async fn print_servers(manager: &ToolServerManager) {
    let connected = manager.connected_servers().await;
    let configured = manager.configs().iter().filter(|c| c.enabled).count();
    println!("Servers: {}/{configured} connected", connected.len());
    for name in connected {
        println!("  - {name}");
    }
}

async fn print_tools(manager: &ToolServerManager) {
    let tools = manager.registered_tools().await;
    if tools.is_empty() {
        println!("No tools available.");
        return;
    }

    println!("{:<32}  SERVER", "TOOL");
    println!("{}", "-".repeat(60));
    for tool in tools {
        println!("{:<32}  {}", tool.name, tool.server);
        if !tool.description.is_empty() {
            println!("    {}", tool.description);
        }
    }
}

fn print_tool_calls(turn: &TurnResult) {
    for record in &turn.tool_calls {
        println!("[tool] {}({}) -> {}", record.tool_name, record.arguments, record.result);
    }
}
