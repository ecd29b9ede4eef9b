mod error;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use bridge::config::DEFAULT_CONFIG_FILE;
use bridge::{Bridge, BridgeConfig, ChatClient, McpProvider};
use clap::{Parser, Subcommand};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use error::{Error, Result};

type ToolBridge = Bridge<McpProvider, ChatClient>;

#[derive(Parser)]
#[command(name = "toolbridge")]
#[command(about = "Chat with a local LLM that can call MCP tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the bridge configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins if set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Model to use instead of the configured one
    #[arg(long, global = true)]
    model: Option<String>,

    /// Model server base URL instead of the configured one
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat session
    Chat,
    /// Send one message and print the reply
    Ask {
        /// The message to send
        message: String,
    },
    /// List the tools the configured server offers
    Tools,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = BridgeConfig::load(&cli.config);
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    if let Some(base_url) = cli.base_url {
        config.llm.base_url = base_url;
    }

    let mut bridge = build_bridge(&config)?;
    let result = match cli.command {
        Some(Commands::Chat) | None => cmd_chat(&mut bridge).await,
        Some(Commands::Ask { message }) => cmd_ask(&mut bridge, &message).await,
        Some(Commands::Tools) => cmd_tools(&mut bridge, &config).await,
    };
    bridge.close().await;
    result
}

fn build_bridge(config: &BridgeConfig) -> Result<ToolBridge> {
    let provider = McpProvider::new(config.server_config()?);

    let mut builder = ChatClient::builder(&config.llm.base_url, &config.llm.model);
    if let Some(key) = &config.llm.api_key {
        builder = builder.api_key(key);
    }
    if let Some(prompt) = &config.system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if config.llm.stream {
        warn!("streaming replies are not supported; requesting whole replies");
    }

    Ok(Bridge::new(provider, builder.build(), config.bridge_options()))
}

async fn cmd_chat(bridge: &mut ToolBridge) -> Result<()> {
    println!("toolbridge v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {}", bridge.model());

    if bridge.initialize().await {
        let names: Vec<_> = bridge.tools().iter().map(|t| t.name()).collect();
        println!("Tools: {}", names.join(", "));
    } else {
        println!("Tools: unavailable, chatting without them");
    }
    println!("Type 'reset' to start over, 'quit' or Ctrl+D to exit.\n");

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
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }
        if input == "reset" {
            bridge.reset();
            println!("Conversation cleared.\n");
            continue;
        }

        let reply = bridge.process_message(input).await;
        println!("\n{reply}\n");
    }

    println!("\nGoodbye.");
    Ok(())
}

async fn cmd_ask(bridge: &mut ToolBridge, message: &str) -> Result<()> {
    if !bridge.initialize().await {
        warn!("continuing without tools");
    }
    println!("{}", bridge.process_message(message).await);
    Ok(())
}

async fn cmd_tools(bridge: &mut ToolBridge, config: &BridgeConfig) -> Result<()> {
    if !bridge.initialize().await {
        return Err(Error::ToolsUnavailable {
            server: config.tool_server.clone(),
        });
    }

    let tools = bridge.tools();
    if tools.is_empty() {
        println!("Server '{}' offers no tools.", config.tool_server);
        return Ok(());
    }

    let registry = bridge.registry();
    for spec in tools {
        let marker = if registry.tool_instructions(spec.name()).is_some() {
            " [instructions]"
        } else {
            ""
        };
        println!("{}{marker}", spec.name());
        println!("    {}", spec.function.description);
    }
    Ok(())
}
