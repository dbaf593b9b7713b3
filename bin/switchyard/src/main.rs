mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "Routes requests to capabilities over JSON-RPC", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway (user and capability endpoints)
    Serve {
        /// Port to listen on (overrides config gateway.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config gateway.host)
        #[arg(long)]
        host: Option<String>,
    },

    /// Inspect discovered capabilities
    Tools {
        #[command(subcommand)]
        command: ToolsCommands,
    },

    /// Show which capability a request would be routed to
    Route {
        /// Request text
        text: String,

        /// Skip the LLM classifier and use keyword routing only
        #[arg(long)]
        no_classifier: bool,
    },

    /// Route and execute one request
    Run {
        /// Request text
        message: String,
    },

    /// Send a raw JSON-RPC message and print the reply
    Rpc {
        /// JSON-RPC request or batch
        json: String,

        /// Send to the capability endpoint instead of the user endpoint
        #[arg(long)]
        mcp: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ToolsCommands {
    /// List loaded capabilities
    List,
    /// Show one capability's metadata
    Info {
        /// Capability name
        name: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Serve { port, host } => {
            commands::gateway::run(host, port).await?;
        }
        Commands::Tools { command } => match command {
            ToolsCommands::List => {
                commands::tools_cmd::list().await?;
            }
            ToolsCommands::Info { name } => {
                commands::tools_cmd::info(&name).await?;
            }
        },
        Commands::Route { text, no_classifier } => {
            commands::route_cmd::run(&text, !no_classifier).await?;
        }
        Commands::Run { message } => {
            commands::run_cmd::run(&message, cli.verbose).await?;
        }
        Commands::Rpc { json, mcp } => {
            commands::rpc_cmd::run(&json, mcp).await?;
        }
        Commands::Config { command } => match command {
            ConfigCommands::Init { force } => {
                commands::config_cmd::init(force).await?;
            }
            ConfigCommands::Show => {
                commands::config_cmd::show().await?;
            }
        },
    }

    Ok(())
}
