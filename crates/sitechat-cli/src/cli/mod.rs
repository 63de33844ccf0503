//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use sitechat_core::{config, logging};

mod commands;

#[derive(Parser)]
#[command(name = "sitechat")]
#[command(version)]
#[command(about = "Chat with an AI assistant about any web page")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Open the chat for this site right away
    #[arg(long, value_name = "URL")]
    url: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Ask one question about a site and stream the answer to stdout
    Ask {
        /// Site to read
        #[arg(short, long, value_name = "URL")]
        url: String,

        /// Question to ask
        #[arg(short, long)]
        prompt: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to a file; a failure here should not stop the command.
    let _log_guard = match logging::init() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: logging disabled: {e:#}");
            None
        }
    };

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli { command, url } = cli;

    let Some(command) = command else {
        let config = config::Config::load().context("load config")?;
        return commands::chat::run(&config, url).await;
    };

    match command {
        Commands::Ask { url, prompt } => {
            let config = config::Config::load().context("load config")?;
            commands::ask::run(&config, &url, &prompt).await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
