use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use wolfpack::api::{self, AppState};
use wolfpack::config::{self, ConfigStore};
use wolfpack::orchestrator::manager::PlayerManager;
use wolfpack::orchestrator::supervisor::{PlayerCommand, ProcessSupervisor};
use wolfpack::player::decision::LlmDecisionService;
use wolfpack::player::server;

#[derive(Parser)]
#[command(name = "wolfpack")]
#[command(version, about = "Orchestrator for AI werewolf player servers")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the manager: HTTP API for starting and stopping player instances
    Serve {
        /// Port to serve the manager API on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Directory holding named player configurations
        #[arg(long, default_value = "configs")]
        configs_dir: PathBuf,

        /// Launch players from this program instead of re-invoking wolfpack
        #[arg(long)]
        player_program: Option<PathBuf>,
    },
    /// Run a single player server (normally spawned by the manager)
    Player {
        /// Path to the player configuration file
        #[arg(long)]
        config: PathBuf,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("wolfpack={default_level}"))),
        )
        .init();

    match cli.command {
        Commands::Serve {
            port,
            host,
            configs_dir,
            player_program,
        } => {
            let store = ConfigStore::new(configs_dir)?;
            let command = player_program
                .map(|program| PlayerCommand::new(program, vec![]))
                .unwrap_or_default();
            let supervisor = Arc::new(ProcessSupervisor::new(command));
            let manager = PlayerManager::new(store, supervisor);
            let state = Arc::new(AppState { manager });
            api::serve(&host, port, state).await
        }
        Commands::Player { config, port } => {
            let config = config::load_from_path(&config)?;
            let decision = Arc::new(LlmDecisionService::new(config.clone()));
            server::serve(config, decision, port).await
        }
    }
}
