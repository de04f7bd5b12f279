//! vigil - host-resident monitoring agent.
//!
//! Watches the local job scheduler and resource health, and forwards failure
//! events, timeouts, and status transitions upstream with durable buffering
//! while the upstream is unreachable.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use vigil_agent::{Agent, AgentConfig, LogSink};
use vigil_health::LogNotifier;

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil host monitoring agent")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitoring agent
    Run {
        /// Path to config file
        #[arg(short, long, default_value = "/etc/vigil/config.json")]
        config: PathBuf,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "/etc/vigil/config.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("vigil_agent=info".parse()?)
                .add_directive("vigil_cron=info".parse()?)
                .add_directive("vigil_health=info".parse()?)
                .add_directive("vigil_queue=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_agent(config).await?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

async fn run_agent(config_path: PathBuf) -> anyhow::Result<()> {
    info!(config = %config_path.display(), "starting vigil");

    let config = AgentConfig::load(&config_path)?;
    info!(
        server_id = %config.server_id,
        data_dir = %config.data_dir.display(),
        "loaded config"
    );

    let agent = Arc::new(Agent::new(config, Box::new(LogSink)));
    agent.health().add_notifier(Box::new(LogNotifier));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    agent.run(shutdown_rx).await;
    Ok(())
}

fn init_config(output: PathBuf) -> anyhow::Result<()> {
    let config = AgentConfig::default();
    config.save(&output)?;

    println!("Config written to {}", output.display());
    println!();
    println!("Edit the file to adjust thresholds and timeouts, then run:");
    println!("  vigil run --config {}", output.display());

    Ok(())
}
