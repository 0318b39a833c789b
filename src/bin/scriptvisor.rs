use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use scriptvisor::config::{create_example_config, ConfigLoadError, ScriptvisorConfig};
use scriptvisor::logging::init_logging;
use scriptvisor::reload::setup_reload_signal;
use scriptvisor::{HostOptions, ScriptHost};
use scriptvisor_runtime::abi;

#[derive(Parser)]
#[command(version = env!("VERSION_STRING"), about, long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Load script modules and run the simulated host (the default)
    Run {
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,

        /// Directory to load modules from (overrides the config file)
        #[arg(long)]
        script_dir: Option<PathBuf>,

        /// Frames the host spends loading before scripts may start
        #[arg(long, default_value_t = 0)]
        playing_after: u64,
    },
    /// Write an example config file and exit
    InitConfig,
}

fn load_config(path: &Path) -> anyhow::Result<ScriptvisorConfig> {
    match ScriptvisorConfig::load_from(path) {
        Ok(config) => Ok(config),
        Err(ConfigLoadError::NotFound) => {
            create_example_config(path)?;
            eprintln!("Config file created at: {}", path.display());
            Ok(ScriptvisorConfig::default())
        }
        Err(err) => Err(err).with_context(|| format!("Failed to load config {}", path.display())),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(ScriptvisorConfig::config_path);

    let (frames, script_dir, playing_after) = match cli.command {
        Some(Command::InitConfig) => {
            create_example_config(&config_path)?;
            eprintln!("Config file created at: {}", config_path.display());
            return Ok(());
        }
        Some(Command::Run {
            frames,
            script_dir,
            playing_after,
        }) => (frames, script_dir, playing_after),
        None => (None, None, 0),
    };

    let config = load_config(&config_path)?;
    let _log_guard = init_logging("scriptvisor", config.logging.file)?;

    info!("Starting scriptvisor {}", env!("VERSION_STRING"));

    let mut host = ScriptHost::new(
        &config,
        HostOptions {
            script_dir,
            playing_after,
        },
    );
    abi::install(host.runtime().clone());
    host.start();

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    host.run(
        frames,
        Duration::from_millis(config.scheduler.frame_interval_ms.max(1)),
        setup_reload_signal(),
        shutdown,
    )
    .await;

    abi::uninstall();
    drop(host);
    info!("Stopped");

    Ok(())
}
