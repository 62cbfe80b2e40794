use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::supervisor::launcher::RunMode;

#[derive(Debug, Parser)]
#[command(name = "deskrig", version, about = "Desktop shell host for the bundled backend service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that has to locate the backend service.
#[derive(Debug, Args)]
pub struct ServiceOpts {
    /// Run mode: development uses the system interpreter, production the packaged executable
    #[arg(long, value_enum, default_value_t = RunMode::Development, env = "DESKRIG_MODE")]
    pub mode: RunMode,

    /// Install root containing python-service/ (defaults to the executable's directory)
    #[arg(long, env = "DESKRIG_INSTALL_ROOT")]
    pub install_root: Option<PathBuf>,

    /// Packaged resources directory (defaults to <install-root>/resources)
    #[arg(long, env = "DESKRIG_RESOURCES")]
    pub resources: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Launch the backend service and the UI bridge
    Run {
        #[command(flatten)]
        service: ServiceOpts,

        /// Port the UI bridge listens on (localhost only)
        #[arg(long, default_value_t = 6180, env = "DESKRIG_BRIDGE_PORT")]
        bridge_port: u16,

        /// How long to wait for the backend's port handshake
        #[arg(long, default_value = "30s", value_parser = humantime::parse_duration)]
        startup_timeout: Duration,

        /// Delay before auto-restarting a crashed backend
        #[arg(long, default_value = "3s", value_parser = humantime::parse_duration)]
        restart_delay: Duration,

        /// Directory for config.json (defaults to the per-user data dir)
        #[arg(long, env = "DESKRIG_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },
    /// Check that the backend service can be launched
    Doctor {
        #[command(flatten)]
        service: ServiceOpts,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}
