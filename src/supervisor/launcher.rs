use clap::ValueEnum;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::{Child, Command};

use crate::platform;

/// Directory (relative to the install root / resources dir) holding the
/// backend service, and the name of its packaged executable.
pub const SERVICE_DIR: &str = "python-service";

#[cfg(windows)]
const SERVICE_BINARY: &str = "python-service.exe";
#[cfg(not(windows))]
const SERVICE_BINARY: &str = "python-service";

#[cfg(windows)]
const DEV_INTERPRETER: &str = "python";
#[cfg(not(windows))]
const DEV_INTERPRETER: &str = "python3";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// System interpreter + source tree
    Development,
    /// Packaged self-contained executable
    Production,
}

/// Where the host is installed. Both directories are resolved once at
/// startup; the launcher never guesses at spawn time.
#[derive(Debug, Clone)]
pub struct HostPaths {
    pub install_root: PathBuf,
    pub resources_dir: PathBuf,
}

impl HostPaths {
    /// Derive defaults from the running executable's location:
    /// the install root is the executable's directory, resources sit in
    /// `resources/` next to it.
    pub fn discover() -> Self {
        let install_root = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        let resources_dir = install_root.join("resources");
        Self {
            install_root,
            resources_dir,
        }
    }

    pub fn with_overrides(install_root: Option<PathBuf>, resources: Option<PathBuf>) -> Self {
        let discovered = Self::discover();
        let install_root = install_root.unwrap_or(discovered.install_root);
        let resources_dir = resources.unwrap_or_else(|| install_root.join("resources"));
        Self {
            install_root,
            resources_dir,
        }
    }
}

/// Fully resolved backend command. The trailing `"0"` asks the service to
/// bind any free port; the stdout handshake reports the real one.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

impl LaunchPlan {
    pub fn resolve(mode: RunMode, paths: &HostPaths) -> Self {
        match mode {
            RunMode::Development => {
                let script = paths.install_root.join(SERVICE_DIR).join("main.py");
                Self {
                    program: PathBuf::from(DEV_INTERPRETER),
                    args: vec![script.to_string_lossy().into_owned(), "0".to_string()],
                    cwd: paths.install_root.clone(),
                }
            }
            RunMode::Production => Self {
                program: paths.resources_dir.join(SERVICE_DIR).join(SERVICE_BINARY),
                args: vec!["0".to_string()],
                cwd: paths.resources_dir.clone(),
            },
        }
    }
}

/// Spawn the backend with captured (never inherited) output streams so the
/// supervisor can read the handshake, in its own process group so the
/// graceful termination signal reaches the whole tree.
pub fn spawn(plan: &LaunchPlan) -> std::io::Result<Child> {
    let mut cmd = Command::new(&plan.program);
    cmd.args(&plan.args)
        .current_dir(&plan.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    platform::configure_process_group(&mut cmd);
    cmd.spawn()
}
