#![allow(dead_code)]
use std::net::TcpListener;
use std::path::PathBuf;
use std::time::Duration;

use deskrig::logs::LogLine;
use deskrig::supervisor::launcher::LaunchPlan;
use deskrig::supervisor::{self, SupervisorConfig, SupervisorHandle};
use tokio::sync::broadcast;

pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[cfg(unix)]
pub fn shell_plan(script: &str) -> LaunchPlan {
    LaunchPlan {
        program: PathBuf::from("sh"),
        args: vec!["-c".to_string(), script.to_string()],
        cwd: std::env::temp_dir(),
    }
}

#[cfg(windows)]
pub fn shell_plan(script: &str) -> LaunchPlan {
    LaunchPlan {
        program: PathBuf::from("cmd.exe"),
        args: vec!["/C".to_string(), script.to_string()],
        cwd: std::env::temp_dir(),
    }
}

/// Stand-in backend: reports a fixed port and holds until terminated.
#[cfg(unix)]
pub fn fake_backend_script(port: u16) -> String {
    format!("echo booting...; echo PORT={}; sleep 30", port)
}

#[cfg(windows)]
pub fn fake_backend_script(port: u16) -> String {
    format!(
        "echo booting...& echo PORT={}& ping -n 31 127.0.0.1 > nul",
        port
    )
}

pub fn spawn_supervisor(script: &str) -> SupervisorHandle {
    let (log_tx, _) = broadcast::channel::<LogLine>(256);
    let config = SupervisorConfig {
        startup_timeout: Duration::from_secs(5),
        restart_delay: Duration::from_millis(100),
    };
    supervisor::spawn(config, shell_plan(script), log_tx)
}

pub async fn wait_for_http(url: &str, timeout: Duration) -> bool {
    let client = reqwest::Client::new();
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if client.get(url).send().await.is_ok() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
