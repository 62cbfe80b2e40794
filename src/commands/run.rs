use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::bridge::{start_bridge_server, BridgeState, WindowControl};
use crate::cli::ServiceOpts;
use crate::logs::{LogLine, LogWriter};
use crate::shutdown::ShutdownCoordinator;
use crate::store::ConfigStore;
use crate::supervisor::launcher::{HostPaths, LaunchPlan};
use crate::supervisor::{self, SupervisorConfig, SupervisorHandle};

/// Window commands from the UI. The shell embedding deskrig owns the real
/// window chrome; the standalone host only has to honor `close`, which must
/// take the backend down with it.
struct HostWindow {
    coordinator: Arc<ShutdownCoordinator>,
}

impl WindowControl for HostWindow {
    fn minimize(&self) {
        info!("window minimize requested");
    }

    fn maximize(&self) {
        info!("window maximize requested");
    }

    fn close(&self) {
        info!("window close requested");
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move {
            coordinator.window_close().await;
        });
    }
}

pub async fn run(
    service: ServiceOpts,
    bridge_port: u16,
    startup_timeout: Duration,
    restart_delay: Duration,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let paths = HostPaths::with_overrides(service.install_root, service.resources);
    let plan = LaunchPlan::resolve(service.mode, &paths);
    info!(
        program = %plan.program.display(),
        cwd = %plan.cwd.display(),
        "resolved backend launch plan"
    );

    let store = match data_dir {
        Some(dir) => ConfigStore::new(&dir),
        None => ConfigStore::open_default().context("resolving config store location")?,
    };

    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();

    // Backend stdout/stderr fan out through one broadcast channel; the
    // writer relays it to the host terminal.
    let (log_tx, _) = broadcast::channel::<LogLine>(4096);
    let writer = LogWriter::new(log_tx.subscribe(), cancel.clone());
    tracker.spawn(writer.run());

    let config = SupervisorConfig {
        startup_timeout,
        restart_delay,
    };
    let supervisor = supervisor::spawn(config, plan, log_tx.clone());

    let coordinator = Arc::new(ShutdownCoordinator::new(supervisor.clone(), cancel.clone()));

    let state = BridgeState {
        supervisor: supervisor.clone(),
        store,
        window: Arc::new(HostWindow {
            coordinator: Arc::clone(&coordinator),
        }),
    };
    {
        let cancel = cancel.clone();
        tracker.spawn(async move {
            if let Err(e) = start_bridge_server(bridge_port, state, cancel).await {
                warn!(error = %e, "UI bridge failed");
            }
        });
    }

    // Bring the backend up. A failure is not fatal to the host: the UI sees
    // port 0 and can retry through the bridge.
    {
        let supervisor = supervisor.clone();
        tracker.spawn(async move {
            match supervisor.start().await {
                Ok(port) => info!(port, "backend service ready"),
                Err(e) => warn!(error = %e, "initial backend start failed"),
            }
        });
    }

    print_summary(bridge_port);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nShutting down...");
            coordinator.trigger().await;
        }
        _ = cancel.cancelled() => {
            // Window-close path: the coordinator already ran.
            coordinator.trigger().await;
        }
    }

    shutdown_host(&supervisor, &cancel, &tracker).await;
    Ok(())
}

async fn shutdown_host(
    supervisor: &SupervisorHandle,
    cancel: &CancellationToken,
    tracker: &TaskTracker,
) {
    // Bounded wait for the graceful termination signal to land before the
    // host goes away; the instance task escalates on its own if it doesn't.
    if supervisor.wait_idle(Duration::from_secs(10)).await {
        info!("backend service stopped cleanly");
    } else {
        warn!("backend service did not stop within 10s");
    }

    cancel.cancel();
    tracker.close();
    if tokio::time::timeout(Duration::from_secs(10), tracker.wait())
        .await
        .is_err()
    {
        warn!("shutdown timed out -- some tasks were abandoned");
    }
}

fn print_summary(bridge_port: u16) {
    let use_color = std::io::stdout().is_terminal();

    println!();
    if use_color {
        println!("  {}", "deskrig".bold());
    } else {
        println!("  deskrig");
    }
    println!("    UI bridge: http://127.0.0.1:{}", bridge_port);
    println!("    Backend:   starting (port announced over /ws)");
    println!();
}
