use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::supervisor::SupervisorHandle;

pub const WINDOW_CLOSE_GRACE: Duration = Duration::from_millis(500);

/// Funnels every host-level quit trigger (Ctrl-C, window close command,
/// all-windows-closed) into exactly one supervisor shutdown. Extra triggers
/// from other sources arriving right behind the first are absorbed.
pub struct ShutdownCoordinator {
    supervisor: SupervisorHandle,
    exit: CancellationToken,
    triggered: AtomicBool,
    window_grace: Duration,
}

impl ShutdownCoordinator {
    pub fn new(supervisor: SupervisorHandle, exit: CancellationToken) -> Self {
        Self {
            supervisor,
            exit,
            triggered: AtomicBool::new(false),
            window_grace: WINDOW_CLOSE_GRACE,
        }
    }

    #[cfg(test)]
    fn with_grace(mut self, grace: Duration) -> Self {
        self.window_grace = grace;
        self
    }

    /// First trigger wins: raises the shutdown flag and sends the graceful
    /// termination signal through the supervisor. Safe to call from every
    /// quit path.
    pub async fn trigger(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            debug!("shutdown already triggered");
            return;
        }
        info!("host shutdown trigger received");
        self.supervisor.shutdown().await;
    }

    /// A user-initiated window close: shut the backend down, give the
    /// termination signal a moment to land, then end the host itself.
    pub async fn window_close(&self) {
        self.trigger().await;
        tokio::time::sleep(self.window_grace).await;
        self.exit.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}
