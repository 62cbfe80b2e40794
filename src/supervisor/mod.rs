pub mod handshake;
pub mod instance;
pub mod launcher;

use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::logs::LogLine;
use crate::platform;

use instance::{LifecycleState, ServiceInstance, ServicePhase};
use launcher::LaunchPlan;

pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RESTART_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Window between spawn and the `PORT=` handshake.
    pub startup_timeout: Duration,
    /// Fixed delay before the single scheduled restart after an abnormal
    /// post-ready exit.
    pub restart_delay: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            restart_delay: DEFAULT_RESTART_DELAY,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors and results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StartError {
    #[error("failed to spawn backend service: {0}")]
    Spawn(String),
    #[error("backend service did not report a port within {waited:?}")]
    StartupTimeout { waited: Duration },
    #[error("backend service exited before reporting a port (code {code:?})")]
    PrematureExit { code: Option<i32> },
    #[error("shutdown in progress")]
    ShuttingDown,
    #[error("supervisor is gone")]
    SupervisorGone,
}

/// Structured result for `restart`, shaped for the bridge boundary where
/// errors must travel as data.
#[derive(Debug, Clone, Serialize)]
pub struct RestartOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RestartOutcome {
    fn succeeded(port: u16) -> Self {
        Self {
            success: true,
            port: Some(port),
            error: None,
        }
    }

    fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            port: None,
            error: Some(error.to_string()),
        }
    }
}

/// Pushed to observers (the bridge relays these to the UI over WebSocket).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServiceEvent {
    Ready { port: u16 },
    Exited { code: Option<i32> },
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable handle to the supervisor task. All operations funnel through
/// one channel, so state transitions are serialized without locks.
#[derive(Clone)]
pub struct SupervisorHandle {
    tx: mpsc::Sender<Msg>,
    port_rx: watch::Receiver<u16>,
    phase_rx: watch::Receiver<ServicePhase>,
    events_tx: broadcast::Sender<ServiceEvent>,
}

impl SupervisorHandle {
    /// Start the backend service, or join the attempt already in flight.
    /// Resolves with the handshake port; never spawns a second process
    /// while one is active.
    pub async fn start(&self) -> Result<u16, StartError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Msg::Start(reply))
            .await
            .map_err(|_| StartError::SupervisorGone)?;
        rx.await.map_err(|_| StartError::SupervisorGone)?
    }

    /// Tear down the active instance (graceful signal first) and start a
    /// fresh one. Failures come back as data, not panics.
    pub async fn restart(&self) -> RestartOutcome {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Msg::Restart(reply)).await.is_err() {
            return RestartOutcome::failed(StartError::SupervisorGone);
        }
        rx.await
            .unwrap_or_else(|_| RestartOutcome::failed(StartError::SupervisorGone))
    }

    /// Last resolved port; 0 means "not ready".
    pub fn current_port(&self) -> u16 {
        *self.port_rx.borrow()
    }

    pub fn phase(&self) -> ServicePhase {
        *self.phase_rx.borrow()
    }

    /// Raise the shutdown flag and send the graceful termination signal to
    /// the active instance. Idempotent; returns once the signal is on its
    /// way, without waiting for the process to exit.
    pub async fn shutdown(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Msg::Shutdown(reply)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Bounded wait until no instance is active. Pair with [`shutdown`] when
    /// the caller needs a synchronous teardown guarantee.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let mut rx = self.phase_rx.clone();
        let settled = async {
            loop {
                if *rx.borrow_and_update() == ServicePhase::Idle {
                    return;
                }
                if rx.changed().await.is_err() {
                    return;
                }
            }
        };
        tokio::time::timeout(timeout, settled).await.is_ok()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events_tx.subscribe()
    }
}

/// Spawn the supervisor task for one backend launch plan.
pub fn spawn(
    config: SupervisorConfig,
    plan: LaunchPlan,
    log_tx: broadcast::Sender<LogLine>,
) -> SupervisorHandle {
    let (tx, rx) = mpsc::channel(256);
    let (port_tx, port_rx) = watch::channel(0u16);
    let (phase_tx, phase_rx) = watch::channel(ServicePhase::Idle);
    let (events_tx, _) = broadcast::channel(64);

    let actor = Supervisor {
        config,
        plan,
        rx,
        self_tx: tx.clone(),
        port_tx,
        phase_tx,
        events_tx: events_tx.clone(),
        log_tx,
        active: None,
        next_generation: 1,
        shutting_down: false,
        deadline_for: None,
        restart_timer_armed: false,
        restart_in_flight: false,
        waiters: Vec::new(),
        restart_waiters: Vec::new(),
    };
    tokio::spawn(actor.run());

    SupervisorHandle {
        tx,
        port_rx,
        phase_rx,
        events_tx,
    }
}

// ---------------------------------------------------------------------------
// Supervisor task
// ---------------------------------------------------------------------------

type StartReply = oneshot::Sender<Result<u16, StartError>>;
type RestartReply = oneshot::Sender<RestartOutcome>;

enum Msg {
    Start(StartReply),
    Restart(RestartReply),
    Shutdown(oneshot::Sender<()>),
    /// One line of stdout from the tagged instance.
    Line { generation: u64, text: String },
    /// The tagged instance's process exited with this code (None = signal).
    Exited { generation: u64, code: Option<i32> },
    /// The startup window for the tagged instance elapsed.
    StartupDeadline { generation: u64 },
    /// The auto-restart delay elapsed.
    RestartDue,
}

struct Supervisor {
    config: SupervisorConfig,
    plan: LaunchPlan,
    rx: mpsc::Receiver<Msg>,
    self_tx: mpsc::Sender<Msg>,
    port_tx: watch::Sender<u16>,
    phase_tx: watch::Sender<ServicePhase>,
    events_tx: broadcast::Sender<ServiceEvent>,
    log_tx: broadcast::Sender<LogLine>,
    active: Option<ServiceInstance>,
    next_generation: u64,
    shutting_down: bool,
    /// Generation whose startup deadline is currently armed.
    deadline_for: Option<u64>,
    restart_timer_armed: bool,
    /// An explicit restart is waiting for the old instance to exit.
    restart_in_flight: bool,
    waiters: Vec<StartReply>,
    restart_waiters: Vec<RestartReply>,
}

impl Supervisor {
    async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            match msg {
                Msg::Start(reply) => self.on_start(reply),
                Msg::Restart(reply) => self.on_restart(reply),
                Msg::Shutdown(reply) => self.on_shutdown(reply),
                Msg::Line { generation, text } => self.on_line(generation, &text),
                Msg::Exited { generation, code } => self.on_exited(generation, code),
                Msg::StartupDeadline { generation } => self.on_deadline(generation),
                Msg::RestartDue => self.on_restart_due(),
            }
        }
        // All handles dropped: make sure the child does not outlive the host.
        if let Some(inst) = self.active.as_mut() {
            inst.request_termination();
        }
    }

    fn publish(&self) {
        let (phase, port) = match &self.active {
            Some(inst) => (inst.phase(), inst.port().unwrap_or(0)),
            None => (ServicePhase::Idle, 0),
        };
        self.phase_tx.send_replace(phase);
        self.port_tx.send_replace(port);
    }

    fn on_start(&mut self, reply: StartReply) {
        if self.shutting_down {
            let _ = reply.send(Err(StartError::ShuttingDown));
            return;
        }

        let active = self.active.as_ref().map(|i| (i.generation, i.state.clone()));
        match active {
            Some((_, LifecycleState::Ready(port))) => {
                let _ = reply.send(Ok(port));
            }
            Some((generation, LifecycleState::Starting)) => {
                self.waiters.push(reply);
                // Re-arm when a previous window already expired, so this
                // caller gets its own timeout.
                if self.deadline_for.is_none() {
                    self.arm_deadline(generation);
                }
            }
            // Mid-restart: the waiter carries over to the next instance.
            Some((_, LifecycleState::Terminating)) => self.waiters.push(reply),
            None => match self.spawn_instance() {
                Ok(()) => self.waiters.push(reply),
                Err(e) => {
                    let _ = reply.send(Err(e));
                }
            },
        }
    }

    fn on_restart(&mut self, reply: RestartReply) {
        if self.shutting_down {
            let _ = reply.send(RestartOutcome::failed(StartError::ShuttingDown));
            return;
        }

        self.restart_waiters.push(reply);
        if let Some(inst) = self.active.as_mut() {
            info!(generation = inst.generation, "restart requested, terminating active instance");
            inst.request_termination();
            self.restart_in_flight = true;
            self.publish();
        } else if !self.restart_in_flight {
            if let Err(e) = self.spawn_instance() {
                self.fail_waiters(e);
            }
        }
    }

    fn on_shutdown(&mut self, reply: oneshot::Sender<()>) {
        if !self.shutting_down {
            self.shutting_down = true;
            info!("shutdown requested");
            if let Some(inst) = self.active.as_mut() {
                inst.request_termination();
            }
            self.publish();
        }
        let _ = reply.send(());
    }

    fn on_line(&mut self, generation: u64, text: &str) {
        let Some(inst) = self.active.as_mut() else {
            return;
        };
        if inst.generation != generation {
            debug!(generation, "discarding output from superseded instance");
            return;
        }
        // Only the first handshake match per instance counts, and only
        // while it is still starting up.
        if inst.state != LifecycleState::Starting {
            return;
        }
        let Some(port) = handshake::try_extract_port(text) else {
            return;
        };

        inst.state = LifecycleState::Ready(port);
        let waited = inst.spawned_at.elapsed();
        info!(port, generation, elapsed_ms = waited.as_millis() as u64, "backend service ready");
        self.publish();
        let _ = self.events_tx.send(ServiceEvent::Ready { port });
        for w in self.waiters.drain(..) {
            let _ = w.send(Ok(port));
        }
        for w in self.restart_waiters.drain(..) {
            let _ = w.send(RestartOutcome::succeeded(port));
        }
    }

    fn on_exited(&mut self, generation: u64, code: Option<i32>) {
        let current = self.active.as_ref().map(|i| i.generation);
        if current != Some(generation) {
            debug!(generation, "discarding exit of superseded instance");
            return;
        }
        let inst = self.active.take().expect("generation matched");
        let was_ready = inst.port().is_some();
        info!(?code, generation, pid = ?inst.pid, "backend service exited");
        self.publish();
        let _ = self.events_tx.send(ServiceEvent::Exited { code });

        if self.restart_in_flight {
            // This exit is the teardown half of an explicit restart.
            self.restart_in_flight = false;
            if self.shutting_down {
                self.fail_waiters(StartError::ShuttingDown);
            } else if let Err(e) = self.spawn_instance() {
                self.fail_waiters(e);
            }
            return;
        }

        if !was_ready {
            // Died before the handshake: the pending callers decide whether
            // to retry; the restart policy does not cover pre-ready crashes.
            self.fail_waiters(StartError::PrematureExit { code });
        }

        if self.shutting_down {
            return;
        }

        // Auto-restart only for abnormal exits of a ready instance. Exit 0
        // and signal deaths (code None) are treated as intentional.
        if was_ready && matches!(code, Some(c) if c != 0) && !self.restart_timer_armed {
            warn!(
                ?code,
                delay_ms = self.config.restart_delay.as_millis() as u64,
                "backend service exited abnormally, scheduling restart"
            );
            self.restart_timer_armed = true;
            let tx = self.self_tx.clone();
            let delay = self.config.restart_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.send(Msg::RestartDue).await;
            });
        }
    }

    fn on_deadline(&mut self, generation: u64) {
        if self.deadline_for != Some(generation) {
            return;
        }
        self.deadline_for = None;
        let Some(inst) = &self.active else {
            return;
        };
        if inst.generation != generation || inst.port().is_some() {
            return;
        }
        // The process stays up: a late handshake can still flip it to Ready,
        // and restart/shutdown will reap it otherwise.
        warn!(
            generation,
            timeout_ms = self.config.startup_timeout.as_millis() as u64,
            "no port handshake within the startup window"
        );
        self.fail_waiters(StartError::StartupTimeout {
            waited: self.config.startup_timeout,
        });
    }

    fn on_restart_due(&mut self) {
        self.restart_timer_armed = false;
        if self.shutting_down {
            info!("scheduled restart cancelled by shutdown");
            return;
        }
        if self.active.is_some() || self.restart_in_flight {
            // An explicit restart got there first.
            return;
        }
        info!("auto-restarting backend service");
        if let Err(e) = self.spawn_instance() {
            error!(error = %e, "auto-restart failed");
        }
    }

    fn spawn_instance(&mut self) -> Result<(), StartError> {
        let generation = self.next_generation;
        self.next_generation += 1;

        let mut child = launcher::spawn(&self.plan).map_err(|e| {
            error!(program = %self.plan.program.display(), error = %e, "spawn failed");
            StartError::Spawn(e.to_string())
        })?;
        let pid = child.id();
        info!(?pid, generation, program = %self.plan.program.display(), "backend service spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // stdout feeds the handshake and the log relay; stderr only the relay.
        let tx = self.self_tx.clone();
        let log_tx = self.log_tx.clone();
        tokio::spawn(async move {
            let Some(out) = stdout else { return };
            let mut reader = BufReader::new(out);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        let text = line.trim_end_matches('\n').trim_end_matches('\r').to_string();
                        let _ = log_tx.send(LogLine::new(text.clone(), false));
                        if tx.send(Msg::Line { generation, text }).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "stdout read error");
                        break;
                    }
                }
            }
        });

        let log_tx = self.log_tx.clone();
        tokio::spawn(async move {
            let Some(err) = stderr else { return };
            let mut reader = BufReader::new(err);
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let text = line.trim_end_matches('\n').trim_end_matches('\r').to_string();
                        let _ = log_tx.send(LogLine::new(text, true));
                    }
                    Err(e) => {
                        warn!(error = %e, "stderr read error");
                        break;
                    }
                }
            }
        });

        // The instance task owns the child: it reports the natural exit, or
        // runs the graceful termination sequence when asked.
        let term = CancellationToken::new();
        let group = platform::post_spawn_setup(pid);
        let task_term = term.clone();
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            let code = tokio::select! {
                status = child.wait() => status.ok().and_then(|s| s.code()),
                _ = task_term.cancelled() => {
                    platform::terminate_child(&mut child, pid, group.as_ref())
                        .await
                        .and_then(|s| s.code())
                }
            };
            let _ = tx.send(Msg::Exited { generation, code }).await;
        });

        self.active = Some(ServiceInstance {
            generation,
            pid,
            state: LifecycleState::Starting,
            term,
            spawned_at: Instant::now(),
        });
        self.arm_deadline(generation);
        self.publish();
        Ok(())
    }

    fn arm_deadline(&mut self, generation: u64) {
        self.deadline_for = Some(generation);
        let tx = self.self_tx.clone();
        let window = self.config.startup_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let _ = tx.send(Msg::StartupDeadline { generation }).await;
        });
    }

    fn fail_waiters(&mut self, err: StartError) {
        for w in self.waiters.drain(..) {
            let _ = w.send(Err(err.clone()));
        }
        for w in self.restart_waiters.drain(..) {
            let _ = w.send(RestartOutcome::failed(err.clone()));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests — real child processes, like the rest of the process plumbing
// ---------------------------------------------------------------------------
