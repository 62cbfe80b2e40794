use serde::Serialize;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Lifecycle of the live instance. `Exited` is implicit: the supervisor
/// drops the instance when the exit notification arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Ready(u16),
    Terminating,
}

/// Coarse phase published to observers (watch channel); carries no data so
/// the UI side can poll it without holding supervisor internals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicePhase {
    Idle,
    Starting,
    Ready,
    Terminating,
}

/// One spawned lifetime of the backend process. Owned exclusively by the
/// supervisor task; the child handle itself lives in a companion task that
/// waits on it and reacts to the termination token.
pub struct ServiceInstance {
    pub generation: u64,
    pub pid: Option<u32>,
    pub state: LifecycleState,
    pub term: CancellationToken,
    pub spawned_at: Instant,
}

impl ServiceInstance {
    pub fn port(&self) -> Option<u16> {
        match self.state {
            LifecycleState::Ready(port) => Some(port),
            _ => None,
        }
    }

    pub fn phase(&self) -> ServicePhase {
        match self.state {
            LifecycleState::Starting => ServicePhase::Starting,
            LifecycleState::Ready(_) => ServicePhase::Ready,
            LifecycleState::Terminating => ServicePhase::Terminating,
        }
    }

    /// Request graceful termination. Safe to call repeatedly; the underlying
    /// token is idempotent.
    pub fn request_termination(&mut self) {
        self.state = LifecycleState::Terminating;
        self.term.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(state: LifecycleState) -> ServiceInstance {
        ServiceInstance {
            generation: 1,
            pid: Some(42),
            state,
            term: CancellationToken::new(),
            spawned_at: Instant::now(),
        }
    }

    #[test]
    fn port_only_when_ready() {
        assert_eq!(instance(LifecycleState::Starting).port(), None);
        assert_eq!(instance(LifecycleState::Ready(8081)).port(), Some(8081));
        assert_eq!(instance(LifecycleState::Terminating).port(), None);
    }

    #[test]
    fn termination_request_is_idempotent() {
        let mut inst = instance(LifecycleState::Ready(8081));
        inst.request_termination();
        inst.request_termination();
        assert_eq!(inst.state, LifecycleState::Terminating);
        assert!(inst.term.is_cancelled());
    }
}
