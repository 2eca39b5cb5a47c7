//! Deciding when the shared preloader may be stopped.

use super::deferred::{DeferredResult, DeferredStop};
use super::peers::{active_peers, PeerRegistry};
use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::poll::{BoundedPoll, PollOutcome};
use crate::process::{ProcessSupervisor, Termination};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Where a runner is in its stop sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopState {
    #[default]
    Idle,
    /// A worker waits for peers before stopping.
    DeferredPending,
    Stopping,
    Stopped,
}

/// What a stop request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// No process was tracked.
    NotRunning,
    /// Stopped synchronously.
    Stopped(Termination),
    /// A deferred stop was already pending; nothing new was scheduled.
    AlreadyScheduled,
    /// A worker will stop Zeus once the peers are gone.
    Deferred,
}

/// Stop state plus the epoch of the deferred stop that owns it. A worker
/// only writes the state while its epoch is current.
#[derive(Debug, Default)]
struct Schedule {
    state: StopState,
    epoch: u64,
}

/// Immediate or last-one-out stopping of the supervised process.
pub struct ShutdownCoordinator {
    supervisor: Arc<ProcessSupervisor>,
    registry: Arc<dyn PeerRegistry>,
    poll: BoundedPoll,
    exit_last: bool,
    schedule: Arc<Mutex<Schedule>>,
    deferred: Mutex<Option<DeferredStop>>,
}

impl std::fmt::Debug for ShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownCoordinator")
            .field("exit_last", &self.exit_last)
            .field("poll", &self.poll)
            .field("state", &self.state())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ShutdownCoordinator {
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        registry: Arc<dyn PeerRegistry>,
        poll: BoundedPoll,
        exit_last: bool,
    ) -> Self {
        Self {
            supervisor,
            registry,
            poll,
            exit_last,
            schedule: Arc::new(Mutex::new(Schedule::default())),
            deferred: Mutex::new(None),
        }
    }

    pub fn state(&self) -> StopState {
        lock(&self.schedule).state
    }

    /// Move to `state` and invalidate any scheduled worker.
    fn set_state(&self, state: StopState) {
        let mut schedule = lock(&self.schedule);
        schedule.state = state;
        schedule.epoch += 1;
    }

    /// Stop now when `force` is set or `exit_last` is off, otherwise hand
    /// the stop to a worker that waits for the other consumers first.
    pub fn request_stop(&self, force: bool) -> Result<StopOutcome> {
        let Some(pid) = self.supervisor.pid() else {
            debug!("Stop requested but no Zeus process is tracked");
            return Ok(StopOutcome::NotRunning);
        };

        if force || !self.exit_last {
            if let Some(pending) = lock(&self.deferred).take() {
                pending.cancel();
            }
            self.set_state(StopState::Stopping);
            let termination = self.supervisor.terminate();
            self.set_state(settled(&termination));
            return termination.map(StopOutcome::Stopped);
        }

        let epoch = {
            let mut schedule = lock(&self.schedule);
            if schedule.state == StopState::DeferredPending {
                debug!("A deferred stop is already pending");
                return Ok(StopOutcome::AlreadyScheduled);
            }
            schedule.state = StopState::DeferredPending;
            schedule.epoch += 1;
            schedule.epoch
        };

        let supervisor = Arc::clone(&self.supervisor);
        let registry = Arc::clone(&self.registry);
        let schedule = Arc::clone(&self.schedule);
        let poll = self.poll;
        let spawned = DeferredStop::spawn(move |token| {
            let job = DeferredJob {
                supervisor: &supervisor,
                registry: registry.as_ref(),
                schedule: &schedule,
                epoch,
                pid,
            };
            job.run(&poll, &token)
        });

        match spawned {
            Ok(worker) => {
                info!("Zeus will stop once the other consumers have exited");
                *lock(&self.deferred) = Some(worker);
                Ok(StopOutcome::Deferred)
            }
            Err(e) => {
                self.set_state(StopState::Idle);
                Err(e)
            }
        }
    }

    /// The handle of the pending deferred stop, if one was scheduled.
    pub fn take_deferred_stop(&self) -> Option<DeferredStop> {
        lock(&self.deferred).take()
    }

    /// A new process was spawned: cancel any stop aimed at the old one and
    /// start the schedule over.
    pub fn reset_for_new_process(&self) {
        if let Some(pending) = lock(&self.deferred).take() {
            debug!("Cancelling the deferred stop of the previous Zeus process");
            pending.cancel();
        }
        self.set_state(StopState::Idle);
    }
}

/// State after a stop attempt. A failed one leaves the process tracked,
/// so the runner is back to idle and may try again.
fn settled(termination: &Result<Termination>) -> StopState {
    if termination.is_ok() {
        StopState::Stopped
    } else {
        StopState::Idle
    }
}

struct DeferredJob<'a> {
    supervisor: &'a ProcessSupervisor,
    registry: &'a dyn PeerRegistry,
    schedule: &'a Mutex<Schedule>,
    epoch: u64,
    pid: u32,
}

impl DeferredJob<'_> {
    fn run(&self, poll: &BoundedPoll, token: &CancellationToken) -> Result<DeferredResult> {
        let outcome = poll.wait_until_cancellable(token, || active_peers(self.registry).is_empty());
        match outcome {
            PollOutcome::Satisfied => debug!("No other Zeus consumers are running"),
            PollOutcome::TimedOut => warn!(
                "Timed out waiting for other Zeus consumers, stopping anyway: {}",
                active_peers(self.registry).join(", ")
            ),
            PollOutcome::Cancelled => {}
        }

        {
            let mut schedule = lock(self.schedule);
            if token.is_cancelled() || schedule.epoch != self.epoch {
                if schedule.epoch == self.epoch {
                    schedule.state = StopState::Idle;
                }
                debug!("Deferred stop of PID {} was cancelled", self.pid);
                return Ok(DeferredResult::Cancelled);
            }
            schedule.state = StopState::Stopping;
        }

        let termination = self.supervisor.terminate_if_tracking(self.pid);
        let mut schedule = lock(self.schedule);
        if schedule.epoch == self.epoch {
            schedule.state = settled(&termination);
        }
        termination.map(DeferredResult::Completed)
    }
}
