//! [`SafetyController`] – the sole authority permitted to disarm the robot.
//!
//! The controller is an actor: one task owns the registration table and is
//! driven by three inputs, polled in this priority order:
//!
//! 1. finished disarm tasks,
//! 2. the error intake bus,
//! 3. commands from [`SafetyHandle`]s.
//!
//! Any `Critical` record on the intake starts a **disarm sweep**: every armed
//! component's capability is invoked in parallel on a [`JoinSet`], each under
//! its own deadline.  Successes move to `Disarmed`, failures (error, timeout,
//! panic) to `DisarmFailed`.  Nothing is retried or rolled back, and no
//! component is ever re-armed.
//!
//! A trigger that arrives while a sweep is running does not start a second
//! one.  Components that are armed at that moment (registered after the
//! sweep began) are added to the running sweep instead.  Any disarm started
//! while a sweep runs, including a manual retry of a failed component, is
//! awaited by that sweep and its result replaces whatever the sweep had
//! recorded for the component.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ironclad_kernel::{FnDisarm, SafetyConfig, SafetyController};
//! use ironclad_middleware::ErrorBus;
//! use ironclad_types::{ComponentPath, SafetyError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let bus = ErrorBus::default();
//! let (controller, safety) = SafetyController::new(SafetyConfig::default(), &bus);
//! tokio::spawn(controller.run());
//!
//! let brake = ComponentPath::parse("base/brake")?;
//! safety.register(brake.clone(), Arc::new(FnDisarm::new(|| Ok(())))).await?;
//!
//! let mut sweeps = safety.subscribe_sweeps();
//! bus.raise(brake.clone(), SafetyError::EmergencyStop { reason: "demo".into() })?;
//! let report = sweeps.recv().await?;
//! assert!(report.is_clean());
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ironclad_middleware::{ErrorBus, ErrorReceiver};
use ironclad_types::{
    Classified, ComponentPath, DisarmFailure, DisarmFailureReason, ErrorRecord, RobotError,
    SafetyError, StateError,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::SafetyConfig;
use crate::disarm::Disarm;
use crate::state::{ComponentStatus, RegistrationTable, SafetyControllerState};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Result of disarming one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisarmOutcome {
    pub component: ComponentPath,
    pub result: Result<(), DisarmFailureReason>,
}

impl DisarmOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// What started a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SweepTrigger {
    /// A `Critical` record arrived on the intake bus.
    Critical { record: Uuid, source: ComponentPath },
    /// The intake receiver fell behind and `missed` records were dropped
    /// unseen.  Any of them may have been critical.
    IntakeLagged { missed: u64 },
    /// [`SafetyHandle::disarm_all`] was called.
    Explicit,
}

/// Summary of a finished sweep.
///
/// `outcomes` covers every registered component that was not armed-and-
/// untouched at the end of the sweep, sorted by path: components disarmed by
/// this sweep, components already disarmed (reported as success without
/// invoking them again), and components that remain `DisarmFailed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub id: Uuid,
    pub trigger: SweepTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<DisarmOutcome>,
}

impl SweepReport {
    /// Every component that did not end up disarmed.
    pub fn failures(&self) -> Vec<DisarmFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.result {
                Ok(()) => None,
                Err(reason) => Some(DisarmFailure {
                    component: o.component.clone(),
                    reason: reason.clone(),
                }),
            })
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.outcomes.iter().all(DisarmOutcome::is_ok)
    }

    /// The aggregate [`SafetyError::DisarmFailed`] when any component failed.
    pub fn aggregate_error(&self) -> Option<SafetyError> {
        let failures = self.failures();
        (!failures.is_empty()).then_some(SafetyError::DisarmFailed { failures })
    }

    /// `Ok(self)` for a clean sweep, the aggregate error otherwise.
    ///
    /// # Errors
    ///
    /// [`SafetyError::DisarmFailed`] listing every failed component.
    pub fn into_result(self) -> Result<SweepReport, SafetyError> {
        match self.aggregate_error() {
            None => Ok(self),
            Some(err) => Err(err),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Commands & handle
// ────────────────────────────────────────────────────────────────────────────

type SweepWaiter = oneshot::Sender<Result<SweepReport, SafetyError>>;
type DisarmWaiter = oneshot::Sender<Result<DisarmOutcome, StateError>>;

enum Command {
    Register {
        path: ComponentPath,
        capability: Arc<dyn Disarm>,
        timeout: Option<Duration>,
        reply: oneshot::Sender<Result<(), StateError>>,
    },
    Deregister {
        path: ComponentPath,
        reply: oneshot::Sender<Result<(), StateError>>,
    },
    Status {
        path: ComponentPath,
        reply: oneshot::Sender<Option<ComponentStatus>>,
    },
    Snapshot {
        reply: oneshot::Sender<SafetyControllerState>,
    },
    DisarmAll {
        reply: SweepWaiter,
    },
    Disarm {
        path: ComponentPath,
        reply: DisarmWaiter,
    },
    Shutdown,
}

/// Cheap, clonable front door to a running [`SafetyController`].
///
/// Every method fails with [`StateError::ControllerStopped`] once the
/// controller task has exited.
#[derive(Clone, Debug)]
pub struct SafetyHandle {
    commands: mpsc::Sender<Command>,
    sweeps: broadcast::Sender<SweepReport>,
}

impl SafetyHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, StateError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| StateError::ControllerStopped)?;
        response.await.map_err(|_| StateError::ControllerStopped)
    }

    /// Register `path` as armed, disarmed through `capability` under the
    /// configured default timeout.
    ///
    /// # Errors
    ///
    /// [`StateError::InvalidTransition`] when `path` is already registered
    /// and not armed.
    pub async fn register(
        &self,
        path: ComponentPath,
        capability: Arc<dyn Disarm>,
    ) -> Result<(), StateError> {
        self.request(|reply| Command::Register {
            path,
            capability,
            timeout: None,
            reply,
        })
        .await?
    }

    /// [`register`][Self::register] with a per-component disarm deadline.
    pub async fn register_with_timeout(
        &self,
        path: ComponentPath,
        capability: Arc<dyn Disarm>,
        timeout: Duration,
    ) -> Result<(), StateError> {
        self.request(|reply| Command::Register {
            path,
            capability,
            timeout: Some(timeout),
            reply,
        })
        .await?
    }

    /// Remove `path` from the table.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownComponent`] for an unregistered path,
    /// [`StateError::InvalidTransition`] while it is being disarmed.
    pub async fn deregister(&self, path: ComponentPath) -> Result<(), StateError> {
        self.request(|reply| Command::Deregister { path, reply }).await?
    }

    /// Current status of `path`, `None` when it is not registered.
    pub async fn status(&self, path: ComponentPath) -> Result<Option<ComponentStatus>, StateError> {
        self.request(|reply| Command::Status { path, reply }).await
    }

    pub async fn snapshot(&self) -> Result<SafetyControllerState, StateError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Disarm every armed component and wait for the sweep to finish.
    ///
    /// Joins the running sweep when there is one.
    ///
    /// # Errors
    ///
    /// - [`RobotError::Safety`] carrying [`SafetyError::DisarmFailed`] when
    ///   any component failed to disarm.
    /// - [`RobotError::State`] when the controller is not running.
    pub async fn disarm_all(&self) -> Result<SweepReport, RobotError> {
        let report = self.request(|reply| Command::DisarmAll { reply }).await?;
        report.map_err(RobotError::from)
    }

    /// Disarm a single component.
    ///
    /// An already-disarmed component reports success without its capability
    /// being invoked again.  A `DisarmFailed` component is retried: this is
    /// the manual path, sweeps never retry.
    ///
    /// # Errors
    ///
    /// [`StateError::UnknownComponent`] for an unregistered path.
    pub async fn disarm(&self, path: ComponentPath) -> Result<DisarmOutcome, StateError> {
        self.request(|reply| Command::Disarm { path, reply }).await?
    }

    /// Receive a copy of every sweep report from now on.
    pub fn subscribe_sweeps(&self) -> broadcast::Receiver<SweepReport> {
        self.sweeps.subscribe()
    }

    /// Ask the controller to exit once in-flight disarm calls finish.
    pub async fn shutdown(&self) -> Result<(), StateError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| StateError::ControllerStopped)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

struct Sweep {
    id: Uuid,
    trigger: SweepTrigger,
    started_at: DateTime<Utc>,
    pending: HashSet<ComponentPath>,
    /// Latest outcome per component; a later disarm of the same component
    /// replaces it.
    outcomes: HashMap<ComponentPath, DisarmOutcome>,
    waiters: Vec<SweepWaiter>,
}

/// Owns the registration table and drives disarm sweeps.  See the module
/// docs.
pub struct SafetyController {
    config: SafetyConfig,
    table: RegistrationTable,
    intake: ErrorReceiver,
    intake_open: bool,
    commands: mpsc::Receiver<Command>,
    sweeps: broadcast::Sender<SweepReport>,
    tasks: JoinSet<Result<(), DisarmFailureReason>>,
    task_paths: HashMap<Id, ComponentPath>,
    disarm_waiters: HashMap<ComponentPath, Vec<DisarmWaiter>>,
    sweep: Option<Sweep>,
    stopping: bool,
}

impl SafetyController {
    /// Create a controller subscribed to `bus` and the handle that talks to
    /// it.  Nothing happens until [`run`][Self::run] is polled, but records
    /// published in the meantime are buffered.
    pub fn new(config: SafetyConfig, bus: &ErrorBus) -> (Self, SafetyHandle) {
        let (commands_tx, commands) = mpsc::channel(config.command_capacity.max(1));
        let (sweeps, _) = broadcast::channel(config.sweep_history_capacity.max(1));
        let handle = SafetyHandle {
            commands: commands_tx,
            sweeps: sweeps.clone(),
        };
        let controller = Self {
            config,
            table: RegistrationTable::new(),
            intake: bus.subscribe(),
            intake_open: true,
            commands,
            sweeps,
            tasks: JoinSet::new(),
            task_paths: HashMap::new(),
            disarm_waiters: HashMap::new(),
            sweep: None,
            stopping: false,
        };
        (controller, handle)
    }

    /// Drive the controller until shutdown is requested (or every handle is
    /// dropped) and no disarm call is left in flight.
    pub async fn run(mut self) {
        info!(
            disarm_timeout_ms = self.config.disarm_timeout_ms,
            "safety controller started"
        );
        loop {
            if self.stopping && self.tasks.is_empty() {
                break;
            }
            tokio::select! {
                biased;
                Some(joined) = self.tasks.join_next_with_id() => self.on_task_finished(joined),
                received = self.intake.recv(), if self.intake_open => self.on_intake(received),
                command = self.commands.recv(), if !self.stopping => match command {
                    Some(command) => self.on_command(command),
                    None => {
                        info!("every safety handle dropped, stopping");
                        self.stopping = true;
                    }
                },
                else => break,
            }
        }
        info!("safety controller stopped");
    }

    // ── Inputs ──────────────────────────────────────────────────────────────

    fn on_intake(&mut self, received: Result<ErrorRecord, RecvError>) {
        match received {
            Ok(record) if record.severity().is_critical() => {
                warn!(
                    source = %record.source,
                    error = %record.error,
                    "critical error observed, disarming"
                );
                self.trigger(
                    SweepTrigger::Critical {
                        record: record.id,
                        source: record.source,
                    },
                    None,
                );
            }
            Ok(record) => {
                debug!(
                    source = %record.source,
                    severity = %record.severity(),
                    "non-critical error ignored"
                );
            }
            Err(RecvError::Lagged(missed)) => {
                error!(missed, "error intake lagged, treating as critical");
                self.trigger(SweepTrigger::IntakeLagged { missed }, None);
            }
            Err(RecvError::Closed) => {
                warn!("error intake closed");
                self.intake_open = false;
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Register {
                path,
                capability,
                timeout,
                reply,
            } => {
                let timeout = timeout.unwrap_or_else(|| self.config.disarm_timeout());
                let result = self.table.register(path.clone(), capability, timeout);
                match &result {
                    Ok(()) => info!(
                        component = %path,
                        timeout_ms = millis(timeout),
                        "component registered"
                    ),
                    Err(e) => warn!(component = %path, error = %e, "registration refused"),
                }
                let _ = reply.send(result);
            }
            Command::Deregister { path, reply } => {
                let result = self.table.deregister(&path);
                if result.is_ok() {
                    info!(component = %path, "component deregistered");
                }
                let _ = reply.send(result);
            }
            Command::Status { path, reply } => {
                let _ = reply.send(self.table.status(&path));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.table.snapshot());
            }
            Command::DisarmAll { reply } => self.trigger(SweepTrigger::Explicit, Some(reply)),
            Command::Disarm { path, reply } => self.disarm_one(path, reply),
            Command::Shutdown => {
                info!(in_flight = self.tasks.len(), "shutdown requested");
                self.stopping = true;
            }
        }
    }

    fn on_task_finished(
        &mut self,
        joined: Result<(Id, Result<(), DisarmFailureReason>), JoinError>,
    ) {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(err) => {
                let reason = if err.is_panic() {
                    "disarm call panicked"
                } else {
                    "disarm task cancelled"
                };
                (err.id(), Err(DisarmFailureReason::Aborted(reason.into())))
            }
        };
        let Some(path) = self.task_paths.remove(&id) else {
            warn!(task = %id, "finished disarm task has no component");
            return;
        };

        match (self.table.finish_disarm(&path, &result), &result) {
            (Some(_), Ok(())) => info!(component = %path, "component disarmed"),
            (Some(_), Err(reason)) => {
                error!(component = %path, reason = %reason, "component failed to disarm")
            }
            (None, _) => debug!(component = %path, "disarm finished for removed component"),
        }

        let outcome = DisarmOutcome {
            component: path.clone(),
            result,
        };
        if let Some(waiters) = self.disarm_waiters.remove(&path) {
            for waiter in waiters {
                let _ = waiter.send(Ok(outcome.clone()));
            }
        }
        if let Some(sweep) = self.sweep.as_mut()
            && sweep.pending.remove(&path)
        {
            sweep.outcomes.insert(path, outcome);
        }
        self.finish_sweep_if_done();
    }

    // ── Sweeps ──────────────────────────────────────────────────────────────

    fn trigger(&mut self, trigger: SweepTrigger, waiter: Option<SweepWaiter>) {
        if self.sweep.is_none() {
            self.start_sweep(trigger, waiter);
            return;
        }

        // spawn_disarm joins each newly armed component to the running sweep.
        let added = self
            .table
            .paths_with(ComponentStatus::Armed)
            .into_iter()
            .filter(|path| self.spawn_disarm(path).is_ok())
            .count();
        if let Some(sweep) = self.sweep.as_mut() {
            debug!(
                sweep = %sweep.id,
                added,
                ?trigger,
                "trigger coalesced into running sweep"
            );
            sweep.waiters.extend(waiter);
        }
    }

    fn start_sweep(&mut self, trigger: SweepTrigger, waiter: Option<SweepWaiter>) {
        let mut sweep = Sweep {
            id: Uuid::new_v4(),
            trigger,
            started_at: Utc::now(),
            pending: HashSet::new(),
            outcomes: HashMap::new(),
            waiters: waiter.into_iter().collect(),
        };

        for path in self.table.paths_with(ComponentStatus::Disarmed) {
            sweep.outcomes.insert(
                path.clone(),
                DisarmOutcome {
                    component: path,
                    result: Ok(()),
                },
            );
        }
        for path in self.table.paths_with(ComponentStatus::DisarmFailed) {
            let reason = self
                .table
                .failure(&path)
                .cloned()
                .unwrap_or_else(|| DisarmFailureReason::Aborted("unknown".into()));
            sweep.outcomes.insert(
                path.clone(),
                DisarmOutcome {
                    component: path,
                    result: Err(reason),
                },
            );
        }
        // Single-component disarms already running are joined, not restarted.
        sweep
            .pending
            .extend(self.table.paths_with(ComponentStatus::Disarming));
        self.sweep = Some(sweep);
        for path in self.table.paths_with(ComponentStatus::Armed) {
            let _ = self.spawn_disarm(&path);
        }

        if let Some(sweep) = &self.sweep {
            info!(
                sweep = %sweep.id,
                targets = sweep.pending.len(),
                trigger = ?sweep.trigger,
                "disarm sweep started"
            );
        }
        self.finish_sweep_if_done();
    }

    fn finish_sweep_if_done(&mut self) {
        if !self.sweep.as_ref().is_some_and(|s| s.pending.is_empty()) {
            return;
        }
        let Some(sweep) = self.sweep.take() else {
            return;
        };

        let mut outcomes: Vec<_> = sweep.outcomes.into_values().collect();
        outcomes.sort_by(|a, b| a.component.cmp(&b.component));
        let report = SweepReport {
            id: sweep.id,
            trigger: sweep.trigger,
            started_at: sweep.started_at,
            finished_at: Utc::now(),
            outcomes,
        };

        match report.aggregate_error() {
            None => info!(
                sweep = %report.id,
                components = report.outcomes.len(),
                "disarm sweep complete"
            ),
            Some(err) => error!(
                sweep = %report.id,
                error = %err,
                "disarm sweep finished with failures, manual intervention required"
            ),
        }

        let _ = self.sweeps.send(report.clone());
        for waiter in sweep.waiters {
            let _ = waiter.send(report.clone().into_result());
        }
    }

    // ── Single disarm ───────────────────────────────────────────────────────

    fn disarm_one(&mut self, path: ComponentPath, reply: DisarmWaiter) {
        match self.table.status(&path) {
            None => {
                let _ = reply.send(Err(StateError::UnknownComponent { component: path }));
            }
            Some(ComponentStatus::Disarmed) => {
                debug!(component = %path, "already disarmed");
                let _ = reply.send(Ok(DisarmOutcome {
                    component: path,
                    result: Ok(()),
                }));
            }
            Some(ComponentStatus::Disarming) => {
                self.disarm_waiters.entry(path).or_default().push(reply);
            }
            Some(ComponentStatus::Armed | ComponentStatus::DisarmFailed) => {
                match self.spawn_disarm(&path) {
                    Ok(()) => self.disarm_waiters.entry(path).or_default().push(reply),
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }
        }
    }

    /// Move `path` to `Disarming` and spawn its capability under its
    /// deadline.  A running sweep waits for the result.
    fn spawn_disarm(&mut self, path: &ComponentPath) -> Result<(), StateError> {
        let ticket = self.table.begin_disarm(path)?;
        let timeout = ticket.timeout;
        let span = info_span!("disarm", component = %path);
        let handle = self.tasks.spawn(
            async move {
                match tokio::time::timeout(timeout, ticket.capability.disarm()).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(reason)) => Err(DisarmFailureReason::Rejected(reason)),
                    Err(_) => Err(DisarmFailureReason::TimedOut {
                        after_ms: millis(timeout),
                    }),
                }
            }
            .instrument(span),
        );
        self.task_paths.insert(handle.id(), path.clone());
        if let Some(sweep) = self.sweep.as_mut() {
            sweep.pending.insert(path.clone());
        }
        Ok(())
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
