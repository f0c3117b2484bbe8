//! Worker process supervision.
//!
//! A [`ProcessSupervisor`] starts a set of worker programs, waits for all of
//! them, and tears the whole set down when one fails or the supervisor is
//! interrupted. Workers are separate OS processes; each one builds its own
//! bus endpoints.
//!
//! On unix every worker is started in its own process group so termination
//! reaches anything the worker forked as well: `SIGTERM` first, `SIGKILL`
//! once the grace period runs out.
//!
//! ```rust,no_run
//! use proclink::supervisor::{ProcessSupervisor, WorkerSpec};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut supervisor = ProcessSupervisor::new();
//! supervisor.register(WorkerSpec::current_exe("publisher", ["publish", "tcp"])?);
//! supervisor.register(WorkerSpec::current_exe("subscriber", ["subscribe", "tcp"])?);
//! supervisor.run_all()?;
//! # Ok(())
//! # }
//! ```

use std::ffi::{OsStr, OsString};
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::signal;

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(2);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Errors from [`ProcessSupervisor::run_all`].
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A worker could not be started
    #[error("Failed to spawn worker {name}: {source}")]
    Spawn {
        /// Worker name
        name: String,
        /// OS error from spawning
        #[source]
        source: io::Error,
    },

    /// A worker exited unsuccessfully
    #[error("Worker {name} failed: {status}")]
    WorkerFailed {
        /// Worker name
        name: String,
        /// Exit status it reported
        status: ExitStatus,
    },

    /// SIGINT / SIGTERM or the stop handle
    #[error("Interrupted, workers terminated")]
    Interrupted,

    /// Polling a worker failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// How to start one worker.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    name: String,
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

impl WorkerSpec {
    /// Run `program` with no arguments.
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    /// Re-run the current executable with `args`.
    ///
    /// The binary dispatches on its arguments to act as the worker.
    pub fn current_exe<I, S>(name: impl Into<String>, args: I) -> Result<Self, SupervisorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Ok(Self::new(name, std::env::current_exe()?).args(args))
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Set an environment variable for the worker.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    /// Worker name used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd
    }
}

/// Handle returned by [`ProcessSupervisor::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(usize);

/// Last known state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Registered, not started
    Pending,
    /// Spawned and not yet reaped
    Running,
    /// Exited on its own
    Exited(ExitStatus),
    /// Stopped by the supervisor; `None` if it could not be reaped
    Terminated(Option<ExitStatus>),
    /// Spawn failed
    FailedToStart,
}

/// Name, pid and status of one worker.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    /// Worker name
    pub name: String,
    /// Pid of the last run, once started
    pub pid: Option<u32>,
    /// Last known status
    pub status: WorkerStatus,
}

/// Starts workers and owns their lifecycle.
#[derive(Debug)]
pub struct ProcessSupervisor {
    workers: Vec<WorkerSpec>,
    records: Vec<ProcessRecord>,
    grace_period: Duration,
    poll_interval: Duration,
    handle_signals: bool,
    stop: Arc<AtomicBool>,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    /// Supervisor with no workers and default timings.
    pub fn new() -> Self {
        Self {
            workers: Vec::new(),
            records: Vec::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            handle_signals: true,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Time between `SIGTERM` and `SIGKILL`.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// How often `run_all` checks on workers.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Whether `run_all` installs SIGINT / SIGTERM handlers. On by default.
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Flag that interrupts a running `run_all` when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Add a worker for the next `run_all`.
    pub fn register(&mut self, spec: WorkerSpec) -> WorkerId {
        let id = WorkerId(self.workers.len());
        self.records.push(ProcessRecord {
            name: spec.name.clone(),
            pid: None,
            status: WorkerStatus::Pending,
        });
        self.workers.push(spec);
        id
    }

    /// Name, pid and status of a registered worker.
    pub fn record(&self, id: WorkerId) -> Option<&ProcessRecord> {
        self.records.get(id.0)
    }

    /// Every record, in registration order.
    pub fn records(&self) -> &[ProcessRecord] {
        &self.records
    }

    /// Start every worker and wait for all of them.
    ///
    /// Returns `Ok` once every worker exited successfully. A spawn failure,
    /// a failing worker, or an interruption terminates the remaining workers
    /// before the error is returned.
    pub fn run_all(&mut self) -> Result<(), SupervisorError> {
        let _signals = self.handle_signals.then(signal::install);
        self.stop.store(false, Ordering::SeqCst);
        for record in &mut self.records {
            record.pid = None;
            record.status = WorkerStatus::Pending;
        }

        let mut group = ProcessGroup::new(self.grace_period);
        self.spawn_all(&mut group)?;
        info!("[SUPERVISOR] Started {} worker(s)", group.len());

        let outcome = self.wait_all(&mut group);
        if outcome.is_err() {
            let reaped = group.terminate();
            self.mark_terminated(reaped);
        }
        outcome
    }

    fn spawn_all(&mut self, group: &mut ProcessGroup) -> Result<(), SupervisorError> {
        for (idx, spec) in self.workers.iter().enumerate() {
            match spec.command().spawn() {
                Ok(child) => {
                    debug!("[SUPERVISOR] Worker {} started, pid {}", spec.name, child.id());
                    self.records[idx].pid = Some(child.id());
                    self.records[idx].status = WorkerStatus::Running;
                    group.push(idx, child);
                }
                Err(source) => {
                    warn!("[SUPERVISOR] Worker {} failed to start: {}", spec.name, source);
                    self.records[idx].status = WorkerStatus::FailedToStart;
                    for (started, status) in group.terminate() {
                        self.records[started].status = WorkerStatus::Terminated(status);
                    }
                    return Err(SupervisorError::Spawn {
                        name: spec.name.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }

    fn wait_all(&mut self, group: &mut ProcessGroup) -> Result<(), SupervisorError> {
        loop {
            if self.interrupted() {
                info!("[SUPERVISOR] Interrupted, terminating workers");
                return Err(SupervisorError::Interrupted);
            }

            for (idx, status) in group.reap()? {
                let record = &mut self.records[idx];
                record.status = WorkerStatus::Exited(status);
                if !status.success() {
                    warn!("[SUPERVISOR] Worker {} failed: {}", record.name, status);
                    return Err(SupervisorError::WorkerFailed {
                        name: record.name.clone(),
                        status,
                    });
                }
                debug!("[SUPERVISOR] Worker {} finished", record.name);
            }

            if group.is_empty() {
                info!("[SUPERVISOR] All workers finished");
                return Ok(());
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    fn interrupted(&self) -> bool {
        self.stop.load(Ordering::SeqCst) || (self.handle_signals && signal::interrupted())
    }

    fn mark_terminated(&mut self, reaped: Vec<(usize, Option<ExitStatus>)>) {
        for (idx, status) in reaped {
            self.records[idx].status = WorkerStatus::Terminated(status);
        }
    }
}

/// Running children of one `run_all` call.
///
/// Whatever is still running when the group is dropped gets terminated.
struct ProcessGroup {
    children: Vec<(usize, Child)>,
    grace_period: Duration,
}

impl ProcessGroup {
    fn new(grace_period: Duration) -> Self {
        Self {
            children: Vec::new(),
            grace_period,
        }
    }

    fn push(&mut self, idx: usize, child: Child) {
        self.children.push((idx, child));
    }

    fn len(&self) -> usize {
        self.children.len()
    }

    fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Remove and return workers that have exited.
    fn reap(&mut self) -> io::Result<Vec<(usize, ExitStatus)>> {
        let mut exited = Vec::new();
        let mut i = 0;
        while i < self.children.len() {
            match self.children[i].1.try_wait()? {
                Some(status) => {
                    let (idx, _) = self.children.swap_remove(i);
                    exited.push((idx, status));
                }
                None => i += 1,
            }
        }
        exited.sort_by_key(|(idx, _)| *idx);
        Ok(exited)
    }

    /// SIGTERM everything, wait out the grace period, then SIGKILL.
    fn terminate(&mut self) -> Vec<(usize, Option<ExitStatus>)> {
        if self.children.is_empty() {
            return Vec::new();
        }
        debug!("[SUPERVISOR] Terminating {} worker(s)", self.children.len());

        for (_, child) in &mut self.children {
            send_term(child);
        }

        let mut reaped = Vec::new();
        let deadline = Instant::now() + self.grace_period;
        loop {
            let mut i = 0;
            while i < self.children.len() {
                match self.children[i].1.try_wait() {
                    Ok(Some(status)) => {
                        let (idx, _) = self.children.swap_remove(i);
                        reaped.push((idx, Some(status)));
                    }
                    Ok(None) => i += 1,
                    Err(e) => {
                        trace!("[SUPERVISOR] try_wait failed: {}", e);
                        i += 1;
                    }
                }
            }
            if self.children.is_empty() || Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        for (idx, mut child) in self.children.drain(..) {
            warn!("[SUPERVISOR] pid {} ignored SIGTERM, killing", child.id());
            send_kill(&mut child);
            reaped.push((idx, child.wait().ok()));
        }
        reaped
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), signal) {
        trace!("[SUPERVISOR] {} to group {} failed: {}", signal, raw, e);
    }
}

#[cfg(unix)]
fn send_term(child: &mut Child) {
    signal_group(child, nix::sys::signal::Signal::SIGTERM);
}

#[cfg(not(unix))]
fn send_term(child: &mut Child) {
    let _ = child.kill();
}

fn send_kill(child: &mut Child) {
    #[cfg(unix)]
    signal_group(child, nix::sys::signal::Signal::SIGKILL);
    let _ = child.kill();
}
