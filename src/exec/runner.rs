/// Bounded process execution
///
/// An invocation moves through a fixed sequence of states, each transition
/// consuming the previous one:
///
/// `Invocation<NotStarted>` -> `spawn()` -> `Invocation<Running>` -> `wait()` -> [`InvocationOutcome`]
///
/// There is exactly one attempt per request and no way back from a terminal
/// outcome; a timed-out child is killed, never suspended.
use crate::config::settings::RunnerSettings;
use crate::config::types::{InvocationRequest, Result, RunnerError};
use crate::kernel::rlimit::{report_to_stderr, LimitPlan, SystemLimits};
use crate::kernel::signal::TerminationSignals;
use crate::verdict::{signal_exit_code, InvocationOutcome};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

/// Type-state marker: request accepted, no child yet
pub struct NotStarted;

/// Type-state: child spawned and owned by this invocation
pub struct Running {
    child: Child,
    started: Instant,
}

pub struct Invocation<S> {
    request: InvocationRequest,
    settings: RunnerSettings,
    signals: Option<TerminationSignals>,
    state: S,
}

impl Invocation<NotStarted> {
    pub fn new(request: InvocationRequest, settings: RunnerSettings) -> Self {
        Self {
            request,
            settings,
            signals: None,
            state: NotStarted,
        }
    }

    /// Kill the child and fail with [`RunnerError::Interrupted`] when the
    /// runner receives SIGINT, SIGTERM or SIGHUP while waiting.
    pub fn watch_signals(mut self, signals: TerminationSignals) -> Self {
        self.signals = Some(signals);
        self
    }

    /// Spawn the command. Resource ceilings are applied in the child after
    /// fork and before exec, so the target never runs unconstrained.
    pub fn spawn(self) -> Result<Invocation<Running>> {
        let plan = LimitPlan::from_ceilings(self.request.ceilings());

        let mut cmd = Command::new(self.request.program());
        cmd.args(self.request.args());

        if self.settings.kill_process_group {
            cmd.process_group(0);
        }

        if !plan.is_empty() {
            log::debug!("Resource ceilings for child: {:?}", self.request.ceilings());
            unsafe {
                cmd.pre_exec(move || {
                    // Failures are reported by the child and deliberately
                    // dropped: the deadline still bounds the run.
                    let _applied = plan.apply(&SystemLimits, report_to_stderr);
                    Ok(())
                });
            }
        }

        let started = Instant::now();
        let child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            program: self.request.program().to_string(),
            source,
        })?;

        log::debug!(
            "Spawned pid {} for {:?} with a {}s limit",
            child.id(),
            self.request.command(),
            self.request.time_limit().as_secs()
        );

        Ok(Invocation {
            request: self.request,
            settings: self.settings,
            signals: self.signals,
            state: Running { child, started },
        })
    }
}

impl Invocation<Running> {
    pub fn pid(&self) -> u32 {
        self.state.child.id()
    }

    pub fn elapsed(&self) -> Duration {
        self.state.started.elapsed()
    }

    /// Wait for the child, bounded by the wall-clock limit.
    ///
    /// The only suspension point of the runner. On timeout the child (and
    /// its process group, when enabled) is SIGKILLed and reaped before
    /// returning.
    pub fn wait(mut self) -> Result<InvocationOutcome> {
        // A limit too large for `Instant` has no reachable deadline.
        let deadline = self.state.started.checked_add(self.request.time_limit());
        let poll_interval = self.settings.poll_interval();

        loop {
            match self.state.child.try_wait() {
                Ok(Some(status)) => {
                    let outcome = InvocationOutcome::Completed {
                        exit_code: exit_code_of(status),
                    };
                    log::debug!(
                        "pid {} finished after {:?}: {:?}",
                        self.pid(),
                        self.elapsed(),
                        outcome
                    );
                    return Ok(outcome);
                }
                Ok(None) => {}
                Err(e) => {
                    self.terminate();
                    return Err(RunnerError::Wait(e.to_string()));
                }
            }

            if let Some(signal) = self.signals.as_ref().and_then(|s| s.received()) {
                log::warn!("Received signal {}, killing pid {}", signal, self.pid());
                self.terminate();
                return Err(RunnerError::Interrupted { signal });
            }

            let now = Instant::now();
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(now),
                None => poll_interval,
            };
            if deadline.is_some() && remaining.is_zero() {
                log::info!(
                    "pid {} exceeded the {}s time limit",
                    self.pid(),
                    self.request.time_limit().as_secs()
                );
                self.terminate();
                return Ok(InvocationOutcome::TimedOut);
            }

            thread::sleep(poll_interval.min(remaining));
        }
    }

    /// SIGKILL the child (or its whole group) and reap it. No grace period.
    fn terminate(&mut self) {
        let pid = self.pid();

        if self.settings.kill_process_group {
            match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
                Ok(()) | Err(Errno::ESRCH) => {}
                Err(e) => {
                    log::warn!("killpg({}) failed: {}, killing child only", pid, e);
                    let _ = self.state.child.kill();
                }
            }
        } else if let Err(e) = self.state.child.kill() {
            log::debug!("kill({}) failed: {}", pid, e);
        }

        if let Err(e) = self.state.child.wait() {
            log::warn!("Failed to reap pid {}: {}", pid, e);
        }
    }
}

/// Exit code for a finished child; signal deaths map to 128 + signal.
fn exit_code_of(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => signal_exit_code(signal),
        (None, None) => 1,
    }
}

/// One-shot runner: spawn, wait, report.
pub struct BoundedRunner {
    settings: RunnerSettings,
    signals: Option<TerminationSignals>,
}

impl BoundedRunner {
    pub fn new(settings: RunnerSettings) -> Self {
        Self {
            settings,
            signals: None,
        }
    }

    pub fn with_signals(mut self, signals: TerminationSignals) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn run(&self, request: InvocationRequest) -> Result<InvocationOutcome> {
        let mut invocation = Invocation::new(request, self.settings.clone());
        if let Some(signals) = self.signals {
            invocation = invocation.watch_signals(signals);
        }
        invocation.spawn()?.wait()
    }
}

impl Default for BoundedRunner {
    fn default() -> Self {
        Self::new(RunnerSettings::default())
    }
}
