/// Outcome of a bounded invocation and its exit-code contract
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exit status reported when the time limit was exceeded (same as timeout(1))
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Terminal state of an invocation.
///
/// Resource-limit violations are not a separate state: they surface as the
/// child's own failure exit code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InvocationOutcome {
    /// Child exited before the deadline
    Completed { exit_code: i32 },
    /// Child was killed at the deadline
    TimedOut,
}

impl InvocationOutcome {
    /// Exit status the runner itself should exit with
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { exit_code } => *exit_code,
            Self::TimedOut => TIMEOUT_EXIT_CODE,
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Classify the exit status of a finished `runlimit` process.
    ///
    /// For consumers of the binary (the grading orchestrator) that only see
    /// its exit status; the runner itself never calls this.
    ///
    /// 124 is reserved: a child that genuinely exits with 124 is
    /// indistinguishable from a timeout at this boundary.
    pub fn from_exit_code(code: i32) -> Self {
        if code == TIMEOUT_EXIT_CODE {
            Self::TimedOut
        } else {
            Self::Completed { exit_code: code }
        }
    }
}

/// The single stdout line printed on timeout
pub fn timeout_message(limit: Duration) -> String {
    let secs = limit.as_secs();
    format!(
        "Time limit of {} second{} exceeded",
        secs,
        if secs == 1 { "" } else { "s" }
    )
}

/// Exit status for a child terminated by `signal`, shell convention
pub fn signal_exit_code(signal: i32) -> i32 {
    128 + signal
}
