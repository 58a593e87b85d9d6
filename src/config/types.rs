/// Core types shared by the runner: the invocation request and its errors
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Optional OS resource ceilings applied to the child before it execs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCeilings {
    /// Maximum number of processes for the child's user (RLIMIT_NPROC)
    pub max_num_processes: Option<u64>,
    /// Maximum stack size in bytes (RLIMIT_STACK)
    pub max_stack_size: Option<u64>,
    /// Maximum virtual memory in bytes (RLIMIT_VMEM, falling back to RLIMIT_AS)
    pub max_virtual_memory: Option<u64>,
}

impl ResourceCeilings {
    pub fn new(max_num_processes: u64, max_stack_size: u64, max_virtual_memory: u64) -> Self {
        Self {
            max_num_processes: Some(max_num_processes),
            max_stack_size: Some(max_stack_size),
            max_virtual_memory: Some(max_virtual_memory),
        }
    }

    /// True when no ceiling is configured
    pub fn is_empty(&self) -> bool {
        self.max_num_processes.is_none()
            && self.max_stack_size.is_none()
            && self.max_virtual_memory.is_none()
    }
}

/// A single request to run `command` under `time_limit`.
///
/// Constructed through [`InvocationRequest::new`], which rejects an empty
/// command, a zero time limit and a zero process ceiling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvocationRequest {
    time_limit: Duration,
    ceilings: ResourceCeilings,
    command: Vec<String>,
}

impl InvocationRequest {
    pub fn new(
        time_limit_secs: u64,
        ceilings: ResourceCeilings,
        command: Vec<String>,
    ) -> Result<Self> {
        if time_limit_secs == 0 {
            return Err(RunnerError::Config(
                "time limit must be a positive number of seconds".to_string(),
            ));
        }
        if command.is_empty() {
            return Err(RunnerError::Config("Empty command provided".to_string()));
        }
        if command[0].is_empty() {
            return Err(RunnerError::Config("Program name is empty".to_string()));
        }
        if ceilings.max_num_processes == Some(0) {
            return Err(RunnerError::Config(
                "max_num_processes must be positive".to_string(),
            ));
        }

        Ok(Self {
            time_limit: Duration::from_secs(time_limit_secs),
            ceilings,
            command,
        })
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub fn ceilings(&self) -> &ResourceCeilings {
        &self.ceilings
    }

    /// Program path followed by its arguments
    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn program(&self) -> &str {
        &self.command[0]
    }

    pub fn args(&self) -> &[String] {
        &self.command[1..]
    }
}

/// Error types for the runner
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process monitoring error: {0}")]
    Wait(String),

    #[error("Signal error: {0}")]
    Signal(String),

    #[error("Interrupted by signal {signal}")]
    Interrupted { signal: i32 },
}

impl RunnerError {
    /// Exit status the CLI reports for this error.
    ///
    /// Follows timeout(1): 127 when the program cannot be found, 126 when it
    /// was found but could not be executed, 128 + signal when the runner was
    /// interrupted, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted { signal } => 128 + signal,
            Self::Spawn { source, .. } => match source.kind() {
                std::io::ErrorKind::NotFound => 127,
                _ => 126,
            },
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
