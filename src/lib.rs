//! runlimit: run a command under a wall-clock time limit and rlimit ceilings
//!
//! The grading sandbox invokes `runlimit` in front of every student command.
//! Its contract is the exit status: the child's own code when it finishes in
//! time, 124 when the deadline passed and the child was killed.
//!
//! # Architecture
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Invocation requests, resource ceilings, error type
//! - [`config::settings`]: Optional JSON runner settings
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::rlimit`]: Ordered rlimit plans applied between fork and exec
//! - [`kernel::signal`]: Async-safe termination signal tracking
//!
//! ## Execution Control ([`exec`])
//! - [`exec::runner`]: Type-state spawn/wait with deadline enforcement
//!
//! ## Verdict ([`verdict`])
//! - [`verdict::outcome`]: Completed/TimedOut outcomes and the exit-code contract
//!
//! ## CLI ([`cli`])
//! - Argument parsing for the basic and extended invocation forms

// Configuration
pub mod config;

// Kernel Primitives
pub mod kernel;

// Execution Control
pub mod exec;

// Verdict
pub mod verdict;

// CLI entrypoint wiring
pub mod cli;

pub use config::{InvocationRequest, ResourceCeilings, Result, RunnerError, RunnerSettings};
pub use exec::BoundedRunner;
pub use verdict::{InvocationOutcome, TIMEOUT_EXIT_CODE};
