//! OS primitives used around the child process: rlimits and signals.

pub mod rlimit;
pub mod signal;
