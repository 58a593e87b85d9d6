//! Spawning and supervising the bounded child process.

pub mod runner;

pub use runner::{BoundedRunner, Invocation, NotStarted, Running};
