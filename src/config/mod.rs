//! Invocation requests, runner settings and the shared error type.

pub mod settings;
pub mod types;

pub use settings::RunnerSettings;
pub use types::{InvocationRequest, ResourceCeilings, Result, RunnerError};
