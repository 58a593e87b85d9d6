pub mod outcome;

pub use outcome::{signal_exit_code, timeout_message, InvocationOutcome, TIMEOUT_EXIT_CODE};
