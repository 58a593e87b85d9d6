use crate::config::settings::RunnerSettings;
use crate::config::types::{InvocationRequest, ResourceCeilings};
use crate::exec::BoundedRunner;
use crate::kernel::signal::TerminationSignals;
use crate::verdict::{timeout_message, InvocationOutcome};
use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Run a command under a wall-clock time limit.
///
/// Exits with the command's own exit status, or 124 when the time limit
/// was exceeded.
#[derive(Parser, Debug)]
#[command(
    name = "runlimit",
    author,
    version,
    about,
    allow_negative_numbers = true,
    override_usage = "runlimit [OPTIONS] <TIME_LIMIT> -- <COMMAND>...\n       \
                      runlimit [OPTIONS] <TIME_LIMIT> <MAX_NUM_PROCESSES> <MAX_STACK_SIZE> <MAX_VIRTUAL_MEMORY> -- <COMMAND>..."
)]
pub struct Cli {
    /// Runner settings file (JSON); defaults to $RUNLIMIT_CONFIG
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write the outcome as JSON to this file after the run
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Wall-clock time limit in seconds
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    time_limit: u64,

    /// Max process count, max stack size (bytes) and max virtual memory (bytes)
    #[arg(value_name = "CEILINGS", num_args = 1..=3)]
    ceilings: Vec<u64>,

    /// Command and arguments, passed through verbatim
    #[arg(last = true, required = true, value_name = "COMMAND")]
    command: Vec<String>,
}

impl Cli {
    /// Parse and validate launch arguments. Errors carry clap's usage text.
    pub fn try_parse_args<I, T>(args: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let cli = Self::try_parse_from(args)?;
        cli.validate()?;
        Ok(cli)
    }

    // Mirrors the checks in `InvocationRequest::new` so violations exit as
    // clap usage errors (status 2) instead of runtime errors.
    fn validate(&self) -> std::result::Result<(), clap::Error> {
        let mut cmd = Self::command();
        match self.ceilings.len() {
            0 | 3 => {}
            n => {
                return Err(cmd.error(
                    ErrorKind::WrongNumberOfValues,
                    format!(
                        "expected either no resource ceilings or all three \
                         (max_num_processes, max_stack_size, max_virtual_memory), got {}",
                        n
                    ),
                ))
            }
        }
        if self.ceilings.first() == Some(&0) {
            return Err(cmd.error(
                ErrorKind::ValueValidation,
                "max_num_processes must be a positive integer",
            ));
        }
        if self.command.first().map_or(true, |p| p.is_empty()) {
            return Err(cmd.error(ErrorKind::MissingRequiredArgument, "no command given"));
        }
        Ok(())
    }

    pub fn ceilings(&self) -> ResourceCeilings {
        match self.ceilings.as_slice() {
            &[processes, stack, vmem] => ResourceCeilings::new(processes, stack, vmem),
            _ => ResourceCeilings::default(),
        }
    }

    pub fn request(&self) -> crate::config::types::Result<InvocationRequest> {
        InvocationRequest::new(self.time_limit, self.ceilings(), self.command.clone())
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config.as_deref()
    }

    pub fn report_path(&self) -> Option<&Path> {
        self.report.as_deref()
    }
}

fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("warn");
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn write_report(path: &Path, outcome: &InvocationOutcome) -> Result<()> {
    let json = serde_json::to_string_pretty(outcome)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}

/// Parse the process arguments, run the command, and return the exit status
/// this process should exit with. Malformed invocations exit through clap
/// before anything is spawned.
pub fn run() -> Result<i32> {
    init_logging();

    let cli = Cli::try_parse_args(std::env::args_os()).unwrap_or_else(|e| e.exit());

    let settings =
        RunnerSettings::load(cli.config_path()).context("Failed to load runner settings")?;
    let request = cli.request()?;
    let time_limit = request.time_limit();

    let signals = TerminationSignals::install()?;
    let runner = BoundedRunner::new(settings).with_signals(signals);

    let outcome = match runner.run(request) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("runlimit: {}", e);
            return Ok(e.exit_code());
        }
    };

    if outcome.timed_out() {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", timeout_message(time_limit))?;
        stdout.flush()?;
    }

    if let Some(path) = cli.report_path() {
        if let Err(e) = write_report(path, &outcome) {
            log::error!("{:#}", e);
        }
    }

    Ok(outcome.exit_code())
}
