/// Runner settings loaded from an optional JSON file
use crate::config::types::{Result, RunnerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a settings file when `--config` is absent
pub const CONFIG_ENV_VAR: &str = "RUNLIMIT_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerSettings {
    /// How often the parent polls the child while waiting for the deadline
    pub poll_interval_ms: u64,
    /// Run the child in its own process group and kill the whole group on timeout
    pub kill_process_group: bool,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5,
            kill_process_group: true,
        }
    }
}

impl RunnerSettings {
    /// Load settings from `path`, else from `$RUNLIMIT_CONFIG`, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV_VAR)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        };

        match path {
            Some(p) => Self::from_file(&p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RunnerError::Config(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;
        let settings = Self::from_json(&content).map_err(|e| match e {
            RunnerError::Config(msg) => {
                RunnerError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        log::debug!("Loaded runner settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(content)
            .map_err(|e| RunnerError::Config(format!("Invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.poll_interval_ms) {
            return Err(RunnerError::Config(format!(
                "poll_interval_ms must be between 1 and 1000, got {}",
                self.poll_interval_ms
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
