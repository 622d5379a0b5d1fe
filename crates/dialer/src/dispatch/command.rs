use std::io;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::Command;
use tracing::warn;

use super::{ArgField, DispatchJob};
use crate::config::CommandConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command '{program}' not found, make sure it is in the system PATH")]
    NotFound { program: String },
    #[error("failed to execute '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("command line is empty")]
    EmptyCommand,
}

/// Base command tokens plus the ordering of per-job arguments.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    base: Vec<String>,
    args_order: Vec<String>,
}

impl CommandTemplate {
    pub fn new(base: Vec<String>, args_order: Vec<String>) -> Self {
        Self { base, args_order }
    }

    pub fn from_config(config: &CommandConfig) -> Self {
        Self::new(config.base.clone(), config.args_order.clone())
    }

    pub fn program(&self) -> Option<&str> {
        self.base.first().map(String::as_str)
    }

    /// Builds the argument vector for one job. Unknown argument names are
    /// logged and left out.
    pub fn argv(&self, job: &DispatchJob) -> Vec<String> {
        let mut argv = self.base.clone();
        for name in &self.args_order {
            match ArgField::from_name(name) {
                Some(field) => argv.push(job.field(field).to_string()),
                None => warn!(
                    alert = %job.alert_name,
                    "Configured argument key '{}' not found in available data for alert '{}'. Skipping.",
                    name,
                    job.alert_name
                ),
            }
        }
        argv
    }
}

/// Runs `argv[0]` with the remaining entries as discrete arguments. No shell
/// is involved, so nothing in the arguments is interpreted.
pub async fn run(argv: &[String]) -> Result<CommandOutput, CommandError> {
    let (program, args) = argv.split_first().ok_or(CommandError::EmptyCommand)?;

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => CommandError::NotFound {
                program: program.clone(),
            },
            _ => CommandError::Spawn {
                program: program.clone(),
                source,
            },
        })?;

    Ok(CommandOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
