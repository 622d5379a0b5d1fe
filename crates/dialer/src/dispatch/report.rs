use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::command::{CommandError, CommandOutput};
use super::DispatchJob;
use crate::metrics;

/// Outcome of one executed job.
#[derive(Debug)]
pub struct JobReport {
    pub job: DispatchJob,
    pub argv: Vec<String>,
    pub outcome: Result<CommandOutput, CommandError>,
    pub elapsed: Duration,
}

impl JobReport {
    /// Label used for the commands counter.
    pub fn outcome_label(&self) -> &'static str {
        match &self.outcome {
            Ok(output) if output.success() => "success",
            Ok(_) => "nonzero_exit",
            Err(CommandError::NotFound { .. }) => "not_found",
            Err(_) => "error",
        }
    }

    pub fn log(&self) {
        let job = &self.job;
        match &self.outcome {
            Ok(output) => {
                let exit_code = output
                    .exit_code
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "none (terminated by signal)".to_string());
                info!(
                    alert = %job.alert_name,
                    phone_number = %job.phone_number,
                    elapsed_ms = self.elapsed.as_millis() as u64,
                    "Command for alert '{}' (Number: {}) finished with exit code: {}",
                    job.alert_name,
                    job.phone_number,
                    exit_code
                );
                if !output.stdout.is_empty() {
                    info!("Command stdout:\n{}", output.stdout.trim());
                }
                if !output.stderr.is_empty() {
                    warn!("Command stderr:\n{}", output.stderr.trim());
                }
            }
            Err(err @ CommandError::NotFound { .. }) => {
                error!(
                    alert = %job.alert_name,
                    "Error running command for alert '{}': {}",
                    job.alert_name,
                    err
                );
            }
            Err(err) => {
                error!(
                    alert = %job.alert_name,
                    phone_number = %job.phone_number,
                    "Error executing command for alert '{}' (Number: {}): {}",
                    job.alert_name,
                    job.phone_number,
                    err
                );
            }
        }
    }
}

/// Drains the report channel, logging each outcome, until every sender is gone.
pub async fn log_reports(mut reports: mpsc::UnboundedReceiver<JobReport>) {
    while let Some(report) = reports.recv().await {
        metrics::COMMANDS_TOTAL
            .with_label_values(&[report.outcome_label()])
            .inc();
        report.log();
    }
}
