use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tracing::{debug, info};

use super::command::{self, CommandTemplate};
use super::report::JobReport;
use super::{Dispatch, DispatchError, DispatchJob};
use crate::config::CommandConfig;

/// Bounded worker pool running one external command per job.
///
/// `dispatch` only enqueues; a background loop pulls jobs in submission order
/// and starts each on its own task once one of `workers` permits is free.
#[derive(Clone)]
pub struct CommandDispatcher {
    sender: mpsc::Sender<DispatchJob>,
}

impl CommandDispatcher {
    /// Spawns the worker loop on the current runtime. Every finished job is
    /// reported on the returned receiver.
    pub fn start(
        template: CommandTemplate,
        workers: usize,
        queue_capacity: usize,
    ) -> (Self, mpsc::UnboundedReceiver<JobReport>) {
        let (sender, jobs) = mpsc::channel(queue_capacity.max(1));
        let (reports, report_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_workers(
            Arc::new(template),
            Arc::new(Semaphore::new(workers.max(1))),
            jobs,
            reports,
        ));

        (Self { sender }, report_rx)
    }

    pub fn from_config(config: &CommandConfig) -> (Self, mpsc::UnboundedReceiver<JobReport>) {
        Self::start(
            CommandTemplate::from_config(config),
            config.workers,
            config.queue_capacity,
        )
    }
}

impl Dispatch for CommandDispatcher {
    fn dispatch(&self, job: DispatchJob) -> Result<(), DispatchError> {
        self.sender.try_send(job).map_err(|err| match err {
            TrySendError::Full(job) => DispatchError::QueueFull {
                phone_number: job.phone_number,
            },
            TrySendError::Closed(job) => DispatchError::Closed {
                phone_number: job.phone_number,
            },
        })
    }
}

async fn run_workers(
    template: Arc<CommandTemplate>,
    semaphore: Arc<Semaphore>,
    mut jobs: mpsc::Receiver<DispatchJob>,
    reports: mpsc::UnboundedSender<JobReport>,
) {
    while let Some(job) = jobs.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };

        let template = template.clone();
        let reports = reports.clone();
        tokio::spawn(async move {
            let report = execute(&template, job).await;
            drop(permit);
            // Nobody listening just means outcomes go unlogged.
            let _ = reports.send(report);
        });
    }
    debug!("dispatch queue closed, worker loop exiting");
}

async fn execute(template: &CommandTemplate, job: DispatchJob) -> JobReport {
    let argv = template.argv(&job);
    info!(
        alert = %job.alert_name,
        phone_number = %job.phone_number,
        "Running command for alert '{}' (Number: {}): {:?}",
        job.alert_name,
        job.phone_number,
        argv
    );

    let started = Instant::now();
    let outcome = command::run(&argv).await;

    JobReport {
        job,
        argv,
        outcome,
        elapsed: started.elapsed(),
    }
}
