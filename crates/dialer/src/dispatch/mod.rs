//! Command dispatch
//!
//! Turns dispatch jobs into external command invocations. Jobs are queued
//! without blocking the caller and executed on a bounded pool of workers;
//! outcomes come back on a report channel that is only consumed for logging.

pub mod command;
pub mod pool;
pub mod report;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use command::{CommandError, CommandOutput, CommandTemplate};
pub use pool::CommandDispatcher;
pub use report::{log_reports, JobReport};

/// One "notify this number with this message" unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchJob {
    pub phone_number: String,
    pub message: String,
    pub alert_name: String,
}

impl DispatchJob {
    pub fn new(
        phone_number: impl Into<String>,
        message: impl Into<String>,
        alert_name: impl Into<String>,
    ) -> Self {
        Self {
            phone_number: phone_number.into(),
            message: message.into(),
            alert_name: alert_name.into(),
        }
    }

    pub fn field(&self, field: ArgField) -> &str {
        match field {
            ArgField::PhoneNumbers => &self.phone_number,
            ArgField::Message => &self.message,
        }
    }
}

/// Per-job values that can be appended to the base command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgField {
    PhoneNumbers,
    Message,
}

impl ArgField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "phoneNumbers" => Some(ArgField::PhoneNumbers),
            "message" => Some(ArgField::Message),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch queue is full, dropping job for {phone_number}")]
    QueueFull { phone_number: String },
    #[error("dispatcher has shut down, dropping job for {phone_number}")]
    Closed { phone_number: String },
}

/// Hands jobs off for execution. Implementations must return immediately.
#[cfg_attr(test, mockall::automock)]
pub trait Dispatch: Send + Sync {
    fn dispatch(&self, job: DispatchJob) -> Result<(), DispatchError>;
}
