use std::collections::HashSet;

use tracing::{info, warn};

use super::Alert;
use crate::config::{BlacklistConfig, BlacklistMatch};
use crate::dispatch::DispatchJob;
use crate::metrics;

/// Phone numbers that must never be dispatched to.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    entries: HashSet<String>,
    matching: BlacklistMatch,
}

impl Blacklist {
    pub fn new<I, S>(numbers: I, matching: BlacklistMatch) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = numbers
            .into_iter()
            .map(|number| Self::key(matching, number.as_ref().trim()))
            .filter(|key| !key.is_empty())
            .collect();
        Self { entries, matching }
    }

    pub fn from_config(config: &BlacklistConfig) -> Self {
        Self::new(&config.numbers, config.matching)
    }

    /// `number` is expected to be trimmed already.
    pub fn contains(&self, number: &str) -> bool {
        let key = Self::key(self.matching, number);
        !key.is_empty() && self.entries.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(matching: BlacklistMatch, number: &str) -> String {
        match matching {
            BlacklistMatch::Exact => number.to_string(),
            BlacklistMatch::Digits => number.chars().filter(char::is_ascii_digit).collect(),
        }
    }
}

/// Turns alerts into dispatch jobs, one per usable phone number.
#[derive(Debug, Clone, Default)]
pub struct AlertNormalizer {
    blacklist: Blacklist,
}

impl AlertNormalizer {
    pub fn new(blacklist: Blacklist) -> Self {
        Self { blacklist }
    }

    /// Jobs come out in phone-number order; repeated numbers give repeated
    /// jobs. Every reason for producing nothing is logged.
    pub fn normalize(&self, alert: &Alert) -> Vec<DispatchJob> {
        let (phone_numbers, message) = match (&alert.phone_numbers, &alert.message) {
            (Some(phone_numbers), Some(message)) => (phone_numbers, message),
            (phone_numbers, message) => {
                let mut missing = Vec::new();
                if phone_numbers.is_none() {
                    missing.push("phoneNumbers label");
                }
                if message.is_none() {
                    missing.push("message annotation");
                }
                info!(
                    alert = %alert.name,
                    "Alert '{}': Missing required fields: {}. Skipping command execution.",
                    alert.name,
                    missing.join(", ")
                );
                metrics::JOBS_SKIPPED_TOTAL
                    .with_label_values(&["missing_fields"])
                    .inc();
                return Vec::new();
            }
        };

        let candidates = phone_numbers.candidates();
        if candidates.is_empty() {
            warn!(
                alert = %alert.name,
                "Alert '{}': phoneNumbers label ({}) contains no phone numbers. Skipping command execution.",
                alert.name,
                phone_numbers.kind()
            );
            metrics::JOBS_SKIPPED_TOTAL.with_label_values(&["empty"]).inc();
            return Vec::new();
        }

        info!(
            alert = %alert.name,
            "Alert '{}': Found phoneNumbers (label: {:?}) and message (annotation).",
            alert.name,
            candidates
        );

        let mut jobs = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let number = candidate.trim();
            if number.is_empty() {
                warn!(
                    alert = %alert.name,
                    "Alert '{}': Skipping empty phone number entry.",
                    alert.name
                );
                metrics::JOBS_SKIPPED_TOTAL.with_label_values(&["empty"]).inc();
                continue;
            }
            if self.blacklist.contains(number) {
                info!(
                    alert = %alert.name,
                    "Alert '{}': Phone number {} is blacklisted. Skipping.",
                    alert.name,
                    number
                );
                metrics::JOBS_SKIPPED_TOTAL
                    .with_label_values(&["blacklisted"])
                    .inc();
                continue;
            }
            jobs.push(DispatchJob::new(number, message.as_str(), alert.name.as_str()));
        }
        jobs
    }
}
