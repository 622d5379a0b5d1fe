use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::dispatch::ArgField;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BlacklistMatch {
    /// Trimmed value must equal a blacklist entry exactly.
    #[serde(rename = "exact")]
    Exact,
    /// Only ASCII digits of both sides are compared, so `+1 (555) 010` matches `1555010`.
    #[serde(rename = "digits")]
    Digits,
}

impl Default for BlacklistMatch {
    fn default() -> Self {
        BlacklistMatch::Exact
    }
}

impl FromStr for BlacklistMatch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "exact" => Ok(BlacklistMatch::Exact),
            "digits" => Ok(BlacklistMatch::Digits),
            other => Err(Error::Config(format!(
                "BLACKLIST_MATCH must be 'exact' or 'digits', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub command: CommandConfig,
    #[serde(default)]
    pub blacklist: BlacklistConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub webhook_log: PathBuf,
    pub access_log: PathBuf,
    pub log_json_body: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Program followed by its fixed leading arguments.
    pub base: Vec<String>,
    /// Names of the per-job values appended after `base`, in order.
    pub args_order: Vec<String>,
    pub workers: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlacklistConfig {
    pub numbers: Vec<String>,
    #[serde(default)]
    pub matching: BlacklistMatch,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::load`] but with an explicit dotenv file, which must exist.
    pub fn load_from(env_file: &Path) -> Result<Self> {
        dotenvy::from_path(env_file).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", env_file.display(), e))
        })?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let config = Config {
            server: ServerConfig {
                host: lookup("WEBHOOK_HOST").unwrap_or(defaults.server.host),
                port: parse_var(&lookup, "WEBHOOK_PORT")?.unwrap_or(defaults.server.port),
            },
            logging: LoggingConfig {
                webhook_log: lookup("WEBHOOK_LOG_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.logging.webhook_log),
                access_log: lookup("ACCESS_LOG_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.logging.access_log),
                log_json_body: match lookup("LOG_JSON_BODY") {
                    Some(raw) => parse_bool("LOG_JSON_BODY", &raw)?,
                    None => defaults.logging.log_json_body,
                },
            },
            command: CommandConfig {
                base: match lookup("SYSTEM_COMMAND") {
                    Some(raw) => parse_command(&raw)?,
                    None => defaults.command.base,
                },
                args_order: lookup("SYSTEM_COMMAND_ARGS_ORDER")
                    .map(|raw| parse_list(&raw))
                    .unwrap_or(defaults.command.args_order),
                workers: parse_var(&lookup, "COMMAND_WORKERS")?
                    .unwrap_or(defaults.command.workers),
                queue_capacity: parse_var(&lookup, "COMMAND_QUEUE_CAPACITY")?
                    .unwrap_or(defaults.command.queue_capacity),
            },
            blacklist: BlacklistConfig {
                numbers: lookup("PHONE_BLACKLIST")
                    .map(|raw| parse_list(&raw))
                    .unwrap_or_default(),
                matching: match lookup("BLACKLIST_MATCH") {
                    Some(raw) => raw.parse()?,
                    None => BlacklistMatch::default(),
                },
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.command.base.is_empty() {
            return Err(Error::Config(
                "SYSTEM_COMMAND must name at least a program".to_string(),
            ));
        }
        if self.command.workers == 0 {
            return Err(Error::Config(
                "COMMAND_WORKERS must be at least 1".to_string(),
            ));
        }
        if self.command.queue_capacity == 0 {
            return Err(Error::Config(
                "COMMAND_QUEUE_CAPACITY must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Argument names that will be skipped on every dispatch.
    pub fn unknown_argument_names(&self) -> Vec<&str> {
        self.command
            .args_order
            .iter()
            .map(String::as_str)
            .filter(|name| ArgField::from_name(name).is_none())
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5001,
            },
            logging: LoggingConfig {
                webhook_log: PathBuf::from("webhook.log"),
                access_log: PathBuf::from("access.log"),
                log_json_body: true,
            },
            command: CommandConfig {
                base: vec!["echo".to_string()],
                args_order: vec!["phoneNumbers".to_string(), "message".to_string()],
                workers: 10,
                queue_capacity: 1024,
            },
            blacklist: BlacklistConfig::default(),
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{} has invalid value '{}': {}", key, raw, e))),
        None => Ok(None),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{} must be a boolean, got '{}'",
            key, raw
        ))),
    }
}

/// Comma-separated values, trimmed, empties dropped.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// A JSON array of strings, or whitespace-separated tokens.
fn parse_command(raw: &str) -> Result<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        serde_json::from_str::<Vec<String>>(trimmed).map_err(|e| {
            Error::Config(format!("SYSTEM_COMMAND is not a JSON string array: {}", e))
        })
    } else {
        Ok(trimmed.split_whitespace().map(str::to_string).collect())
    }
}
