//! Log sinks
//!
//! Two append-only files: the webhook log for everything the service does, and
//! the access log for one line per HTTP request (also mirrored to stdout).
//! Access lines are ordinary `tracing` events on the [`ACCESS_TARGET`] target.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::{filter_fn, FilterExt, LevelFilter};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields, MakeWriter};
use tracing_subscriber::layer::Filter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{Error, Result};

/// Target of access-log events.
pub const ACCESS_TARGET: &str = "access";

/// `2026-10-19 08:15:02,417` in local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timestamp;

impl FormatTime for Timestamp {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%d %H:%M:%S,%3f"))
    }
}

/// `timestamp - LEVEL - span{fields}: message` for the webhook log,
/// `timestamp - message` for the access log.
#[derive(Debug, Clone, Copy)]
pub struct LineFormat {
    level: bool,
}

impl LineFormat {
    pub fn webhook() -> Self {
        Self { level: true }
    }

    pub fn access() -> Self {
        Self { level: false }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        Timestamp.format_time(&mut writer)?;
        write!(writer, " - ")?;

        if self.level {
            write!(writer, "{} - ", event.metadata().level())?;
            if let Some(scope) = ctx.event_scope() {
                for span in scope.from_root() {
                    write!(writer, "{}", span.name())?;
                    let extensions = span.extensions();
                    if let Some(fields) = extensions.get::<FormattedFields<N>>() {
                        if !fields.is_empty() {
                            write!(writer, "{{{}}}", fields)?;
                        }
                    }
                    write!(writer, ": ")?;
                }
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Builds the service subscriber over arbitrary writers.
///
/// `filter` applies to the webhook log only; access lines are always written
/// at `info`. Writers receive each formatted line in a single write, so a
/// `Mutex<File>` never interleaves partial lines from concurrent jobs.
pub fn build_subscriber<W, A>(
    webhook: W,
    access: A,
    mirror_access_to_stdout: bool,
    filter: EnvFilter,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    A: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let webhook_layer = tracing_subscriber::fmt::layer()
        .with_writer(webhook)
        .with_ansi(false)
        .event_format(LineFormat::webhook())
        .with_filter(filter_fn(|meta| meta.target() != ACCESS_TARGET).and(filter));

    let access_layer = tracing_subscriber::fmt::layer()
        .with_writer(access)
        .with_ansi(false)
        .event_format(LineFormat::access())
        .with_filter(access_filter());

    let console_layer = mirror_access_to_stdout.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .event_format(LineFormat::access())
            .with_filter(access_filter())
    });

    tracing_subscriber::registry()
        .with(webhook_layer)
        .with(access_layer)
        .with(console_layer)
}

fn access_filter<S>() -> impl Filter<S> {
    filter_fn(|meta| meta.target() == ACCESS_TARGET).and(LevelFilter::INFO)
}

/// Opens both log files and installs the subscriber for the whole process.
/// `RUST_LOG` overrides the default `info` level of the webhook log.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let webhook = Mutex::new(open_append(&config.webhook_log)?);
    let access = Mutex::new(open_append(&config.access_log)?);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing::subscriber::set_global_default(build_subscriber(webhook, access, true, filter))
        .map_err(|e| Error::Internal(format!("failed to install log subscriber: {}", e)))
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::Config(format!("cannot open log file {}: {}", path.display(), e)))
}

/// In-memory log sink for tests.
#[cfg(test)]
pub(crate) mod capture {
    use std::io;
    use std::sync::{Arc, Mutex};

    use tracing::Subscriber;
    use tracing_subscriber::EnvFilter;

    #[derive(Clone, Default)]
    pub(crate) struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        pub(crate) fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }

        pub(crate) fn lines(&self) -> Vec<String> {
            self.text().lines().map(str::to_string).collect()
        }

        /// Subscriber writing the webhook log here and dropping access lines.
        pub(crate) fn webhook_subscriber(&self) -> impl Subscriber + Send + Sync + 'static {
            let webhook = self.clone();
            super::build_subscriber(move || webhook.clone(), io::sink, false, EnvFilter::new("info"))
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
