//! ---
//! oee_section: "01-core-functionality"
//! oee_subsection: "module"
//! oee_type: "source"
//! oee_scope: "code"
//! oee_description: "Tracing bootstrap: env-driven filter, stdout layer and rolling JSON file."
//! oee_version: "v0.1.0"
//! oee_owner: "tbd"
//! ---
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Simulator-specific filter override, consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "OEE_SIM_LOG";
const FALLBACK_DIRECTIVE: &str = "info";

/// Flush guards of the non-blocking writers; dropped only at process exit.
struct WriterGuards {
    _stdout: WorkerGuard,
    _file: WorkerGuard,
}

static GUARDS: OnceCell<WriterGuards> = OnceCell::new();

/// Stdout rendering of the daemon logs. The rolling file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Where the active filter directive came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOrigin {
    Simulator,
    RustLog,
    Fallback,
}

/// Pick the first non-empty directive: `OEE_SIM_LOG`, then `RUST_LOG`, then `info`.
fn select_directive(custom: Option<String>, rust_log: Option<String>) -> (String, FilterOrigin) {
    let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
    if let Some(directive) = non_empty(custom) {
        return (directive, FilterOrigin::Simulator);
    }
    if let Some(directive) = non_empty(rust_log) {
        return (directive, FilterOrigin::RustLog);
    }
    (FALLBACK_DIRECTIVE.to_owned(), FilterOrigin::Fallback)
}

/// Parse the directive, dropping back to `info` when it is malformed.
fn build_filter(directive: &str) -> (EnvFilter, Option<String>) {
    match EnvFilter::try_new(directive) {
        Ok(filter) => (filter, None),
        Err(err) => (EnvFilter::new(FALLBACK_DIRECTIVE), Some(err.to_string())),
    }
}

fn log_file_name(service_name: &str, config: &LoggingConfig) -> String {
    let stem = config.file_prefix.as_deref().unwrap_or(service_name);
    format!("{stem}.log")
}

/// Install the global subscriber for `service_name`.
///
/// Calling it twice is harmless: the second subscriber is ignored.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "unable to create log directory {}",
            config.directory.display()
        )
    })?;

    let appender = rolling::daily(&config.directory, log_file_name(service_name, config));
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let _ = GUARDS.set(WriterGuards {
        _stdout: stdout_guard,
        _file: file_guard,
    });

    let (directive, origin) = select_directive(
        std::env::var(LOG_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
    );
    let (filter, rejected) = build_filter(&directive);

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_json(config.format, stdout_writer.clone()))
        .with(stdout_pretty(config.format, stdout_writer))
        .with(
            fmt::layer()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_writer(file_writer),
        )
        .try_init()
        .is_ok();

    if let Some(reason) = rejected {
        warn!(%directive, ?origin, %reason, "invalid log directive, using {FALLBACK_DIRECTIVE}");
    }
    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        format = ?config.format,
        ?origin,
        installed,
        "tracing initialised"
    );
    Ok(())
}

fn stdout_json<S>(
    format: LogFormat,
    writer: NonBlocking,
) -> Option<impl tracing_subscriber::Layer<S>>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    (format == LogFormat::StructuredJson).then(|| {
        fmt::layer()
            .json()
            .with_target(false)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(writer)
    })
}

fn stdout_pretty<S>(
    format: LogFormat,
    writer: NonBlocking,
) -> Option<impl tracing_subscriber::Layer<S>>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    (format == LogFormat::Pretty).then(|| {
        fmt::layer()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(writer)
    })
}
