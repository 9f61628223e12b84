//! Structured logging for pvloadctl.
//!
//! Built on `tracing` + `tracing-subscriber`, following the teacher's
//! `StructuredLogger`/`LogContext` pattern so call sites attach a component
//! name (and optional station id) without repeating `tracing::info!(...)`
//! field boilerplate everywhere. Simplified relative to the teacher: no
//! live log broadcast/SSE layer, since the operator surface here publishes
//! tick summaries, not a log stream.

use std::path::Path;
use std::sync::Once;

use once_cell::sync::OnceCell;
use tracing::{debug, error, info, trace, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{LoadCtlError, Result};

static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static INIT_ONCE: Once = Once::new();
static INIT_ERROR: OnceCell<String> = OnceCell::new();

/// Initialize the global tracing subscriber from configuration. Safe to
/// call more than once; only the first call takes effect.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        let init_result = (|| -> Result<()> {
            let level = parse_log_level(&config.level)?;
            let filter = EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("pvloadctl={level}").into());

            match &config.file_path {
                Some(file_path) if !cfg!(test) => {
                    init_file_logging(file_path, filter, config.json)?;
                }
                _ => {
                    init_console_logging(filter, config.json);
                }
            }
            Ok(())
        })();

        if let Err(e) = init_result {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    if let Some(err) = INIT_ERROR.get() {
        return Err(LoadCtlError::config(err.clone()));
    }
    Ok(())
}

fn init_console_logging(filter: EnvFilter, json: bool) {
    let layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
    info!("logging initialized (console)");
}

fn init_file_logging(file_path: &str, filter: EnvFilter, json: bool) -> Result<()> {
    let path = Path::new(file_path);
    let dir = path.parent().unwrap_or(Path::new("."));
    let prefix = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("pvloadctl");

    let file_appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(dir)
        .map_err(|e| LoadCtlError::io(format!("failed to create log file appender: {e}")))?;

    let (non_blocking_appender, guard) = non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let layer = fmt::layer()
        .with_writer(non_blocking_appender)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.json())
            .init();
    } else {
        tracing_subscriber::registry().with(filter).with(layer).init();
    }
    info!("logging initialized (file: {})", file_path);
    Ok(())
}

fn parse_log_level(level_str: &str) -> Result<Level> {
    match level_str.to_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" => Ok(Level::WARN),
        "ERROR" => Ok(Level::ERROR),
        _ => Err(LoadCtlError::config(format!(
            "invalid log level: {level_str}"
        ))),
    }
}

/// Context attached to every message a `StructuredLogger` emits.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub station_id: Option<String>,
    pub extra_fields: std::collections::HashMap<String, String>,
}

impl LogContext {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            station_id: None,
            extra_fields: std::collections::HashMap::new(),
        }
    }

    pub fn with_station_id(mut self, station_id: String) -> Self {
        self.station_id = Some(station_id);
        self
    }

    pub fn with_field(mut self, key: &str, value: String) -> Self {
        self.extra_fields.insert(key.to_string(), value);
        self
    }
}

/// Structured logger carrying a fixed context across all calls.
#[derive(Clone)]
pub struct StructuredLogger {
    context: LogContext,
}

impl StructuredLogger {
    pub fn new(context: LogContext) -> Self {
        Self { context }
    }

    pub fn info(&self, message: &str) {
        let fields = self.format_fields();
        info!(%fields, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        let fields = self.format_fields();
        warn!(%fields, "{}", message);
    }

    pub fn error(&self, message: &str) {
        let fields = self.format_fields();
        error!(%fields, "{}", message);
    }

    pub fn debug(&self, message: &str) {
        let fields = self.format_fields();
        debug!(%fields, "{}", message);
    }

    pub fn trace(&self, message: &str) {
        let fields = self.format_fields();
        trace!(%fields, "{}", message);
    }

    fn format_fields(&self) -> String {
        let mut fields = vec![format!("component={}", self.context.component)];
        if let Some(ref station_id) = self.context.station_id {
            fields.push(format!("station_id={station_id}"));
        }
        for (key, value) in &self.context.extra_fields {
            fields.push(format!("{key}={value}"));
        }
        fields.join(",")
    }
}

/// Create a logger for a specific component.
pub fn get_logger(component: &str) -> StructuredLogger {
    StructuredLogger::new(LogContext::new(component))
}

/// Create a logger with full context.
pub fn get_logger_with_context(context: LogContext) -> StructuredLogger {
    StructuredLogger::new(context)
}
