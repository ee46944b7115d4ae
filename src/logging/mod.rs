//! Logging infrastructure - structured tracing across the boundary
//!
//! Design: `tracing` events for every foreign query, release, cache
//! transition and trampoline failure:
//! - Zero-cost when disabled
//! - Configurable level, format and destination
//! - Non-blocking writer through `tracing-appender`

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, trace, warn, Level};

use crate::abi::{Guid, HResult};

/// Set once the subscriber is installed; holds the writer guard so buffered
/// lines are flushed at process exit
static LOGGER: OnceCell<Option<Mutex<WorkerGuard>>> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, multi-line
    Pretty,
    /// Single line per event
    Compact,
    /// JSON object per event
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Single file, never rotated
    File(PathBuf),
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span enter/exit events
    pub span_events: bool,
    /// Extra filter directives (e.g. "vtbridge::cache=trace")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `VTBRIDGE_LOG_*` variables on top of this config
    pub fn with_env_overrides(mut self) -> Self {
        // VTBRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("VTBRIDGE_LOG_LEVEL") {
            self.level = parse_level(&level).unwrap_or(self.level);
        }

        // VTBRIDGE_LOG_FILE: path to log file
        if let Ok(path) = std::env::var("VTBRIDGE_LOG_FILE") {
            self.output = LogOutput::File(PathBuf::from(path));
        }

        if std::env::var("VTBRIDGE_LOG_JSON").is_ok() {
            self.format = LogFormat::Json;
        }

        if std::env::var("VTBRIDGE_LOG_SPANS").is_ok() {
            self.span_events = true;
        }

        self
    }

    /// Errors only, no span events
    pub fn quiet() -> Self {
        Self {
            level: Level::ERROR,
            ..Self::default()
        }
    }

    /// Everything, including span events
    pub fn verbose() -> Self {
        Self {
            level: Level::TRACE,
            format: LogFormat::Pretty,
            span_events: true,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Case-insensitive level name
pub fn parse_level(name: &str) -> Option<Level> {
    name.trim().parse().ok()
}

/// Initialize logging from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration
///
/// Only the first call installs a subscriber. If another subscriber is
/// already set globally, that one stays in place.
pub fn init_with_config(config: LogConfig) {
    LOGGER.get_or_init(|| {
        let filter = build_filter(&config);

        let (writer, guard) = match &config.output {
            LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
            LogOutput::File(path) => {
                let directory = path
                    .parent()
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("."));
                let file_name = path
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("vtbridge.log"));
                tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name))
            }
        };

        let base = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events_config(config.span_events))
            .with_target(true)
            .with_thread_ids(cfg!(debug_assertions));

        let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Compact => base.compact().boxed(),
            LogFormat::Json => base.json().boxed(),
        };

        match tracing_subscriber::registry()
            .with(layer.with_filter(filter))
            .try_init()
        {
            Ok(()) => Some(Mutex::new(guard)),
            // Someone else owns the global subscriber
            Err(_) => None,
        }
    });
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER.get().is_some()
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("vtbridge={}", config.level.as_str().to_lowercase()))
    });

    match &config.filter {
        Some(directives) => directives
            .split(',')
            .map(str::trim)
            .filter(|directive| !directive.is_empty())
            .fold(base, |filter, directive| match directive.parse() {
                Ok(parsed) => filter.add_directive(parsed),
                Err(_) => {
                    warn!(directive, "invalid filter directive ignored");
                    filter
                }
            }),
        None => base,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

// ============================================================================
// Interop-specific logging functions
// ============================================================================

/// Log a foreign QueryInterface call and its outcome
#[inline]
pub fn log_query_interface(instance: *mut core::ffi::c_void, iid: &Guid, status: HResult) {
    trace!(
        event = "query_interface",
        instance = ?instance,
        iid = %iid,
        status = %status,
        "queried foreign interface"
    );
}

/// Log a foreign Release call
#[inline]
pub fn log_release(instance: *mut core::ffi::c_void, remaining: u32) {
    trace!(
        event = "release",
        instance = ?instance,
        remaining,
        "released foreign reference"
    );
}

#[inline]
pub fn log_cache_hit(interface: &str) {
    trace!(event = "cache_hit", interface, "vtable cache hit");
}

#[inline]
pub fn log_cache_miss(interface: &str) {
    debug!(event = "cache_miss", interface, "vtable cache miss");
}

/// Log a lost insert race; the fresh reference was handed back
pub fn log_race_lost(interface: &str, released: *mut core::ffi::c_void) {
    debug!(
        event = "race_lost",
        interface,
        instance = ?released,
        "concurrent lookup won, fresh reference released"
    );
}

pub fn log_vtable_populated(interface: &str, slots: usize) {
    debug!(
        event = "vtable_populated",
        interface,
        slots,
        "static vtable populated"
    );
}

/// Log a local failure converted to a status code
pub fn log_trampoline_failure(interface: &str, status: HResult, error: &dyn std::fmt::Display) {
    warn!(
        event = "trampoline_failure",
        interface,
        status = %status,
        error = %error,
        "local call failed, status returned to foreign caller"
    );
}

pub fn log_final_release(identity: *mut core::ffi::c_void, cached: usize) {
    debug!(
        event = "final_release",
        identity = ?identity,
        cached_entries = cached,
        "foreign object released"
    );
}

pub fn log_object_exposed(identity: *mut core::ffi::c_void, interfaces: usize) {
    debug!(
        event = "object_exposed",
        identity = ?identity,
        interfaces,
        "local object exposed to foreign callers"
    );
}

pub fn log_object_destroyed(identity: *mut core::ffi::c_void) {
    debug!(
        event = "object_destroyed",
        identity = ?identity,
        "exposed object destroyed"
    );
}
