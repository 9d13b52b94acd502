//! JSONL and pretty tracing setup for Weft mesh processes
//!
//! Console output is JSONL by default, or pretty for interactive runs.
//! File output always writes JSONL through a non-blocking appender.
//! Levels can be raised per mesh component, e.g. handshake tracing
//! without drowning in sequencer noise.
//!
//! Every coordinator runs its worker inside a `mesh` span carrying its
//! instance name, so JSONL lines from several coordinators in one process
//! can be told apart by their `span.name` field.
//!
//! ```ignore
//! use weft_logging::{LogConfig, WeftSubscriberBuilder};
//!
//! let _guard = WeftSubscriberBuilder::new()
//!     .with_config(LogConfig::interactive().trace_handshakes())
//!     .init();
//! ```

pub mod config;

pub use config::{ConsoleFormat, FileConfig, LogConfig, MeshComponent, RotationStrategy};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors from subscriber initialization
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid filter directives: {0}")]
    Filter(String),

    #[error("Log file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log appender error: {0}")]
    Appender(String),

    #[error("Global subscriber already set: {0}")]
    AlreadySet(String),
}

/// Builder for configuring and initializing the global tracing subscriber
pub struct WeftSubscriberBuilder {
    config: LogConfig,
}

impl WeftSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the base log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Set the console format
    pub fn with_console(mut self, format: ConsoleFormat) -> Self {
        self.config.console = format;
        self
    }

    /// Set the level of one mesh component
    pub fn with_component(mut self, component: MeshComponent, level: impl Into<String>) -> Self {
        self.config = self.config.with_component(component, level);
        self
    }

    /// Also write JSONL to files
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// Install the subscriber globally
    ///
    /// The returned guard flushes file output when dropped; keep it alive
    /// for the lifetime of the program.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.config.directives())
                .map_err(|e| LogError::Filter(e.to_string()))?,
        };

        let (file_writer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = file_writer(file_config)?;
                (Some(writer), Some(guard))
            }
            None => (None, None),
        };

        let pretty_layer = (self.config.console == ConsoleFormat::Pretty)
            .then(|| fmt::layer().with_ansi(self.config.ansi).with_target(true));

        let json_layer = (self.config.console == ConsoleFormat::Json).then(|| {
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
        });

        let file_layer = file_writer.map(|writer| {
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_current_span(true)
                .with_span_list(true)
                .flatten_event(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(writer)
        });

        Registry::default()
            .with(filter)
            .with(pretty_layer)
            .with(json_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| LogError::AlreadySet(e.to_string()))?;

        Ok(guard)
    }

    /// Install the subscriber globally, reporting failures on stderr
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: failed to initialize logging: {}", e);
                None
            }
        }
    }
}

impl Default for WeftSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the non-blocking writer for file output
///
/// `Never` truncates a single `<prefix>.log`; the rotating strategies
/// append to dated files.
fn file_writer(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            return Ok(tracing_appender::non_blocking(File::create(path)?));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .build(&config.directory)
        .map_err(|e| LogError::Appender(e.to_string()))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize quiet logging for tests; repeat calls are no-ops
pub fn init_testing() {
    let _ = WeftSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_to_json() {
        let builder = WeftSubscriberBuilder::new();
        assert_eq!(builder.config.level, "info");
        assert_eq!(builder.config.console, ConsoleFormat::Json);
    }

    #[test]
    fn test_builder_setters() {
        let builder = WeftSubscriberBuilder::new()
            .with_level("warn")
            .with_console(ConsoleFormat::Off)
            .with_component(MeshComponent::Handshake, "trace")
            .with_file_output(FileConfig::for_mesh("logs", "lobby"));
        assert_eq!(builder.config.console, ConsoleFormat::Off);
        assert_eq!(
            builder.config.directives(),
            "warn,weft_coordinator::handshake=trace"
        );
        assert_eq!(builder.config.file.unwrap().prefix, "lobby");
    }

    #[test]
    fn test_file_writer_never_creates_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig {
            directory: dir.path().join("nested"),
            prefix: "mesh".to_string(),
            rotation: RotationStrategy::Never,
        };

        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(dir.path().join("nested").join("mesh.log").exists());
    }

    #[test]
    fn test_file_writer_rotating_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig {
            directory: dir.path().join("rotating"),
            prefix: "mesh".to_string(),
            rotation: RotationStrategy::Hourly,
        };

        let (_writer, _guard) = file_writer(&config).unwrap();
        assert!(dir.path().join("rotating").is_dir());
    }

    #[test]
    fn test_init_testing_is_idempotent() {
        init_testing();
        init_testing();
        tracing::warn!("logging initialized");
    }
}
