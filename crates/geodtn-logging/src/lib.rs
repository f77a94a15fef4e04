//! Structured logging for GeoDTN simulations
//!
//! - Console output as JSON lines (default), pretty or compact text
//! - Optional JSONL file, one per run or rotated via `tracing-appender`
//! - Spans opened while a host is updated remember the host, see
//!   [`HostContextGuard`]
//! - `RUST_LOG` overrides the configured levels
//!
//! ```ignore
//! use geodtn_logging::{ConsoleFormat, GeoSubscriberBuilder, LogConfig};
//!
//! let _guard = GeoSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .with_console(ConsoleFormat::Compact)
//!     .init();
//! ```

pub mod config;
pub mod context;
pub mod layers;

pub use config::{ConsoleConfig, ConsoleFormat, FileConfig, FileRotation, JsonlConfig, LogConfig};
pub use context::{HostContextData, HostContextGuard};
pub use layers::{HostContextExtension, HostContextLayer};

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid level directives: {0}")]
    Directives(#[from] ParseError),

    #[error("Failed to open log file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to create rolling log appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("A global subscriber is already set: {0}")]
    AlreadyInitialized(#[from] tracing_subscriber::util::TryInitError),
}

/// Fluent setup of the global subscriber
#[derive(Debug, Default)]
pub struct GeoSubscriberBuilder {
    config: LogConfig,
}

impl GeoSubscriberBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Override the level of one target
    pub fn with_target_level(mut self, target: impl Into<String>, level: impl Into<String>) -> Self {
        self.config.targets.insert(target.into(), level.into());
        self
    }

    /// Console format; colors follow the format unless set in the config
    pub fn with_console(mut self, format: ConsoleFormat) -> Self {
        self.config.console.format = format;
        self.config.console.ansi = matches!(format, ConsoleFormat::Pretty | ConsoleFormat::Compact);
        self
    }

    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Install the subscriber, reporting failures on stderr
    ///
    /// Keep the returned guard alive until the program ends or buffered
    /// file records are lost.
    pub fn init(self) -> Option<WorkerGuard> {
        self.try_init().unwrap_or_else(|e| {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        })
    }

    pub fn try_init(self) -> Result<Option<WorkerGuard>, LogError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.config.filter_directives())?,
        };

        let mut layers: Vec<BoxedLayer> = vec![HostContextLayer::new().boxed()];
        if let Some(console) = console_layer(&self.config) {
            layers.push(console);
        }

        let guard = match &self.config.file {
            Some(file) => {
                let (writer, guard) = open_file(file)?;
                layers.push(json_layer(&self.config.jsonl, writer));
                Some(guard)
            }
            None => None,
        };

        Registry::default().with(layers).with(filter).try_init()?;
        Ok(guard)
    }
}

fn console_layer(config: &LogConfig) -> Option<BoxedLayer> {
    let ansi = config.console.ansi;
    let layer = match config.console.format {
        ConsoleFormat::Off => return None,
        ConsoleFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .boxed(),
        ConsoleFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_ansi(ansi)
            .boxed(),
        ConsoleFormat::Json => json_layer(&config.jsonl, std::io::stdout),
    };
    Some(layer)
}

fn json_layer<W>(jsonl: &JsonlConfig, writer: W) -> BoxedLayer
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(jsonl.span_list)
        .flatten_event(jsonl.flatten_events)
        .with_file(jsonl.source_location)
        .with_line_number(jsonl.source_location)
        .with_thread_ids(jsonl.thread_ids)
        .with_ansi(false)
        .with_writer(writer)
        .boxed()
}

fn open_file(config: &FileConfig) -> Result<(NonBlocking, WorkerGuard), LogError> {
    let rotation = match config.rotation {
        FileRotation::PerRun => {
            fs::create_dir_all(&config.directory)?;
            let file = File::create(config.directory.join(format!("{}.log", config.prefix)))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        FileRotation::Hourly => Rotation::HOURLY,
        FileRotation::Daily => Rotation::DAILY,
    };

    let mut appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("log");
    if let Some(keep) = config.keep {
        appender = appender.max_log_files(keep);
    }
    Ok(tracing_appender::non_blocking(
        appender.build(&config.directory)?,
    ))
}

/// JSON lines on stdout
pub fn init_default() -> Option<WorkerGuard> {
    GeoSubscriberBuilder::new().init()
}

/// Pretty debug output on stdout
pub fn init_development() -> Option<WorkerGuard> {
    GeoSubscriberBuilder::new()
        .with_config(LogConfig::development())
        .init()
}

/// Warnings only; safe to call from every test
pub fn init_testing() {
    let _ = GeoSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
