//! Logging configuration
//!
//! A [`LogConfig`] is plain data so a scenario file or a CLI can carry it.
//! Levels are `EnvFilter` directives; `RUST_LOG` replaces them wholesale.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Level for every target without an override
    pub level: String,

    /// Per-target levels, e.g. `geodtn_routing::world` → `trace`
    pub targets: BTreeMap<String, String>,

    pub console: ConsoleConfig,

    /// JSONL file output, off when absent
    pub file: Option<FileConfig>,

    /// Shape of JSON records, console and file alike
    pub jsonl: JsonlConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            targets: BTreeMap::new(),
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
        }
    }
}

impl LogConfig {
    /// Pretty colored console at debug level
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            console: ConsoleConfig {
                format: ConsoleFormat::Pretty,
                ansi: true,
            },
            ..Default::default()
        }
    }

    /// Batch runs: no console, one JSONL file per run in `log_dir`
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            console: ConsoleConfig {
                format: ConsoleFormat::Off,
                ansi: false,
            },
            file: Some(FileConfig {
                directory: log_dir,
                ..FileConfig::default()
            }),
            ..Default::default()
        }
    }

    /// Warnings only, compact
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            console: ConsoleConfig {
                format: ConsoleFormat::Compact,
                ansi: false,
            },
            ..Default::default()
        }
    }

    /// Log every transfer decision of the world at trace level
    pub fn with_transfer_tracing(mut self) -> Self {
        self.targets
            .insert("geodtn_routing::world".to_string(), "trace".to_string());
        self
    }

    /// The `EnvFilter` directive string for this config
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![self.level.clone()];
        directives.extend(
            self.targets
                .iter()
                .map(|(target, level)| format!("{target}={level}")),
        );
        directives.join(",")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleFormat {
    /// No console output
    Off,
    /// Multi-line human-readable records
    Pretty,
    /// One human-readable line per record
    Compact,
    /// One JSON object per line
    #[default]
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub format: ConsoleFormat,
    /// Color escapes; ignored for JSON
    pub ansi: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// File name stem; rotated files get a date suffix
    pub prefix: String,
    pub rotation: FileRotation,
    /// Rotated files to keep; ignored for per-run files
    pub keep: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "geodtn".to_string(),
            rotation: FileRotation::PerRun,
            keep: Some(7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRotation {
    /// A single `<prefix>.log`, truncated at start-up
    #[default]
    PerRun,
    Hourly,
    Daily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    /// Event fields at the top level instead of under `fields`
    pub flatten_events: bool,
    /// Enclosing spans (host, tick) on every record
    pub span_list: bool,
    pub source_location: bool,
    pub thread_ids: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            span_list: true,
            source_location: false,
            thread_ids: false,
        }
    }
}
