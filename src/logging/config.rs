use std::{fmt, io, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Output format of a log sink.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Console sink options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub format: LogFormat,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_line_numbers: bool,
}

/// File sink options. The file rolls daily.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FileConfig {
    pub filename: String,
    pub format: LogFormat,
}

/// Logging configuration, part of the service settings under `logging`.
///
/// `BRIDGE_LOG_LEVEL`, `BRIDGE_LOG_FORMAT` and `BRIDGE_LOG_DIR` override the
/// loaded values; `RUST_LOG` overrides the level filter entirely.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level name or a full `EnvFilter` directive
    pub level: String,
    pub log_dir: PathBuf,
    pub console_enabled: bool,
    pub file_enabled: bool,
    pub console: ConsoleConfig,
    pub file: FileConfig,
}

impl LoggingConfig {
    /// Applies `BRIDGE_LOG_*` variables. Unparsable formats are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("BRIDGE_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = std::env::var("BRIDGE_LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                self.console.format = format;
            }
        }
        if let Ok(dir) = std::env::var("BRIDGE_LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let level = self.level.trim();
        if level.is_empty() {
            return Err("log level must not be empty".to_string());
        }
        if !level.contains('=') && !LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(format!("unknown log level '{level}'"));
        }
        if self.file_enabled && self.file.filename.trim().is_empty() {
            return Err("log file name must not be empty".to_string());
        }
        Ok(())
    }

    /// Creates `log_dir` when the file sink is on.
    pub fn ensure_log_dir(&self) -> io::Result<()> {
        if self.file_enabled {
            std::fs::create_dir_all(&self.log_dir)?;
        }
        Ok(())
    }

    /// Directive for `EnvFilter`. A bare level also quiets the NATS client
    /// below `warn`.
    pub fn build_filter_directive(&self) -> String {
        let level = self.level.trim();
        if level.contains('=') {
            level.to_string()
        } else {
            format!("{},async_nats=warn", level.to_ascii_lowercase())
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let name = match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        };
        f.write_str(name)
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            with_line_numbers: false,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            filename: "pubsub-bridge.log".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: PathBuf::from("logs"),
            console_enabled: true,
            file_enabled: false,
            console: ConsoleConfig::default(),
            file: FileConfig::default(),
        }
    }
}
