//! loggate.toml configuration parser.
//!
//! Every section has working defaults so a minimal (or empty) config file
//! yields a runnable gateway: file logging on, metrics/hostinfo/forwarding
//! off, recorder on its own listener. Validation collects every problem it
//! finds before failing, so a broken config is reported in one pass.

use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors produced while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config:\n{0}")]
    Invalid(String),
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log: LogConfig,
    pub ingest: IngestConfig,
    pub recorder: RecorderConfig,
    pub scrape: ScrapeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Log level filter: trace, debug, info, warn, error.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// The log-ingestion surface: its listener and the set of enabled sinks.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    pub listener: ListenerConfig,
    pub processors: ProcessorConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::with_port(5678),
            processors: ProcessorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessorConfig {
    pub file_logger: FileLoggerConfig,
    /// Decode embedded client-metric payloads and expose them for scraping.
    pub metrics: bool,
    /// Extract host inventory from records that carry it.
    pub hostinfo: bool,
    pub forward: ForwardConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileLoggerConfig {
    pub enabled: bool,
    pub dir: PathBuf,
}

impl Default for FileLoggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("./logs"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForwardConfig {
    pub enabled: bool,
    /// Upstream URL raw batches are POSTed to.
    pub addr: String,
}

/// The session-recording surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecorderConfig {
    pub dir: PathBuf,
    pub listener: ListenerConfig,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./recordings"),
            listener: ListenerConfig::with_port(5680),
        }
    }
}

/// The peer-exposition aggregation surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeConfig {
    pub enabled: bool,
    /// Peer addresses (`host` or `host:port`) to federate metrics from.
    pub targets: Vec<String>,
    pub listener: ListenerConfig,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            targets: Vec::new(),
            listener: ListenerConfig::with_port(5679),
        }
    }
}

/// Where a surface listens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenerConfig {
    pub kind: ListenerKind,
    pub addr: String,
    pub port: u16,
}

impl ListenerConfig {
    fn with_port(port: u16) -> Self {
        Self {
            kind: ListenerKind::Plain,
            addr: "0.0.0.0".to_string(),
            port,
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::with_port(5678)
    }
}

/// Transport a listener binds on. Only plain TCP is supported; the kind
/// stays an enum so alternative transports have an explicit seam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerKind {
    Plain,
}

impl Config {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints, collecting every violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        if self.ingest.processors.forward.enabled && self.ingest.processors.forward.addr.is_empty()
        {
            problems.push("forward processor is enabled but no addr is configured".to_string());
        }
        if self.scrape.enabled && self.scrape.targets.is_empty() {
            problems.push("scrape is enabled but no targets are configured".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems.join("\n")))
        }
    }
}
