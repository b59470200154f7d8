use crate::extract::DEFAULT_MIN_ID_LEN;
use crate::session::DEFAULT_GAP_SECS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolved run settings. Read from TOML only when `--config` is given;
/// CLI flags override whatever the file says.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub scan: ScanConfig,
    pub extract: ExtractConfig,
    pub session: SessionConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File-name globs to read; empty reads every regular file.
    pub include: Vec<String>,
    pub follow_links: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub min_id_len: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    pub gap_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub top: usize,
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

// --- Default implementations ---

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_id_len: DEFAULT_MIN_ID_LEN,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gap_secs: DEFAULT_GAP_SECS,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top: 5,
            format: ReportFormat::Text,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file. Missing sections and keys take defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Reject settings that would make the run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.gap_secs <= 0 {
            return Err(ConfigError::Invalid(format!(
                "session.gap_secs must be positive, got {}",
                self.session.gap_secs
            )));
        }
        if self.report.top == 0 {
            return Err(ConfigError::Invalid("report.top must be at least 1".into()));
        }
        if self.extract.min_id_len == 0 {
            return Err(ConfigError::Invalid(
                "extract.min_id_len must be at least 1".into(),
            ));
        }
        for pattern in &self.scan.include {
            glob::Pattern::new(pattern).map_err(|e| ConfigError::Pattern {
                pattern: pattern.clone(),
                source: e,
            })?;
        }
        Ok(())
    }

    /// Render as TOML for `--dry-run`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Errors from loading or validating settings.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
    Serialize(toml::ser::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::Pattern { pattern, source } => {
                write!(f, "invalid include pattern {pattern:?}: {source}")
            }
            ConfigError::Serialize(e) => write!(f, "failed to render settings: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Pattern { source, .. } => Some(source),
            ConfigError::Serialize(e) => Some(e),
            ConfigError::Invalid(_) => None,
        }
    }
}
