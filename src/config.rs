//! Configuration system for the scanner
//!
//! Reads configuration from:
//! - `.a11yscanrc.yaml` / `.a11yscanrc.json` (project-level)
//! - `~/.a11yscanrc.yaml` (user-level)

use crate::walker::{WalkMode, WalkOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default cap on elements visited by one walk
pub const DEFAULT_MAX_ELEMENTS: i32 = 20_000;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Populate properties and evaluate rules in parallel
    pub parallel: bool,

    /// Number of worker threads (0 = one per CPU)
    pub jobs: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            jobs: 0,
        }
    }
}

impl EngineConfig {
    /// Worker threads to use, resolving 0 to the CPU count
    pub fn threads(&self) -> usize {
        if self.jobs > 0 {
            self.jobs
        } else {
            num_cpus::get()
        }
    }
}

/// Walk settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound on elements visited by one walk
    pub max_elements: i32,

    /// Include the selected element's siblings
    pub sibling_context: bool,

    pub mode: WalkMode,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_elements: DEFAULT_MAX_ELEMENTS,
            sibling_context: true,
            mode: WalkMode::Test,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,

    pub color: ColorMode,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Sarif,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "sarif" => Ok(OutputFormat::Sarif),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Color mode options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Rule configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rules left out of reports
    pub disabled: Vec<String>,

    /// Rules to report (empty = all)
    pub enabled: Vec<String>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,

    pub scan: ScanConfig,

    pub output: OutputConfig,

    pub rules: RulesConfig,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Self = match ext {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown config file format: {}",
                    ext
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the walker cannot honour
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.max_elements < 1 || self.scan.max_elements == i32::MAX {
            return Err(ConfigError::Invalid(format!(
                "scan.max_elements must be between 1 and {}, got {}",
                i32::MAX - 1,
                self.scan.max_elements
            )));
        }
        Ok(())
    }

    /// Load configuration from default locations
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_names = [".a11yscanrc.yaml", ".a11yscanrc.yml", ".a11yscanrc.json"];

        for name in &config_names {
            let path = PathBuf::from(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            for name in &config_names {
                let path = home.join(name);
                if path.exists() {
                    return Self::load(&path);
                }
            }
        }

        Ok(Self::default())
    }

    /// Merge CLI arguments into configuration
    pub fn merge_cli(
        &mut self,
        format: Option<OutputFormat>,
        mode: Option<WalkMode>,
        max_elements: Option<i32>,
        jobs: Option<usize>,
        disabled_rules: Option<Vec<String>>,
    ) {
        if let Some(f) = format {
            self.output.format = f;
        }
        if let Some(m) = mode {
            self.scan.mode = m;
        }
        if let Some(n) = max_elements {
            self.scan.max_elements = n;
        }
        if let Some(j) = jobs {
            self.engine.jobs = j;
        }
        if let Some(disabled) = disabled_rules {
            self.rules.disabled.extend(disabled);
        }
    }

    /// Whether results of `rule_id` belong in reports
    pub fn is_rule_enabled(&self, rule_id: &str) -> bool {
        if self.rules.disabled.iter().any(|r| r == rule_id) {
            return false;
        }
        self.rules.enabled.is_empty() || self.rules.enabled.iter().any(|r| r == rule_id)
    }

    pub fn walk_options(&self) -> WalkOptions {
        WalkOptions {
            mode: self.scan.mode,
            sibling_context: self.scan.sibling_context,
            parallel: self.engine.parallel,
        }
    }
}
