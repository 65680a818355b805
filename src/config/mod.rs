//! Configuration management.
//!
//! Settings come from a TOML file, then environment variables override
//! individual values. The resulting [`InstructConfig`] is passed explicitly
//! into every component that needs it; nothing reads ambient settings.
//!
//! ```toml
//! data_path = "~/notes/.instruct/instructions.json"
//!
//! [llm]
//! model = "gpt-4o-mini"
//! temperature = 0.3
//! max_tokens = 512
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use crate::observability::LogFormat;
use crate::storage::instruction::FileInstructionStore;
use crate::{Error, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration for instruct.
#[derive(Debug, Clone)]
pub struct InstructConfig {
    /// Path of the instruction history document.
    pub data_path: PathBuf,
    /// Completion API settings.
    pub llm: LlmConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Chat models offered in the settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    /// `gpt-3.5-turbo`.
    #[default]
    Gpt35Turbo,
    /// `gpt-4`.
    Gpt4,
    /// `gpt-4-turbo`.
    Gpt4Turbo,
    /// `gpt-4o`.
    Gpt4o,
    /// `gpt-4o-mini`.
    Gpt4oMini,
}

impl Model {
    /// Every selectable model.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Gpt35Turbo,
            Self::Gpt4,
            Self::Gpt4Turbo,
            Self::Gpt4o,
            Self::Gpt4oMini,
        ]
    }

    /// API name of the model.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gpt35Turbo => "gpt-3.5-turbo",
            Self::Gpt4 => "gpt-4",
            Self::Gpt4Turbo => "gpt-4-turbo",
            Self::Gpt4o => "gpt-4o",
            Self::Gpt4oMini => "gpt-4o-mini",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Model {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::all()
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::all().iter().map(|m| m.as_str()).collect();
                Error::InvalidInput(format!(
                    "unknown model '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Completion API configuration.
///
/// Generation parameters are bounded; out-of-range values are clamped when the
/// configuration is loaded.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key.
    pub api_key: Option<SecretString>,
    /// Target model.
    pub model: Model,
    /// API base URL.
    pub base_url: String,
    /// Sampling temperature, 0.0 to 1.0.
    pub temperature: f32,
    /// Maximum completion length in tokens, 1 to 4096.
    pub max_tokens: u32,
    /// Nucleus sampling mass, 0.0 to 1.0.
    pub top_p: f32,
    /// Frequency penalty, 0.0 to 2.0.
    pub frequency_penalty: f32,
    /// Presence penalty, 0.0 to 2.0.
    pub presence_penalty: f32,
    /// Request timeout in milliseconds (0 disables).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 disables).
    pub connect_timeout_ms: u64,
    /// Cap on simultaneous requests in multiple mode (at least 1).
    pub max_concurrency: usize,
}

impl LlmConfig {
    /// Default API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    /// Temperature bounds.
    pub const TEMPERATURE_RANGE: (f32, f32) = (0.0, 1.0);
    /// Max-token bounds.
    pub const MAX_TOKENS_RANGE: (u32, u32) = (1, 4096);
    /// Top-p bounds.
    pub const TOP_P_RANGE: (f32, f32) = (0.0, 1.0);
    /// Frequency and presence penalty bounds.
    pub const PENALTY_RANGE: (f32, f32) = (0.0, 2.0);
    /// Default cap on simultaneous requests.
    pub const DEFAULT_MAX_CONCURRENCY: usize = 16;
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: Model::default(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            temperature: 0.7,
            max_tokens: 256,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            timeout_ms: 60_000,
            connect_timeout_ms: 5_000,
            max_concurrency: Self::DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Default filter directive (overridden by `RUST_LOG`).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Instruction history path.
    pub data_path: Option<String>,
    /// LLM section.
    pub llm: Option<ConfigFileLlm>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLlm {
    /// API key.
    pub api_key: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Temperature.
    pub temperature: Option<f32>,
    /// Max tokens.
    pub max_tokens: Option<u32>,
    /// Top-p.
    pub top_p: Option<f32>,
    /// Frequency penalty.
    pub frequency_penalty: Option<f32>,
    /// Presence penalty.
    pub presence_penalty: Option<f32>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Fan-out cap.
    pub max_concurrency: Option<usize>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileLogging {
    /// Filter directive.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl Default for InstructConfig {
    fn default() -> Self {
        Self {
            data_path: FileInstructionStore::default_path()
                .unwrap_or_else(|| PathBuf::from(crate::storage::instruction::DEFAULT_FILE_NAME)),
            llm: LlmConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl InstructConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or names an unknown model or
    /// log format.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::operation("parse_config_file", e))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::operation("read_config_file", e))?;
        Self::from_toml(&contents)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/instruct/` on macOS)
    /// 2. XDG config dir (`~/.config/instruct/`)
    ///
    /// Returns default configuration if no config file is found.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load_default() -> Result<Self> {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Ok(Self::default());
        };

        let candidates = [
            base_dirs.config_dir().join("instruct").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("instruct")
                .join("config.toml"),
        ];

        candidates
            .iter()
            .find(|p| p.exists())
            .map_or_else(|| Ok(Self::default()), |p| Self::load_from_file(p))
    }

    /// Converts a `ConfigFile` to `InstructConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(data_path) = file.data_path {
            config.data_path = expand_home(&data_path);
        }

        if let Some(llm) = file.llm {
            let defaults = LlmConfig::default();
            config.llm = LlmConfig {
                api_key: llm.api_key.map(SecretString::from),
                model: llm.model.as_deref().map_or(Ok(defaults.model), Model::from_str)?,
                base_url: llm.base_url.unwrap_or(defaults.base_url),
                temperature: clamp_f32(
                    "temperature",
                    llm.temperature.unwrap_or(defaults.temperature),
                    LlmConfig::TEMPERATURE_RANGE,
                ),
                max_tokens: clamp_u32(
                    "max_tokens",
                    llm.max_tokens.unwrap_or(defaults.max_tokens),
                    LlmConfig::MAX_TOKENS_RANGE,
                ),
                top_p: clamp_f32(
                    "top_p",
                    llm.top_p.unwrap_or(defaults.top_p),
                    LlmConfig::TOP_P_RANGE,
                ),
                frequency_penalty: clamp_f32(
                    "frequency_penalty",
                    llm.frequency_penalty.unwrap_or(defaults.frequency_penalty),
                    LlmConfig::PENALTY_RANGE,
                ),
                presence_penalty: clamp_f32(
                    "presence_penalty",
                    llm.presence_penalty.unwrap_or(defaults.presence_penalty),
                    LlmConfig::PENALTY_RANGE,
                ),
                timeout_ms: llm.timeout_ms.unwrap_or(defaults.timeout_ms),
                connect_timeout_ms: llm.connect_timeout_ms.unwrap_or(defaults.connect_timeout_ms),
                max_concurrency: llm
                    .max_concurrency
                    .unwrap_or(defaults.max_concurrency)
                    .max(1),
            };
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            if let Some(format) = logging.format {
                config.logging.format = LogFormat::from_str(&format)?;
            }
            config.logging.file = logging.file.map(|f| expand_home(&f));
        }

        Ok(config)
    }

    /// Applies environment variable overrides.
    ///
    /// | Variable | Setting |
    /// |----------|---------|
    /// | `INSTRUCT_API_KEY`, then `OPENAI_API_KEY` | `llm.api_key` (only when unset in the file) |
    /// | `INSTRUCT_MODEL` | `llm.model` |
    /// | `INSTRUCT_BASE_URL` | `llm.base_url` |
    /// | `INSTRUCT_DATA_PATH` | `data_path` |
    /// | `INSTRUCT_LLM_TIMEOUT_MS` | `llm.timeout_ms` |
    ///
    /// # Errors
    ///
    /// Returns an error if `INSTRUCT_MODEL` names an unknown model.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if self.llm.api_key.is_none() {
            self.llm.api_key = ["INSTRUCT_API_KEY", "OPENAI_API_KEY"]
                .iter()
                .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
                .map(SecretString::from);
        }
        if let Ok(v) = std::env::var("INSTRUCT_MODEL") {
            self.llm.model = Model::from_str(&v)?;
        }
        if let Ok(v) = std::env::var("INSTRUCT_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("INSTRUCT_DATA_PATH") {
            if !v.trim().is_empty() {
                self.data_path = expand_home(&v);
            }
        }
        if let Ok(v) = std::env::var("INSTRUCT_LLM_TIMEOUT_MS") {
            if let Ok(timeout_ms) = v.parse::<u64>() {
                self.llm.timeout_ms = timeout_ms;
            }
        }
        Ok(self)
    }

    /// Sets the instruction history path.
    #[must_use]
    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = path.into();
        self
    }
}

/// Expands a leading `~/` to the home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}

fn clamp_f32(name: &str, value: f32, (min, max): (f32, f32)) -> f32 {
    if value.is_nan() {
        tracing::warn!(setting = name, "Setting is NaN, using lower bound");
        return min;
    }
    let clamped = value.clamp(min, max);
    if (clamped - value).abs() > f32::EPSILON {
        tracing::warn!(setting = name, value, clamped, "Setting out of range, clamped");
    }
    clamped
}

fn clamp_u32(name: &str, value: u32, (min, max): (u32, u32)) -> u32 {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!(setting = name, value, clamped, "Setting out of range, clamped");
    }
    clamped
}
