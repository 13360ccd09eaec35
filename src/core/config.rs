use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a concise, practical personal assistant. \
Use the background context above when it is relevant; when it is not, answer plainly \
and do not speculate about the person.";

/// Environment variables consulted for the API credential, in order.
const API_KEY_VARS: [&str; 2] = ["VALET_API_KEY", "OPENROUTER_API_KEY"];

/// Errors that can occur while resolving configuration at startup.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        /// Path to the configuration file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        /// Path to the configuration file with invalid TOML.
        path: PathBuf,
        /// The TOML deserialization error.
        source: toml::de::Error,
    },

    /// No API credential was found in the environment.
    MissingApiKey,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Failed to parse config at {}: {}", path.display(), source)
            }
            ConfigError::MissingApiKey => {
                write!(
                    f,
                    "No API key found. Set {} (or {}) in the environment",
                    API_KEY_VARS[0], API_KEY_VARS[1]
                )
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::MissingApiKey => None,
        }
    }
}

/// A per-model price override, in USD per million tokens.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PriceOverride {
    pub model: String,
    pub prompt_per_million: f64,
    pub completion_per_million: f64,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Model identifier sent to the provider (e.g. "anthropic/claude-sonnet-4")
    pub model: Option<String>,
    /// Base URL of the OpenAI-compatible endpoint
    pub base_url: Option<String>,
    /// Directory holding profile.md, preferences.md, and current_focus.md
    pub context_dir: Option<PathBuf>,
    /// Directory session transcripts are written to
    pub transcripts_dir: Option<PathBuf>,
    /// Instruction preamble appended after the context sections
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub pricing: Vec<PriceOverride>,
}

impl Config {
    pub fn load() -> Result<Config, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
                path: config_path.to_path_buf(),
                source,
            })?;
            let config: Config =
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: config_path.to_path_buf(),
                    source,
                })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn context_dir(&self) -> PathBuf {
        self.context_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("context"))
    }

    pub fn transcripts_dir(&self) -> PathBuf {
        self.transcripts_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("conversations"))
    }

    /// Resolve the provider credential from the environment. The key is
    /// never persisted anywhere by this program.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        for var in API_KEY_VARS {
            if let Ok(value) = env::var(var) {
                let value = value.trim().to_string();
                if !value.is_empty() {
                    return Ok(value);
                }
            }
        }
        Err(ConfigError::MissingApiKey)
    }

    fn config_path() -> PathBuf {
        let proj_dirs = ProjectDirs::from("org", "permacommons", "valet")
            .expect("Failed to determine config directory");
        proj_dirs.config_dir().join("config.toml")
    }

    fn data_dir() -> PathBuf {
        let proj_dirs = ProjectDirs::from("org", "permacommons", "valet")
            .expect("Failed to determine data directory");
        proj_dirs.data_dir().to_path_buf()
    }
}
