use crate::defaults;
use crate::error::{RelayError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub model: ModelConfig,
    pub service: ServiceConfig,
    pub audio: AudioConfig,
}

/// Model artifact configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// Expected name of the first declared output (codec tokens).
    pub tokens_output: Option<String>,
    /// Expected name of the second declared output (audio scales).
    pub scales_output: Option<String>,
    pub intra_threads: Option<usize>,
}

/// Decoding service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(
        serialize_with = "serialize_duration",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,
}

/// Audio decoding configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub decoder: DecoderBackend,
    pub ffmpeg_path: PathBuf,
}

/// Which engine turns the input container into raw samples
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DecoderBackend {
    #[default]
    Symphonia,
    Ffmpeg,
}

impl FromStr for DecoderBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "symphonia" => Ok(DecoderBackend::Symphonia),
            "ffmpeg" => Ok(DecoderBackend::Ffmpeg),
            other => Err(format!(
                "unknown decoder '{other}' (expected 'symphonia' or 'ffmpeg')"
            )),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(defaults::DEFAULT_MODEL_PATH),
            tokens_output: None,
            scales_output: None,
            intra_threads: None,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::DEFAULT_SERVICE_URL.to_string(),
            timeout: Duration::from_secs(defaults::REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            decoder: DecoderBackend::default(),
            ffmpeg_path: PathBuf::from(defaults::FFMPEG_BINARY),
        }
    }
}

fn serialize_duration<S: Serializer>(
    value: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Parse a duration string.
///
/// Accepts bare numbers (seconds) and anything `humantime` understands
/// (`30s`, `2m`, `1m30s`).
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(RelayError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - ENCODEC_RELAY_MODEL → model.path
    /// - ENCODEC_RELAY_SERVICE_URL → service.base_url
    /// - ENCODEC_RELAY_DECODER → audio.decoder
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(model) = std::env::var("ENCODEC_RELAY_MODEL")
            && !model.is_empty()
        {
            self.model.path = PathBuf::from(model);
        }

        if let Ok(url) = std::env::var("ENCODEC_RELAY_SERVICE_URL")
            && !url.is_empty()
        {
            self.service.base_url = url;
        }

        if let Ok(decoder) = std::env::var("ENCODEC_RELAY_DECODER")
            && !decoder.is_empty()
        {
            self.audio.decoder =
                decoder
                    .parse()
                    .map_err(|message| RelayError::ConfigInvalidValue {
                        key: "ENCODEC_RELAY_DECODER".to_string(),
                        message,
                    })?;
        }

        Ok(self)
    }

    /// Check values that parse fine but cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.model.path.as_os_str().is_empty() {
            return Err(RelayError::ConfigInvalidValue {
                key: "model.path".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.service.base_url.trim().is_empty() {
            return Err(RelayError::ConfigInvalidValue {
                key: "service.base_url".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.service.timeout.is_zero() {
            return Err(RelayError::ConfigInvalidValue {
                key: "service.timeout".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.model.intra_threads == Some(0) {
            return Err(RelayError::ConfigInvalidValue {
                key: "model.intra_threads".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Serialize to TOML (used by `config show`).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RelayError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/encodec-relay/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("encodec-relay")
            .join("config.toml")
    }
}
