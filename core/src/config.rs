use crate::error::{Error, TrustResult};
use crate::handshake::ScoreConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_CHALLENGE_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_POW_DIFFICULTY: u8 = 4;
pub const DEFAULT_JANITOR_INTERVAL_SECS: u64 = 60;
pub const MAX_POW_DIFFICULTY: u8 = 6;
pub const MAX_CHALLENGE_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustConfig {
    #[serde(default)]
    pub handshake: HandshakeSection,
    #[serde(default)]
    pub scoring: ScoreConfig,
    #[serde(default)]
    pub janitor: JanitorSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_challenge_timeout_secs")]
    pub challenge_timeout_secs: u64,
    #[serde(default = "default_pow_difficulty")]
    pub pow_difficulty: u8,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_challenge_timeout_secs() -> u64 {
    DEFAULT_CHALLENGE_TIMEOUT_SECS
}
fn default_pow_difficulty() -> u8 {
    DEFAULT_POW_DIFFICULTY
}

impl Default for HandshakeSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            challenge_timeout_secs: default_challenge_timeout_secs(),
            pow_difficulty: default_pow_difficulty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JanitorSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_janitor_interval_secs")]
    pub interval_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_janitor_interval_secs() -> u64 {
    DEFAULT_JANITOR_INTERVAL_SECS
}

impl Default for JanitorSection {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_janitor_interval_secs(),
        }
    }
}

impl JanitorSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TrustConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> TrustResult<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> TrustResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> TrustResult<()> {
        if self.handshake.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be > 0".to_string()));
        }

        if self.handshake.challenge_timeout_secs == 0
            || self.handshake.challenge_timeout_secs > MAX_CHALLENGE_TIMEOUT_SECS
        {
            return Err(Error::Config(format!(
                "challenge_timeout_secs must be between 1 and {}",
                MAX_CHALLENGE_TIMEOUT_SECS
            )));
        }

        if self.handshake.pow_difficulty == 0 || self.handshake.pow_difficulty > MAX_POW_DIFFICULTY {
            return Err(Error::Config(format!(
                "pow_difficulty must be between 1 and {}",
                MAX_POW_DIFFICULTY
            )));
        }

        if self.janitor.interval_secs == 0 {
            return Err(Error::Config("janitor interval_secs must be > 0".to_string()));
        }

        Ok(())
    }

    pub fn to_toml(&self) -> TrustResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))
    }
}

pub fn generate_default<P: AsRef<Path>>(output: P) -> TrustResult<()> {
    let config = TrustConfig::default();
    let toml = config.to_toml()?;

    fs::write(output.as_ref(), toml)
        .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

    tracing::debug!("Generated default config at: {}", output.as_ref().display());
    Ok(())
}
