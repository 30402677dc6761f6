// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::agent::retry::RetryConfig;
use crate::core::transcript::RenderOrder;
use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub retry: RetryTomlConfig,

    #[serde(default)]
    pub transcript: TranscriptConfig,

    #[serde(default)]
    pub extract: ExtractConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub base_url: String,
    /// Assistant to talk to. `PARLEY_ASSISTANT_ID` and `--assistant` override it.
    pub assistant_id: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Per-request HTTP timeout.
    pub request_timeout_seconds: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            assistant_id: None,
            api_key_env: "OPENAI_API_KEY".into(),
            request_timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            timeout_seconds: 300,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryTomlConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
    pub jitter_fraction: f64,
}

impl Default for RetryTomlConfig {
    fn default() -> Self {
        let d = RetryConfig::default();
        Self {
            max_retries: d.max_retries,
            initial_delay_ms: d.initial_delay.as_millis() as u64,
            backoff_factor: d.backoff_factor,
            max_delay_ms: d.max_delay.as_millis() as u64,
            jitter_fraction: d.jitter_fraction,
        }
    }
}

impl From<&RetryTomlConfig> for RetryConfig {
    fn from(c: &RetryTomlConfig) -> Self {
        Self {
            max_retries: c.max_retries,
            initial_delay: Duration::from_millis(c.initial_delay_ms),
            backoff_factor: c.backoff_factor,
            max_delay: Duration::from_millis(c.max_delay_ms),
            jitter_fraction: c.jitter_fraction,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptConfig {
    #[serde(default)]
    pub order: RenderOrder,
    /// Write the transcript to the transcripts directory when a chat ends.
    #[serde(default)]
    pub autosave: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub ocr_command: String,
    pub ocr_language: String,
    pub blur_sigma: f32,
    pub contrast: f32,
    pub max_upload_mb: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            ocr_command: "tesseract".into(),
            ocr_language: "eng".into(),
            blur_sigma: 1.0,
            contrast: 50.0,
            max_upload_mb: 20,
        }
    }
}

impl ExtractConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.polling.interval_ms == 0 {
            anyhow::bail!("polling.interval_ms must be greater than 0");
        }
        if self.polling.timeout_seconds == 0 {
            anyhow::bail!("polling.timeout_seconds must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_fraction) {
            anyhow::bail!(
                "retry.jitter_fraction must be within 0.0-1.0, got {}",
                self.retry.jitter_fraction
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.polling.interval(), Duration::from_millis(500));
        assert_eq!(c.polling.timeout(), Duration::from_secs(300));
        assert_eq!(c.agent.api_key_env, "OPENAI_API_KEY");
        assert!(c.agent.assistant_id.is_none());
        assert_eq!(c.transcript.order, RenderOrder::OldestFirst);
        assert!(!c.transcript.autosave);
        assert_eq!(c.extract.ocr_command, "tesseract");
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.polling.interval_ms, 500);
        assert_eq!(config.retry.max_retries, RetryConfig::default().max_retries);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[agent]
base_url = "http://localhost:8080/v1"
assistant_id = "asst_pizza"
api_key_env = "PIZZA_KEY"
request_timeout_seconds = 10

[polling]
interval_ms = 250
timeout_seconds = 30

[retry]
max_retries = 2
initial_delay_ms = 100
backoff_factor = 3.0
max_delay_ms = 1000
jitter_fraction = 0.0

[transcript]
order = "newest_first"
autosave = true

[extract]
ocr_command = "/usr/local/bin/tesseract"
ocr_language = "deu"
blur_sigma = 0.5
contrast = 30.0
max_upload_mb = 5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agent.assistant_id.as_deref(), Some("asst_pizza"));
        assert_eq!(config.polling.interval(), Duration::from_millis(250));
        assert_eq!(config.transcript.order, RenderOrder::NewestFirst);
        assert!(config.transcript.autosave);
        assert_eq!(config.extract.max_upload_bytes(), 5 * 1024 * 1024);

        let retry = RetryConfig::from(&config.retry);
        assert_eq!(retry.max_retries, 2);
        assert_eq!(retry.max_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_load_rejects_zero_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[polling]\ninterval_ms = 0\ntimeout_seconds = 5\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str("[polling]\ntimeout_seconds = 45\n").unwrap();
        assert_eq!(config.polling.timeout(), Duration::from_secs(45));
        assert_eq!(config.polling.interval_ms, 500);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.polling.interval_ms, config.polling.interval_ms);
        assert_eq!(deserialized.transcript.order, config.transcript.order);
    }
}
