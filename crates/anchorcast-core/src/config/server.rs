//! Server configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::client::DEFAULT_SERVER_PORT;
use super::{ConfigError, ENV_BIND, ENV_TTS_ENDPOINT, process_env, read_json, require_positive};
use crate::protocol::DEFAULT_MAX_FRAME_LEN;

/// Parameters for a GPT-SoVITS style `POST /tts` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub endpoint: String,
    /// Reference clip, as a path the synthesis service can read.
    pub ref_audio_path: String,
    /// Transcript of the reference clip.
    pub prompt_text: String,
    pub prompt_lang: String,
    pub text_lang: String,
    pub text_split_method: String,
    pub top_k: u32,
    pub top_p: f32,
    pub temperature: f32,
    pub speed_factor: f32,
    pub sample_steps: u32,
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9880/tts".to_string(),
            ref_audio_path: String::new(),
            prompt_text: String::new(),
            prompt_lang: "zh".to_string(),
            text_lang: "zh".to_string(),
            text_split_method: "cut1".to_string(),
            top_k: 15,
            top_p: 1.0,
            temperature: 1.0,
            speed_factor: 0.85,
            sample_steps: 8,
            timeout_secs: 60,
        }
    }
}

impl SynthesisConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self, which: &str) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "{which}.endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }
        if self.speed_factor.is_nan() || self.speed_factor <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "{which}.speed_factor must be positive"
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(format!(
                "{which}.timeout_secs must be at least 1"
            )));
        }
        Ok(())
    }
}

/// Everything the synthesis server needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` to listen on.
    pub bind: String,
    /// Workers for interrupt, auto and test chunks.
    pub urgent_workers: usize,
    /// Workers for normal chunks.
    pub normal_workers: usize,
    pub max_frame_bytes: usize,
    /// Main voice.
    pub synthesis: SynthesisConfig,
    /// Assistant voice, used for voice tests and keyword replies.
    pub assistant: Option<SynthesisConfig>,
    /// Keyword → candidate assistant lines.
    pub assistant_replies: BTreeMap<String, Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ServerConfig {
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            bind: format!("0.0.0.0:{DEFAULT_SERVER_PORT}"),
            urgent_workers: 5,
            normal_workers: 5,
            max_frame_bytes: DEFAULT_MAX_FRAME_LEN,
            synthesis: SynthesisConfig::default(),
            assistant: None,
            assistant_replies: BTreeMap::new(),
        }
    }

    /// Read `path`, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = read_json(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(process_env);
    }

    /// Apply overrides using `lookup` in place of the process environment.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup(ENV_BIND) {
            self.bind = bind;
        }
        if let Some(endpoint) = lookup(ENV_TTS_ENDPOINT) {
            self.synthesis.endpoint = endpoint;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.bind.contains(':') {
            return Err(ConfigError::Invalid(format!(
                "bind must be host:port, got '{}'",
                self.bind
            )));
        }
        require_positive("urgent_workers", self.urgent_workers)?;
        require_positive("normal_workers", self.normal_workers)?;
        require_positive("max_frame_bytes", self.max_frame_bytes)?;
        self.synthesis.validate("synthesis")?;
        if let Some(assistant) = &self.assistant {
            assistant.validate("assistant")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ServerConfig::with_defaults();
        config.validate().unwrap();
        assert_eq!(config.bind, "0.0.0.0:8765");
        assert_eq!(config.urgent_workers, 5);
        assert_eq!(config.normal_workers, 5);
        assert!((config.synthesis.speed_factor - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parse_with_assistant() {
        let config: ServerConfig = serde_json::from_str(
            r#"{
                "bind": "127.0.0.1:9000",
                "assistant": {"endpoint": "http://10.0.0.5:9880/tts", "speed_factor": 1.1},
                "assistant_replies": {"福利": ["真的假的？", "快上车！"]}
            }"#,
        )
        .unwrap();
        config.validate().unwrap();
        let assistant = config.assistant.as_ref().unwrap();
        assert_eq!(assistant.endpoint, "http://10.0.0.5:9880/tts");
        assert_eq!(assistant.prompt_lang, "zh");
        assert_eq!(config.assistant_replies["福利"].len(), 2);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerConfig::with_defaults();
        config.apply_overrides_from(|name| match name {
            ENV_BIND => Some("127.0.0.1:7000".to_string()),
            ENV_TTS_ENDPOINT => Some("http://gpu-box:9880/tts".to_string()),
            _ => None,
        });
        assert_eq!(config.bind, "127.0.0.1:7000");
        assert_eq!(config.synthesis.endpoint, "http://gpu-box:9880/tts");
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let mut config = ServerConfig::with_defaults();
        config.synthesis.endpoint = "gpu-box:9880".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_pool() {
        let config = ServerConfig {
            normal_workers: 0,
            ..ServerConfig::with_defaults()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "{ not json").unwrap();
        assert!(matches!(
            ServerConfig::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
