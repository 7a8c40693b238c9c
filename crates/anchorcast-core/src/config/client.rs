//! Client configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::sound::{SoundAction, default_sound_library};
use super::{ConfigError, ENV_SERVER_HOST, ENV_SERVER_PORT, process_env, read_json, require_positive};
use crate::protocol::DEFAULT_MAX_FRAME_LEN;
use crate::text::{DEFAULT_MAX_CHUNK_CHARS, DEFAULT_SPLIT_THRESHOLD};

/// Default TCP port of the synthesis server.
pub const DEFAULT_SERVER_PORT: u16 = 8765;

/// External command used to play audio files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub program: String,
    /// Arguments placed before the file path.
    pub args: Vec<String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            program: "ffplay".to_string(),
            args: vec![
                "-nodisp".to_string(),
                "-autoexit".to_string(),
                "-loglevel".to_string(),
                "quiet".to_string(),
            ],
        }
    }
}

/// Everything the announcer client needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_host: String,
    pub server_port: u16,

    /// Where reassembled audio is written before playback.
    pub output_dir: PathBuf,

    /// Directory holding the local sound effect files.
    pub sounds_dir: PathBuf,

    /// Tokens such as `[咳嗽]` that play a local file instead of speaking.
    pub sound_library: BTreeMap<String, SoundAction>,

    /// Words that make the server append an assistant reply.
    pub trigger_keywords: Vec<String>,

    /// Words replaced with `**` before synthesis.
    pub sensitive_words: Vec<String>,

    pub split_threshold: usize,
    pub max_chunk_chars: usize,

    /// Threads sending chunk requests.
    pub sender_workers: usize,

    /// New scripts are accepted while unprocessed work is below this.
    pub admission_limit: usize,

    /// Number of recent auto lines kept before older ones are cancelled.
    pub cancel_window: usize,

    pub max_frame_bytes: usize,

    /// Listener sleep while no socket is established.
    pub reconnect_interval_ms: u64,

    pub player: PlayerConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ClientConfig {
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: DEFAULT_SERVER_PORT,
            output_dir: PathBuf::from("tts_output"),
            sounds_dir: PathBuf::from("sounds"),
            sound_library: default_sound_library(),
            trigger_keywords: Vec::new(),
            sensitive_words: Vec::new(),
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
            sender_workers: 4,
            admission_limit: 5,
            cancel_window: 5,
            max_frame_bytes: DEFAULT_MAX_FRAME_LEN,
            reconnect_interval_ms: 1000,
            player: PlayerConfig::default(),
        }
    }

    /// Read `path`, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = read_json(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// `host:port` of the server.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    #[must_use]
    pub const fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(process_env)
    }

    /// Apply overrides using `lookup` in place of the process environment.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(ENV_SERVER_HOST) {
            self.server_host = host;
        }
        if let Some(port) = lookup(ENV_SERVER_PORT) {
            self.server_port = port.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: ENV_SERVER_PORT,
                value: port,
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_host.trim().is_empty() {
            return Err(ConfigError::Invalid("server_host must not be empty".to_string()));
        }
        if self.server_port == 0 {
            return Err(ConfigError::Invalid("server_port must not be 0".to_string()));
        }
        if self.player.program.trim().is_empty() {
            return Err(ConfigError::Invalid("player.program must not be empty".to_string()));
        }
        require_positive("max_chunk_chars", self.max_chunk_chars)?;
        require_positive("sender_workers", self.sender_workers)?;
        require_positive("admission_limit", self.admission_limit)?;
        require_positive("cancel_window", self.cancel_window)?;
        require_positive("max_frame_bytes", self.max_frame_bytes)?;
        if let Some((token, _)) = self
            .sound_library
            .iter()
            .find(|(_, action)| matches!(action, SoundAction::Weighted(v) if v.is_empty()))
        {
            return Err(ConfigError::Invalid(format!(
                "sound {token} has no files to choose from"
            )));
        }
        Ok(())
    }
}
