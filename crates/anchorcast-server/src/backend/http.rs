//! GPT-SoVITS `api_v2` style synthesis over HTTP.
//!
//! Each call is one blocking `POST` with a JSON body; a 200 response body is
//! the WAV file.

use anchorcast_core::{SynthesisBackend, SynthesisConfig, SynthesisFault};
use reqwest::blocking::Client;
use serde::Serialize;

use crate::error::ServerError;

/// Longest error body quoted in a fault message.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    text_lang: &'a str,
    ref_audio_path: &'a str,
    prompt_text: &'a str,
    prompt_lang: &'a str,
    text_split_method: &'a str,
    top_k: u32,
    top_p: f32,
    temperature: f32,
    speed_factor: f32,
    sample_steps: u32,
    media_type: &'static str,
    streaming_mode: bool,
}

/// Blocking HTTP client for one voice.
pub struct HttpSynthesisBackend {
    name: String,
    config: SynthesisConfig,
    client: Client,
}

impl HttpSynthesisBackend {
    pub fn new(name: impl Into<String>, config: SynthesisConfig) -> Result<Self, ServerError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(4)
            .build()
            .map_err(ServerError::HttpClient)?;

        Ok(Self {
            name: name.into(),
            config,
            client,
        })
    }

    fn body<'a>(&'a self, text: &'a str) -> TtsRequest<'a> {
        let c = &self.config;
        TtsRequest {
            text,
            text_lang: &c.text_lang,
            ref_audio_path: &c.ref_audio_path,
            prompt_text: &c.prompt_text,
            prompt_lang: &c.prompt_lang,
            text_split_method: &c.text_split_method,
            top_k: c.top_k,
            top_p: c.top_p,
            temperature: c.temperature,
            speed_factor: c.speed_factor,
            sample_steps: c.sample_steps,
            media_type: "wav",
            streaming_mode: false,
        }
    }
}

impl SynthesisBackend for HttpSynthesisBackend {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisFault> {
        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&self.body(text))
            .send()
            .map_err(|e| SynthesisFault::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            return Err(SynthesisFault::Request(format!("HTTP {status}: {body}")));
        }

        let audio = response
            .bytes()
            .map_err(|e| SynthesisFault::Request(e.to_string()))?;
        if audio.is_empty() {
            return Err(SynthesisFault::Empty);
        }
        Ok(audio.to_vec())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
