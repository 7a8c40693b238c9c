//! Concrete collaborators the server can run with.
//!
//! | Module      | Port                  | What it talks to                     |
//! |-------------|-----------------------|--------------------------------------|
//! | [`http`]    | `SynthesisBackend`    | GPT-SoVITS style `POST /tts` service |
//! | [`replies`] | `AssistantResponder`  | keyword → canned lines table         |

pub mod http;
pub mod replies;

use std::sync::Arc;

use anchorcast_core::{AssistantResponder, ServerConfig, SynthesisBackend};

pub use http::HttpSynthesisBackend;
pub use replies::CannedResponder;

use crate::error::ServerError;

/// Everything a synthesis job may call.
#[derive(Clone)]
pub struct Backends {
    /// Main voice.
    pub main: Arc<dyn SynthesisBackend>,
    /// Assistant voice for voice tests and keyword replies.
    pub assistant: Option<Arc<dyn SynthesisBackend>>,
    /// Writes the assistant's keyword replies.
    pub responder: Option<Arc<dyn AssistantResponder>>,
}

impl Backends {
    #[must_use]
    pub fn new(main: Arc<dyn SynthesisBackend>) -> Self {
        Self {
            main,
            assistant: None,
            responder: None,
        }
    }

    #[must_use]
    pub fn with_assistant(mut self, assistant: Arc<dyn SynthesisBackend>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    #[must_use]
    pub fn with_responder(mut self, responder: Arc<dyn AssistantResponder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Build the HTTP backends and reply table described by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let mut backends = Self::new(Arc::new(HttpSynthesisBackend::new(
            "main",
            config.synthesis.clone(),
        )?));

        if let Some(assistant) = &config.assistant {
            backends = backends.with_assistant(Arc::new(HttpSynthesisBackend::new(
                "assistant",
                assistant.clone(),
            )?));
        }
        if !config.assistant_replies.is_empty() {
            backends = backends.with_responder(Arc::new(CannedResponder::new(
                config.assistant_replies.clone(),
            )));
        }
        Ok(backends)
    }
}
