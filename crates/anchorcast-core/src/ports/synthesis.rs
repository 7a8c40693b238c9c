//! Speech synthesis port.

use thiserror::Error;

/// Why a synthesis call produced no audio.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SynthesisFault {
    /// The backend rejected the request or could not be reached.
    #[error("synthesis request failed: {0}")]
    Request(String),

    /// The backend answered with zero bytes of audio.
    #[error("synthesis returned no audio")]
    Empty,

    /// No backend is configured for this kind of request.
    #[error("{0} voice is not configured")]
    Unavailable(&'static str),
}

/// Turns text into WAV bytes.
///
/// The reference voice and all model parameters are backend configuration;
/// callers only provide text.
pub trait SynthesisBackend: Send + Sync {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisFault>;

    /// Short label used in logs.
    fn name(&self) -> &str;
}
