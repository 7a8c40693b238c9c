//! Auxiliary text generator for the assistant voice.

/// Produces a short side-kick line reacting to a spoken chunk.
///
/// `recent_text` is the chunk that carried `keyword`. Returning `None` means
/// the assistant stays silent.
pub trait AssistantResponder: Send + Sync {
    fn respond(&self, recent_text: &str, keyword: &str) -> Option<String>;
}
