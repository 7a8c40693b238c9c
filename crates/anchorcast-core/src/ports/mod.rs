//! Port definitions for the collaborators anchorcast talks to.
//!
//! # Design Rules
//!
//! - Ports are synchronous; callers run them on their own worker threads.
//! - No transport or process details leak into signatures.
//! - Implementations must be `Send + Sync` so one instance can be shared
//!   across a worker pool.

pub mod playback;
pub mod responder;
pub mod synthesis;

pub use playback::{PlaybackError, PlaybackSink};
pub use responder::AssistantResponder;
pub use synthesis::{SynthesisBackend, SynthesisFault};
