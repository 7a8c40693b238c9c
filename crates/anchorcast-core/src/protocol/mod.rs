//! Client/server wire protocol.
//!
//! A persistent TCP stream carries frames (see [`framing`]); each frame holds a
//! UTF-8 JSON payload (see [`message`]). Responses arrive asynchronously and in
//! no particular order.

pub mod error;
pub mod framing;
pub mod message;
pub mod priority;

pub use error::{ConnectionFault, ProtocolFault};
pub use framing::{DEFAULT_MAX_FRAME_LEN, LENGTH_PREFIX_LEN, read_frame, write_frame};
pub use message::{ChunkRequest, ChunkResponse, RequestType, decode_audio};
pub use priority::{Priority, PriorityTier, UnknownPriority};
