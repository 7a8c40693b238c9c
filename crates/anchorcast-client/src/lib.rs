#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod cancel;
pub mod client;
pub mod connection;
pub mod counters;
pub mod dispatcher;
pub mod error;
mod listener;
pub mod playback;
pub mod reassembly;
mod session;

// Re-export key types for convenience
pub use cancel::CancellationWindow;
pub use client::AnnouncerClient;
pub use connection::{Connection, ConnectionState, Reception};
pub use counters::{CounterSnapshot, PendingCounters};
pub use dispatcher::Dispatcher;
pub use error::ClientError;
pub use playback::{CommandPlayer, NowPlayingCallback, PlaybackItem, PlaybackQueue, Player};
pub use reassembly::{AssembledAudio, ChunkSlot, CompletedRequest, ReassemblyBuffer};

