#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod backend;
pub mod error;
pub mod scheduler;
pub mod server;

// Re-export key types for convenience
pub use backend::{Backends, CannedResponder, HttpSynthesisBackend};
pub use error::ServerError;
pub use scheduler::{PeerWriter, Scheduler, SynthesisJob, synthesize_chunk};
pub use server::{RunningServer, ShutdownHandle, SynthesisServer};
