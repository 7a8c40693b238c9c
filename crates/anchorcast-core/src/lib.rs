#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod audio;
pub mod config;
pub mod pool;
pub mod ports;
pub mod protocol;
pub mod text;

// Re-export commonly used types for convenience
pub use audio::{AssemblyFault, concat_wav};
pub use config::{
    ClientConfig, ConfigError, PlayerConfig, ServerConfig, SoundAction, SynthesisConfig,
    WeightedSound,
};
pub use pool::{PoolClosed, WorkerPool};
pub use ports::{
    AssistantResponder, PlaybackError, PlaybackSink, SynthesisBackend, SynthesisFault,
};
pub use protocol::{
    ChunkRequest, ChunkResponse, ConnectionFault, Priority, PriorityTier, ProtocolFault,
    RequestType, read_frame, write_frame,
};
pub use text::TextSplitter;

#[cfg(test)]
mod tests {
    const README: &str = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"));

    #[test]
    fn rustdoc_readme_links_point_at_modules() {
        assert!(!README.contains("](src/"));
        assert!(!README.contains(".rs)"));
        assert!(README.contains("[`protocol`](protocol)"));
        assert!(README.contains("[`text`](text)"));
    }
}
