//! JSON payloads carried inside frames.
//!
//! The client sends one [`ChunkRequest`] per text chunk; the server answers
//! each with a [`ChunkResponse`], in whatever order synthesis finishes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::ProtocolFault;
use super::priority::Priority;

/// What kind of synthesis the client is asking for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Normal speech in the main voice.
    #[default]
    Default,
    /// Operator voice check of the main voice.
    TestMain,
    /// Operator voice check of the assistant voice.
    TestAssistant,
}

/// One chunk of a spoken line, sent client → server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRequest {
    pub request_id: u64,
    /// 1-based position within the request.
    pub chunk_id: u32,
    pub total_chunks: u32,
    pub priority: Priority,
    pub text: String,
    #[serde(default)]
    pub request_type: RequestType,
    /// First configured trigger keyword found in `text`, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_keyword: Option<String>,
}

/// Server → client answer for a single chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChunkResponse {
    Success {
        request_id: u64,
        chunk_id: u32,
        total_chunks: u32,
        priority: Priority,
        text: String,
        /// Base64-encoded audio bytes.
        audio: String,
    },
    Error {
        request_id: u64,
        chunk_id: u32,
        message: String,
    },
}

impl ChunkRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolFault> {
        encode(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolFault> {
        decode(bytes)
    }
}

impl ChunkResponse {
    /// Build a success response for `request`, encoding `audio` as base64.
    #[must_use]
    pub fn success(request: &ChunkRequest, audio: &[u8]) -> Self {
        Self::Success {
            request_id: request.request_id,
            chunk_id: request.chunk_id,
            total_chunks: request.total_chunks,
            priority: request.priority,
            text: request.text.clone(),
            audio: BASE64.encode(audio),
        }
    }

    /// Build an error response for `request`.
    #[must_use]
    pub fn error(request: &ChunkRequest, message: impl Into<String>) -> Self {
        Self::Error {
            request_id: request.request_id,
            chunk_id: request.chunk_id,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn request_id(&self) -> u64 {
        match self {
            Self::Success { request_id, .. } | Self::Error { request_id, .. } => *request_id,
        }
    }

    #[must_use]
    pub const fn chunk_id(&self) -> u32 {
        match self {
            Self::Success { chunk_id, .. } | Self::Error { chunk_id, .. } => *chunk_id,
        }
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolFault> {
        encode(self)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolFault> {
        decode(bytes)
    }
}

/// Decode the base64 `audio` field of a success response.
pub fn decode_audio(encoded: &str) -> Result<Vec<u8>, ProtocolFault> {
    Ok(BASE64.decode(encoded)?)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolFault> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolFault> {
    Ok(serde_json::from_slice(bytes)?)
}
