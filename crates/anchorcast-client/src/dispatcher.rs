//! Turns lines of text into chunk requests.

use std::sync::Arc;

use anchorcast_core::text::{find_trigger_keyword, redact};
use anchorcast_core::{ChunkRequest, Priority, RequestType, TextSplitter, WorkerPool};

use crate::error::ClientError;
use crate::playback::PlaybackItem;
use crate::session::Session;

/// Entry point for new lines.
///
/// Chunks are handed to a fixed pool of sender threads, so several chunks of
/// one request may be on the wire at once and complete in any order.
pub struct Dispatcher {
    session: Arc<Session>,
    splitter: TextSplitter,
    senders: WorkerPool<ChunkRequest>,
}

impl Dispatcher {
    pub(crate) fn new(session: Arc<Session>) -> Result<Self, ClientError> {
        let splitter = TextSplitter::new(
            session.config.split_threshold,
            session.config.max_chunk_chars,
        );
        let senders = {
            let session = Arc::clone(&session);
            WorkerPool::spawn(
                "anchorcast-sender",
                session.config.sender_workers,
                move |request: ChunkRequest| session.send_chunk(&request),
            )
            .map_err(|source| ClientError::Spawn {
                name: "sender",
                source,
            })?
        };

        Ok(Self {
            session,
            splitter,
            senders,
        })
    }

    /// Schedule `text` for speech at `priority`.
    ///
    /// Returns the request id, or `None` when there was nothing to schedule
    /// (blank text, or a sound token whose file is missing).
    pub fn add_task(&self, text: &str, priority: Priority) -> Result<Option<u64>, ClientError> {
        if let Some(id) = self.try_local_sound(text, priority) {
            return Ok(id);
        }

        let text = redact(text, &self.session.config.sensitive_words);
        let chunks = self.splitter.split(&text);
        self.dispatch(chunks, priority, RequestType::Default)
    }

    /// Barge in ahead of everything but voice tests.
    pub fn interrupt_and_speak(&self, text: &str) -> Result<Option<u64>, ClientError> {
        self.add_task(text, Priority::Interrupt)
    }

    /// Speak `text` once as a voice check, in the main or assistant voice.
    pub fn test_voice(&self, text: &str, use_assistant: bool) -> Result<Option<u64>, ClientError> {
        let request_type = if use_assistant {
            RequestType::TestAssistant
        } else {
            RequestType::TestMain
        };
        let text = text.trim();
        let chunks = if text.is_empty() {
            Vec::new()
        } else {
            vec![text.to_string()]
        };
        self.dispatch(chunks, Priority::Test, request_type)
    }

    /// `Some(result)` if `text` is a sound token.
    fn try_local_sound(&self, text: &str, priority: Priority) -> Option<Option<u64>> {
        let config = &self.session.config;
        let action = config.sound_library.get(text.trim())?;

        let Some(file) = action.pick(&mut rand::thread_rng()) else {
            tracing::warn!(token = text.trim(), "Sound token has no files");
            return Some(None);
        };
        let path = config.sounds_dir.join(file);
        if !path.is_file() {
            tracing::warn!(token = text.trim(), path = %path.display(), "Sound file missing");
            return Some(None);
        }

        let request_id = self.session.next_request_id();
        tracing::info!(request_id, token = text.trim(), %priority, "Queueing local sound");
        self.session.enqueue_asset(PlaybackItem {
            priority,
            sequence: request_id,
            path,
            text: text.trim().to_string(),
            is_asset: true,
        });
        Some(Some(request_id))
    }

    fn dispatch(
        &self,
        chunks: Vec<String>,
        priority: Priority,
        request_type: RequestType,
    ) -> Result<Option<u64>, ClientError> {
        if chunks.is_empty() {
            tracing::debug!("Nothing to speak");
            return Ok(None);
        }
        let total_chunks = u32::try_from(chunks.len()).unwrap_or(u32::MAX);

        let session = &self.session;
        let request_id = session.open_request(total_chunks, priority);

        tracing::info!(request_id, total_chunks, %priority, "Dispatching request");

        for (chunk_id, text) in (1..=total_chunks).zip(chunks) {
            let triggered_keyword = match request_type {
                RequestType::Default => {
                    find_trigger_keyword(&text, &session.config.trigger_keywords)
                        .map(ToString::to_string)
                }
                RequestType::TestMain | RequestType::TestAssistant => None,
            };
            if let Some(keyword) = &triggered_keyword {
                tracing::debug!(request_id, chunk_id, keyword = %keyword, "Trigger keyword found");
            }

            let request = ChunkRequest {
                request_id,
                chunk_id,
                total_chunks,
                priority,
                text,
                request_type,
                triggered_keyword,
            };

            if let Err(e) = self.senders.submit(request) {
                session.fail_chunk(request_id, chunk_id, &e.to_string());
            }
        }

        Ok(Some(request_id))
    }
}
