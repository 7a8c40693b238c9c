//! Collects chunk results until a request is complete.
//!
//! Entries are registered before the first chunk is sent and removed exactly
//! once: when every chunk has an outcome, or when the request is abandoned.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anchorcast_core::protocol::decode_audio;
use anchorcast_core::text::push_joined;
use anchorcast_core::{AssemblyFault, ChunkResponse, Priority, ProtocolFault, concat_wav};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Outcome of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSlot {
    Audio { audio: Vec<u8>, text: String },
    /// The chunk failed; it counts toward completion but is skipped.
    Failed(String),
}

#[derive(Debug)]
struct Entry {
    total_chunks: u32,
    priority: Priority,
    created_at: DateTime<Utc>,
    /// Oldest connection generation any chunk went out on.
    sent_on: Option<u64>,
    slots: BTreeMap<u32, ChunkSlot>,
}

#[derive(Debug, Default)]
struct Entries {
    pending: HashMap<u64, Entry>,
    /// Every generation up to this one is known to be closed.
    dead_through: u64,
}

/// A request whose chunks have all come back.
#[derive(Debug)]
pub struct CompletedRequest {
    pub request_id: u64,
    pub total_chunks: u32,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    slots: BTreeMap<u32, ChunkSlot>,
}

/// Reassembled audio written to disk, ready for the playback queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledAudio {
    pub request_id: u64,
    pub priority: Priority,
    pub path: PathBuf,
    pub text: String,
}

impl CompletedRequest {
    /// Number of chunks that failed.
    #[must_use]
    pub fn failed_chunks(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, ChunkSlot::Failed(_)))
            .count()
    }

    /// Concatenate the successful chunks in chunk order and write the WAV to
    /// `output_dir`.
    pub fn assemble(self, output_dir: &Path) -> Result<AssembledAudio, AssemblyFault> {
        let mut parts = Vec::with_capacity(self.slots.len());
        let mut text = String::new();

        for (chunk_id, slot) in self.slots {
            match slot {
                ChunkSlot::Audio { audio, text: chunk_text } => {
                    push_joined(&mut text, &chunk_text);
                    parts.push((chunk_id, audio));
                }
                ChunkSlot::Failed(reason) => {
                    tracing::debug!(
                        request_id = self.request_id,
                        chunk_id,
                        reason = %reason,
                        "Skipping failed chunk"
                    );
                }
            }
        }

        let wav = concat_wav(parts)?;
        let path = output_dir.join(format!(
            "{}_{}.wav",
            self.request_id,
            self.created_at.timestamp_millis()
        ));
        fs::write(&path, wav)?;

        Ok(AssembledAudio {
            request_id: self.request_id,
            priority: self.priority,
            path,
            text,
        })
    }
}

/// Per-request chunk storage shared by the listener and the senders.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    entries: Mutex<Entries>,
}

impl ReassemblyBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, request_id: u64, total_chunks: u32, priority: Priority) {
        let entry = Entry {
            total_chunks,
            priority,
            created_at: Utc::now(),
            sent_on: None,
            slots: BTreeMap::new(),
        };
        if self.entries.lock().pending.insert(request_id, entry).is_some() {
            tracing::warn!(request_id, "Request id registered twice, old entry replaced");
        }
    }

    /// Store a server response. Returns the request once it is complete.
    pub fn accept(
        &self,
        response: ChunkResponse,
    ) -> Result<Option<CompletedRequest>, ProtocolFault> {
        match response {
            ChunkResponse::Success {
                request_id,
                chunk_id,
                text,
                audio,
                ..
            } => {
                let slot = match decode_audio(&audio) {
                    Ok(audio) if !audio.is_empty() => ChunkSlot::Audio { audio, text },
                    Ok(_) => ChunkSlot::Failed("empty audio".to_string()),
                    Err(e) => ChunkSlot::Failed(e.to_string()),
                };
                self.store(request_id, chunk_id, slot)
            }
            ChunkResponse::Error {
                request_id,
                chunk_id,
                message,
            } => {
                tracing::warn!(request_id, chunk_id, message = %message, "Server reported chunk failure");
                self.store(request_id, chunk_id, ChunkSlot::Failed(message))
            }
        }
    }

    /// Record a chunk that never reached the server.
    pub fn record_failure(
        &self,
        request_id: u64,
        chunk_id: u32,
        reason: impl Into<String>,
    ) -> Result<Option<CompletedRequest>, ProtocolFault> {
        self.store(request_id, chunk_id, ChunkSlot::Failed(reason.into()))
    }

    /// Note that a chunk of `request_id` went out on connection `generation`.
    ///
    /// Returns the request if that connection has already been declared
    /// closed, since its response can no longer arrive.
    pub fn mark_sent(&self, request_id: u64, generation: u64) -> Option<CompletedRequest> {
        let mut entries = self.entries.lock();
        let dead = generation <= entries.dead_through;
        let entry = entries.pending.get_mut(&request_id)?;
        entry.sent_on = Some(entry.sent_on.map_or(generation, |g| g.min(generation)));
        if !dead {
            return None;
        }
        entries
            .pending
            .remove(&request_id)
            .map(|entry| complete(request_id, entry))
    }

    /// Remove the requests that sent a chunk on a connection at or before
    /// `generation`. Requests with nothing on the wire yet are kept.
    pub fn abandon_through(&self, generation: u64) -> Vec<CompletedRequest> {
        let mut entries = self.entries.lock();
        entries.dead_through = entries.dead_through.max(generation);

        let lost: Vec<u64> = entries
            .pending
            .iter()
            .filter(|(_, entry)| entry.sent_on.is_some_and(|g| g <= generation))
            .map(|(id, _)| *id)
            .collect();
        lost.into_iter()
            .filter_map(|id| entries.pending.remove(&id).map(|entry| complete(id, entry)))
            .collect()
    }

    /// Remove every pending request. Used when responses can no longer arrive.
    pub fn abandon_all(&self) -> Vec<CompletedRequest> {
        self.entries
            .lock()
            .pending
            .drain()
            .map(|(request_id, entry)| complete(request_id, entry))
            .collect()
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.entries.lock().pending.len()
    }

    #[must_use]
    pub fn contains(&self, request_id: u64) -> bool {
        self.entries.lock().pending.contains_key(&request_id)
    }

    fn store(
        &self,
        request_id: u64,
        chunk_id: u32,
        slot: ChunkSlot,
    ) -> Result<Option<CompletedRequest>, ProtocolFault> {
        let mut entries = self.entries.lock();
        let entry = entries
            .pending
            .get_mut(&request_id)
            .ok_or(ProtocolFault::UnknownRequest(request_id))?;

        if chunk_id == 0 || chunk_id > entry.total_chunks {
            return Err(ProtocolFault::ChunkOutOfRange {
                chunk_id,
                total_chunks: entry.total_chunks,
            });
        }

        if entry.slots.insert(chunk_id, slot).is_some() {
            tracing::debug!(request_id, chunk_id, "Duplicate chunk replaced");
        }

        if entry.slots.len() < entry.total_chunks as usize {
            return Ok(None);
        }

        Ok(entries
            .pending
            .remove(&request_id)
            .map(|entry| complete(request_id, entry)))
    }
}

fn complete(request_id: u64, entry: Entry) -> CompletedRequest {
    CompletedRequest {
        request_id,
        total_chunks: entry.total_chunks,
        priority: entry.priority,
        created_at: entry.created_at,
        slots: entry.slots,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchorcast_core::{ChunkRequest, RequestType};
    use std::io::Cursor;

    fn wav(samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 32_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn samples(path: &Path) -> Vec<i16> {
        hound::WavReader::open(path)
            .unwrap()
            .samples::<i16>()
            .map(Result::unwrap)
            .collect()
    }

    fn request(request_id: u64, chunk_id: u32, total_chunks: u32) -> ChunkRequest {
        ChunkRequest {
            request_id,
            chunk_id,
            total_chunks,
            priority: Priority::Normal,
            text: format!("[{chunk_id}]"),
            request_type: RequestType::Default,
            triggered_keyword: None,
        }
    }

    #[test]
    fn out_of_order_chunks_assemble_in_chunk_order() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = ReassemblyBuffer::new();
        buffer.register(1, 3, Priority::Normal);

        for chunk_id in [3, 1] {
            let response = ChunkResponse::success(&request(1, chunk_id, 3), &wav(&[chunk_id as i16]));
            assert!(buffer.accept(response).unwrap().is_none());
        }
        let done = buffer
            .accept(ChunkResponse::success(&request(1, 2, 3), &wav(&[2])))
            .unwrap()
            .unwrap();
        assert!(!buffer.contains(1));

        let audio = done.assemble(dir.path()).unwrap();
        assert_eq!(audio.text, "[1] [2] [3]");
        assert_eq!(samples(&audio.path), vec![1, 2, 3]);
    }

    #[test]
    fn failed_chunk_is_skipped_but_counts() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = ReassemblyBuffer::new();
        buffer.register(5, 3, Priority::Auto);

        buffer
            .accept(ChunkResponse::success(&request(5, 1, 3), &wav(&[10])))
            .unwrap();
        buffer
            .accept(ChunkResponse::error(&request(5, 2, 3), "model crashed"))
            .unwrap();
        let done = buffer
            .accept(ChunkResponse::success(&request(5, 3, 3), &wav(&[30])))
            .unwrap()
            .unwrap();

        assert_eq!(done.failed_chunks(), 1);
        assert_eq!(done.priority, Priority::Auto);
        let audio = done.assemble(dir.path()).unwrap();
        assert_eq!(samples(&audio.path), vec![10, 30]);
        assert_eq!(audio.text, "[1] [3]");
    }

    #[test]
    fn display_text_keeps_spaces_between_english_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = ReassemblyBuffer::new();

        for (request_id, texts, expected) in [
            (8, ["This one is long.", "This one too."], "This one is long. This one too."),
            (9, ["第一句很长。", "第二句。"], "第一句很长。第二句。"),
        ] {
            buffer.register(request_id, 2, Priority::Normal);
            let mut done = None;
            for (chunk_id, text) in (1..=2).zip(texts) {
                let mut req = request(request_id, chunk_id, 2);
                req.text = text.to_string();
                done = buffer.accept(ChunkResponse::success(&req, &wav(&[1]))).unwrap();
            }
            let audio = done.unwrap().assemble(dir.path()).unwrap();
            assert_eq!(audio.text, expected);
        }
    }

    #[test]
    fn all_failed_is_an_assembly_fault() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = ReassemblyBuffer::new();
        buffer.register(2, 1, Priority::Normal);
        let done = buffer.record_failure(2, 1, "send failed").unwrap().unwrap();
        assert!(matches!(done.assemble(dir.path()), Err(AssemblyFault::NoAudio)));
    }

    #[test]
    fn bad_base64_becomes_a_failed_slot() {
        let buffer = ReassemblyBuffer::new();
        buffer.register(3, 1, Priority::Normal);
        let response = ChunkResponse::Success {
            request_id: 3,
            chunk_id: 1,
            total_chunks: 1,
            priority: Priority::Normal,
            text: "x".to_string(),
            audio: "%%%".to_string(),
        };
        let done = buffer.accept(response).unwrap().unwrap();
        assert_eq!(done.failed_chunks(), 1);
    }

    #[test]
    fn duplicate_chunk_does_not_count_twice() {
        let buffer = ReassemblyBuffer::new();
        buffer.register(4, 2, Priority::Normal);
        let first = ChunkResponse::success(&request(4, 1, 2), &wav(&[1]));
        assert!(buffer.accept(first.clone()).unwrap().is_none());
        assert!(buffer.accept(first).unwrap().is_none());
        assert!(buffer.contains(4));
    }

    #[test]
    fn unknown_and_out_of_range_are_protocol_faults() {
        let buffer = ReassemblyBuffer::new();
        assert!(matches!(
            buffer.accept(ChunkResponse::error(&request(99, 1, 1), "x")),
            Err(ProtocolFault::UnknownRequest(99))
        ));

        buffer.register(7, 2, Priority::Normal);
        assert!(matches!(
            buffer.accept(ChunkResponse::error(&request(7, 3, 2), "x")),
            Err(ProtocolFault::ChunkOutOfRange { chunk_id: 3, total_chunks: 2 })
        ));
        assert!(matches!(
            buffer.accept(ChunkResponse::error(&request(7, 0, 2), "x")),
            Err(ProtocolFault::ChunkOutOfRange { chunk_id: 0, .. })
        ));
    }

    #[test]
    fn abandon_all_empties_the_buffer() {
        let buffer = ReassemblyBuffer::new();
        buffer.register(1, 2, Priority::Normal);
        buffer.register(2, 1, Priority::Auto);
        let abandoned = buffer.abandon_all();
        assert_eq!(abandoned.len(), 2);
        assert_eq!(buffer.pending(), 0);
    }

    #[test]
    fn abandon_through_keeps_requests_on_newer_connections() {
        let buffer = ReassemblyBuffer::new();
        buffer.register(1, 2, Priority::Normal);
        buffer.register(2, 1, Priority::Normal);
        buffer.register(3, 1, Priority::Normal);

        assert!(buffer.mark_sent(1, 1).is_none());
        assert!(buffer.mark_sent(1, 2).is_none());
        assert!(buffer.mark_sent(2, 2).is_none());

        let abandoned = buffer.abandon_through(1);
        assert_eq!(abandoned.len(), 1);
        assert_eq!(abandoned[0].request_id, 1);
        assert!(buffer.contains(2));
        assert!(buffer.contains(3), "unsent request must survive");
    }

    #[test]
    fn send_on_a_closed_connection_is_abandoned_at_once() {
        let buffer = ReassemblyBuffer::new();
        buffer.register(4, 2, Priority::Auto);
        assert!(buffer.abandon_through(3).is_empty());

        let lost = buffer.mark_sent(4, 3).unwrap();
        assert_eq!(lost.request_id, 4);
        assert_eq!(buffer.pending(), 0);
        assert!(buffer.mark_sent(4, 4).is_none());
    }
}
