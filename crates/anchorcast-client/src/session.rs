//! State shared by the dispatcher, the senders, the listener and the player.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anchorcast_core::{ChunkRequest, ChunkResponse, ClientConfig, Priority};

use crate::cancel::CancellationWindow;
use crate::connection::Connection;
use crate::counters::PendingCounters;
use crate::playback::{PlaybackItem, PlaybackQueue};
use crate::reassembly::{CompletedRequest, ReassemblyBuffer};

pub(crate) struct Session {
    pub(crate) config: ClientConfig,
    pub(crate) connection: Connection,
    pub(crate) reassembly: ReassemblyBuffer,
    pub(crate) queue: Arc<PlaybackQueue>,
    pub(crate) counters: Arc<PendingCounters>,
    pub(crate) cancel: Arc<CancellationWindow>,
    last_request_id: AtomicU64,
}

impl Session {
    pub(crate) fn new(config: ClientConfig) -> Self {
        let connection = Connection::new(config.server_addr(), config.max_frame_bytes);
        let cancel = Arc::new(CancellationWindow::new(config.cancel_window));
        Self {
            config,
            connection,
            reassembly: ReassemblyBuffer::new(),
            queue: Arc::new(PlaybackQueue::new()),
            counters: Arc::new(PendingCounters::new()),
            cancel,
            last_request_id: AtomicU64::new(0),
        }
    }

    /// Ids start at 1 and are never reused within the process.
    pub(crate) fn next_request_id(&self) -> u64 {
        self.last_request_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Allocate an id for a request of `total_chunks` and start tracking it.
    ///
    /// Every chunk counts as in flight before the first one can be sent.
    pub(crate) fn open_request(&self, total_chunks: u32, priority: Priority) -> u64 {
        let request_id = self.next_request_id();
        self.counters.add_in_flight(total_chunks as usize);
        self.reassembly.register(request_id, total_chunks, priority);
        if priority == Priority::Auto {
            self.cancel.register(request_id);
        }
        request_id
    }

    /// Queue a local sound effect for playback.
    pub(crate) fn enqueue_asset(&self, item: PlaybackItem) {
        self.counters.enqueue(item.priority.tier());
        self.queue.push(item);
    }

    /// Sender-pool job: put one chunk on the wire.
    pub(crate) fn send_chunk(&self, request: &ChunkRequest) {
        let result = request
            .to_bytes()
            .map_err(|e| e.to_string())
            .and_then(|bytes| self.connection.send(&bytes).map_err(|e| e.to_string()));

        match result {
            Ok(generation) => {
                tracing::debug!(
                    request_id = request.request_id,
                    chunk_id = request.chunk_id,
                    total_chunks = request.total_chunks,
                    generation,
                    "Chunk sent"
                );
                if let Some(lost) = self.reassembly.mark_sent(request.request_id, generation) {
                    self.abandon(vec![lost], "connection closed during send");
                }
            }
            Err(reason) => self.fail_chunk(request.request_id, request.chunk_id, &reason),
        }
    }

    /// Mark a chunk as failed locally so its request can still complete.
    pub(crate) fn fail_chunk(&self, request_id: u64, chunk_id: u32, reason: &str) {
        tracing::warn!(request_id, chunk_id, reason, "Chunk not delivered");
        match self.reassembly.record_failure(request_id, chunk_id, reason) {
            Ok(Some(completed)) => self.finish(completed),
            Ok(None) => {}
            // The request was already abandoned
            Err(e) => tracing::debug!(error = %e, "Dropping late chunk failure"),
        }
    }

    /// Listener entry point for one inbound frame.
    pub(crate) fn handle_packet(&self, bytes: &[u8]) {
        let response = match ChunkResponse::from_slice(bytes) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed response");
                return;
            }
        };

        match self.reassembly.accept(response) {
            Ok(Some(completed)) => self.finish(completed),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Discarding response"),
        }
    }

    /// Turn a completed request into a playback item. Runs exactly once per
    /// request, and always releases its in-flight chunks.
    pub(crate) fn finish(&self, completed: CompletedRequest) {
        let request_id = completed.request_id;
        let chunks = completed.total_chunks as usize;
        let failed = completed.failed_chunks();

        match completed.assemble(&self.config.output_dir) {
            Ok(audio) => {
                tracing::info!(
                    request_id,
                    chunks,
                    failed,
                    priority = %audio.priority,
                    "Request reassembled"
                );
                self.counters.promote(chunks, audio.priority.tier());
                self.queue.push(PlaybackItem {
                    priority: audio.priority,
                    sequence: request_id,
                    path: audio.path,
                    text: audio.text,
                    is_asset: false,
                });
            }
            Err(e) => {
                tracing::error!(request_id, chunks, failed, error = %e, "Dropping request");
                self.counters.release_in_flight(chunks);
                self.cancel.forget(request_id);
            }
        }
    }

    /// Give up on the requests that sent a chunk on connection `generation`
    /// or an older one. Requests sent on a newer socket keep waiting.
    pub(crate) fn abandon_sent_through(&self, generation: u64, cause: &str) {
        self.abandon(self.reassembly.abandon_through(generation), cause);
    }

    /// Give up on every request still waiting for responses.
    pub(crate) fn abandon_pending(&self, cause: &str) {
        self.abandon(self.reassembly.abandon_all(), cause);
    }

    fn abandon(&self, abandoned: Vec<CompletedRequest>, cause: &str) {
        if abandoned.is_empty() {
            return;
        }
        tracing::warn!(requests = abandoned.len(), cause, "Abandoning pending requests");
        for request in abandoned {
            self.counters.release_in_flight(request.total_chunks as usize);
            self.cancel.forget(request.request_id);
        }
    }
}
