//! Synthesis jobs and the two tiered worker pools that run them.
//!
//! Urgent chunks (test, interrupt, auto) and normal chunks never share
//! workers, so a long scripted backlog cannot delay a barge-in line.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anchorcast_core::{
    ChunkRequest, ChunkResponse, PoolClosed, PriorityTier, RequestType, SynthesisBackend,
    SynthesisFault, WorkerPool, concat_wav, write_frame,
};
use parking_lot::Mutex;

use crate::backend::Backends;

/// Write half of one client connection.
///
/// Every response for the connection goes through [`send`](Self::send), which
/// holds the lock for the whole frame.
pub struct PeerWriter {
    addr: SocketAddr,
    stream: Mutex<Box<dyn std::io::Write + Send>>,
}

impl PeerWriter {
    pub fn new(addr: SocketAddr, stream: impl std::io::Write + Send + 'static) -> Self {
        Self {
            addr,
            stream: Mutex::new(Box::new(stream)),
        }
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Frame and write one response. Failures are logged; the reader thread
    /// notices a dead peer on its own.
    pub fn send(&self, response: &ChunkResponse) {
        let payload = match response.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode response");
                return;
            }
        };

        let mut stream = self.stream.lock();
        if let Err(e) = write_frame(&mut *stream, &payload) {
            tracing::debug!(
                peer = %self.addr,
                request_id = response.request_id(),
                chunk_id = response.chunk_id(),
                error = %e,
                "Dropping response for closed connection"
            );
        }
    }
}

/// One chunk waiting for a worker.
pub struct SynthesisJob {
    pub request: ChunkRequest,
    pub peer: Arc<PeerWriter>,
}

/// Urgent and normal worker pools sharing one set of backends.
pub struct Scheduler {
    urgent: WorkerPool<SynthesisJob>,
    normal: WorkerPool<SynthesisJob>,
}

impl Scheduler {
    pub fn start(
        backends: Backends,
        urgent_workers: usize,
        normal_workers: usize,
    ) -> std::io::Result<Self> {
        let backends = Arc::new(backends);

        let urgent = {
            let backends = Arc::clone(&backends);
            WorkerPool::spawn("synth-urgent", urgent_workers, move |job| {
                run_job(&backends, &job);
            })?
        };
        let normal = WorkerPool::spawn("synth-normal", normal_workers, move |job| {
            run_job(&backends, &job);
        })?;

        Ok(Self { urgent, normal })
    }

    /// Queue a chunk on the pool for its priority tier.
    pub fn submit(&self, job: SynthesisJob) -> Result<(), PoolClosed> {
        self.pool(job.request.priority.tier()).submit(job)
    }

    /// Jobs waiting for a worker in `tier`.
    #[must_use]
    pub fn queued(&self, tier: PriorityTier) -> usize {
        self.pool(tier).queued()
    }

    /// Drop every chunk not yet handed to a backend. Calls already running
    /// still complete.
    pub fn discard_queued(&self) {
        self.urgent.discard_queued();
        self.normal.discard_queued();
    }

    const fn pool(&self, tier: PriorityTier) -> &WorkerPool<SynthesisJob> {
        match tier {
            PriorityTier::Urgent => &self.urgent,
            PriorityTier::Normal => &self.normal,
        }
    }
}

fn run_job(backends: &Backends, job: &SynthesisJob) {
    let request = &job.request;
    let started = Instant::now();
    let response = synthesize_chunk(backends, request);

    if let ChunkResponse::Error { message, .. } = &response {
        tracing::warn!(
            request_id = request.request_id,
            chunk_id = request.chunk_id,
            error = %message,
            "Chunk synthesis failed"
        );
    } else {
        tracing::debug!(
            request_id = request.request_id,
            chunk_id = request.chunk_id,
            total_chunks = request.total_chunks,
            priority = %request.priority,
            elapsed_ms = started.elapsed().as_millis(),
            "Chunk synthesized"
        );
    }

    job.peer.send(&response);
}

/// Produce the response for one chunk.
pub fn synthesize_chunk(backends: &Backends, request: &ChunkRequest) -> ChunkResponse {
    let voice: &dyn SynthesisBackend = match request.request_type {
        RequestType::TestAssistant => match &backends.assistant {
            Some(assistant) => assistant.as_ref(),
            None => {
                return ChunkResponse::error(
                    request,
                    SynthesisFault::Unavailable("assistant").to_string(),
                );
            }
        },
        RequestType::Default | RequestType::TestMain => backends.main.as_ref(),
    };

    match voice.synthesize(&request.text) {
        Ok(audio) => {
            let audio = match (request.request_type, &request.triggered_keyword) {
                (RequestType::Default, Some(keyword)) => {
                    append_side_kick(backends, request, keyword, audio)
                }
                _ => audio,
            };
            ChunkResponse::success(request, &audio)
        }
        Err(fault) => ChunkResponse::error(request, fault.to_string()),
    }
}

/// Append the assistant's reply to `main`, or return `main` untouched if
/// any step fails.
fn append_side_kick(
    backends: &Backends,
    request: &ChunkRequest,
    keyword: &str,
    main: Vec<u8>,
) -> Vec<u8> {
    let (Some(responder), Some(assistant)) = (&backends.responder, &backends.assistant) else {
        tracing::debug!(keyword, "No assistant configured for keyword reply");
        return main;
    };

    let Some(line) = responder.respond(&request.text, keyword) else {
        return main;
    };

    let extra = match assistant.synthesize(&line) {
        Ok(extra) => extra,
        Err(e) => {
            tracing::warn!(
                request_id = request.request_id,
                chunk_id = request.chunk_id,
                keyword,
                error = %e,
                "Assistant reply synthesis failed"
            );
            return main;
        }
    };

    match concat_wav(vec![(1, main.clone()), (2, extra)]) {
        Ok(joined) => {
            tracing::info!(
                request_id = request.request_id,
                chunk_id = request.chunk_id,
                keyword,
                line = %line,
                "Assistant reply appended"
            );
            joined
        }
        Err(e) => {
            tracing::warn!(
                request_id = request.request_id,
                chunk_id = request.chunk_id,
                error = %e,
                "Could not join assistant reply"
            );
            main
        }
    }
}
