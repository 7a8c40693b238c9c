//! TCP front end: accept loop and one reader thread per connection.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anchorcast_core::{ChunkRequest, ServerConfig, read_frame};
use parking_lot::Mutex;

use crate::backend::Backends;
use crate::error::ServerError;
use crate::scheduler::{PeerWriter, Scheduler, SynthesisJob};

/// How often the accept loop checks for shutdown while idle.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Cloneable flag that asks a running server to stop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Open client sockets, kept so shutdown can unblock their readers.
#[derive(Default)]
struct Connections {
    next_id: AtomicU64,
    open: Mutex<HashMap<u64, TcpStream>>,
}

impl Connections {
    fn insert(&self, stream: TcpStream) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.open.lock().insert(id, stream);
        id
    }

    fn remove(&self, id: u64) {
        self.open.lock().remove(&id);
    }

    fn len(&self) -> usize {
        self.open.lock().len()
    }

    fn close_all(&self) {
        for (_, stream) in self.open.lock().drain() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

/// A bound synthesis server that has not started accepting yet.
pub struct SynthesisServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ServerConfig,
    backends: Backends,
    shutdown: ShutdownHandle,
}

impl SynthesisServer {
    /// Bind the listening socket. Workers start in [`run`](Self::run).
    pub fn bind(config: &ServerConfig, backends: Backends) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(&config.bind).map_err(|source| ServerError::Bind {
            addr: config.bind.clone(),
            source,
        })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            config: config.clone(),
            backends,
            shutdown: ShutdownHandle::default(),
        })
    }

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Serve until the shutdown handle fires.
    ///
    /// On the way out every client socket is shut down, reader threads are
    /// joined and queued jobs are drained; their responses go nowhere.
    pub fn run(self) -> Result<(), ServerError> {
        let scheduler = Arc::new(Scheduler::start(
            self.backends,
            self.config.urgent_workers,
            self.config.normal_workers,
        )?);
        let connections = Arc::new(Connections::default());
        let mut readers: Vec<JoinHandle<()>> = Vec::new();

        self.listener.set_nonblocking(true)?;
        tracing::info!(
            addr = %self.local_addr,
            urgent_workers = self.config.urgent_workers,
            normal_workers = self.config.normal_workers,
            "Synthesis server listening"
        );

        while !self.shutdown.is_shutdown() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    match start_reader(
                        stream,
                        peer,
                        &scheduler,
                        &connections,
                        self.config.max_frame_bytes,
                        &self.shutdown,
                    ) {
                        Ok(handle) => readers.push(handle),
                        Err(e) => tracing::warn!(peer = %peer, error = %e, "Rejected connection"),
                    }
                    readers.retain(|handle| !handle.is_finished());
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    thread::sleep(ACCEPT_POLL);
                }
            }
        }

        tracing::info!(open_connections = connections.len(), "Synthesis server stopping");
        scheduler.discard_queued();
        connections.close_all();
        for handle in readers {
            if handle.join().is_err() {
                tracing::warn!("Connection reader panicked");
            }
        }
        drop(scheduler);
        tracing::info!("Synthesis server stopped");
        Ok(())
    }

    /// Run on a background thread.
    pub fn spawn(self) -> Result<RunningServer, ServerError> {
        let addr = self.local_addr;
        let shutdown = self.shutdown_handle();
        let thread = thread::Builder::new()
            .name("anchorcast-server".to_string())
            .spawn(move || self.run())
            .map_err(|source| ServerError::Spawn {
                name: "anchorcast-server",
                source,
            })?;

        Ok(RunningServer {
            addr,
            shutdown,
            thread: Some(thread),
        })
    }
}

/// Handle to a server started with [`SynthesisServer::spawn`].
///
/// Dropping it stops the server.
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: ShutdownHandle,
    thread: Option<JoinHandle<Result<(), ServerError>>>,
}

impl RunningServer {
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Stop accepting, close all connections and wait for the server thread.
    pub fn stop(mut self) -> Result<(), ServerError> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> Result<(), ServerError> {
        self.shutdown.shutdown();
        match self.thread.take() {
            Some(handle) => handle.join().map_err(|_| ServerError::Panicked)?,
            None => Ok(()),
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_and_join() {
            tracing::warn!(error = %e, "Synthesis server did not stop cleanly");
        }
    }
}

fn start_reader(
    stream: TcpStream,
    peer: SocketAddr,
    scheduler: &Arc<Scheduler>,
    connections: &Arc<Connections>,
    max_frame_len: usize,
    shutdown: &ShutdownHandle,
) -> io::Result<JoinHandle<()>> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    let writer = Arc::new(PeerWriter::new(peer, stream.try_clone()?));
    let id = connections.insert(stream.try_clone()?);

    let scheduler = Arc::clone(scheduler);
    let registry = Arc::clone(connections);
    let shutdown = shutdown.clone();
    let spawned = thread::Builder::new()
        .name(format!("conn-{peer}"))
        .spawn(move || {
            serve_connection(stream, &writer, &scheduler, max_frame_len, &shutdown);
            registry.remove(id);
        });

    if spawned.is_err() {
        connections.remove(id);
    }
    spawned
}

/// Read requests until the peer goes away, handing each to the scheduler.
fn serve_connection(
    mut stream: TcpStream,
    writer: &Arc<PeerWriter>,
    scheduler: &Scheduler,
    max_frame_len: usize,
    shutdown: &ShutdownHandle,
) {
    let peer = writer.addr();
    tracing::info!(peer = %peer, "Client connected");

    loop {
        let frame = match read_frame(&mut stream, max_frame_len) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::info!(peer = %peer, "Client disconnected");
                break;
            }
            Err(e) => {
                if shutdown.is_shutdown() {
                    tracing::debug!(peer = %peer, "Connection closed for shutdown");
                } else {
                    tracing::warn!(peer = %peer, error = %e, "Connection dropped");
                }
                break;
            }
        };

        let request = match ChunkRequest::from_slice(&frame) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    peer = %peer,
                    error = %e,
                    bytes = frame.len(),
                    "Discarding malformed request"
                );
                continue;
            }
        };

        tracing::debug!(
            peer = %peer,
            request_id = request.request_id,
            chunk_id = request.chunk_id,
            total_chunks = request.total_chunks,
            priority = %request.priority,
            "Chunk received"
        );

        let job = SynthesisJob {
            request,
            peer: Arc::clone(writer),
        };
        if let Err(e) = scheduler.submit(job) {
            tracing::error!(peer = %peer, error = %e, "Worker pool closed");
            break;
        }
    }

    let _ = stream.shutdown(Shutdown::Both);
}
