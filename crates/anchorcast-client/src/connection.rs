//! The client's single TCP connection to the synthesis server.
//!
//! Senders share one socket behind a lock. The listener never reads while
//! holding that lock: it takes a cloned handle of the current socket together
//! with the socket's generation, reads from the clone, and on failure clears
//! the socket only if the generation still matches.

use std::net::{Shutdown, TcpStream};

use anchorcast_core::protocol::{read_frame, write_frame};
use anchorcast_core::ConnectionFault;
use parking_lot::Mutex;

/// Lifecycle of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// One read attempt and the socket generation it was made on.
#[derive(Debug)]
pub struct Reception {
    pub generation: u64,
    pub frame: Result<Option<Vec<u8>>, ConnectionFault>,
}

#[derive(Debug)]
struct Inner {
    stream: Option<TcpStream>,
    state: ConnectionState,
    generation: u64,
    established: u64,
    closed: bool,
}

/// Socket owner for the client.
///
/// Faults never trigger an inline retry; they clear the socket and the next
/// [`send`](Self::send) reconnects.
#[derive(Debug)]
pub struct Connection {
    addr: String,
    max_frame_len: usize,
    inner: Mutex<Inner>,
}

impl Connection {
    #[must_use]
    pub fn new(addr: impl Into<String>, max_frame_len: usize) -> Self {
        Self {
            addr: addr.into(),
            max_frame_len,
            inner: Mutex::new(Inner {
                stream: None,
                state: ConnectionState::Disconnected,
                generation: 0,
                established: 0,
                closed: false,
            }),
        }
    }

    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.lock().stream.is_some()
    }

    /// Times a socket was established after the first one.
    #[must_use]
    pub fn reconnect_count(&self) -> u64 {
        self.inner.lock().established.saturating_sub(1)
    }

    /// Replace any current socket with a fresh one.
    pub fn connect(&self) -> Result<(), ConnectionFault> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(ConnectionFault::NotConnected);
        }
        self.connect_locked(&mut inner)
    }

    /// Send one frame, connecting first if there is no socket.
    ///
    /// Returns the generation of the socket the frame went out on.
    pub fn send(&self, payload: &[u8]) -> Result<u64, ConnectionFault> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(ConnectionFault::NotConnected);
        }
        if inner.stream.is_none() {
            tracing::info!(addr = %self.addr, "No connection, reconnecting before send");
            self.connect_locked(&mut inner)?;
        }

        let result = match inner.stream.as_ref() {
            Some(stream) => write_frame(&mut &*stream, payload),
            None => Err(ConnectionFault::NotConnected),
        };

        if let Err(e) = &result {
            tracing::warn!(addr = %self.addr, error = %e, "Send failed, dropping connection");
            Self::clear_locked(&mut inner);
        }
        result.map(|()| inner.generation)
    }

    /// Block until one frame arrives on the current socket.
    ///
    /// The frame is `Ok(None)` when the server closed the stream; the socket
    /// is cleared in that case as well as on any fault.
    pub fn receive(&self) -> Reception {
        let (generation, cloned) = {
            let inner = self.inner.lock();
            let cloned = inner
                .stream
                .as_ref()
                .ok_or(ConnectionFault::NotConnected)
                .and_then(|stream| stream.try_clone().map_err(ConnectionFault::from));
            (inner.generation, cloned)
        };

        let frame = cloned.and_then(|mut reader| self.read_from(&mut reader, generation));
        Reception { generation, frame }
    }

    fn read_from(
        &self,
        reader: &mut TcpStream,
        generation: u64,
    ) -> Result<Option<Vec<u8>>, ConnectionFault> {
        let result = read_frame(reader, self.max_frame_len);
        match &result {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::info!(addr = %self.addr, "Server closed the connection");
                self.invalidate(generation);
            }
            Err(e) => {
                tracing::warn!(addr = %self.addr, error = %e, "Receive failed");
                self.invalidate(generation);
            }
        }
        result
    }

    /// Shut the socket down for good. Wakes a listener blocked in `receive`.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        Self::clear_locked(&mut inner);
    }

    fn connect_locked(&self, inner: &mut Inner) -> Result<(), ConnectionFault> {
        Self::clear_locked(inner);
        inner.state = ConnectionState::Connecting;

        match TcpStream::connect(&self.addr) {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(error = %e, "Could not set TCP_NODELAY");
                }
                inner.stream = Some(stream);
                inner.state = ConnectionState::Connected;
                inner.generation += 1;
                inner.established += 1;
                tracing::info!(
                    addr = %self.addr,
                    generation = inner.generation,
                    "Connected to synthesis server"
                );
                Ok(())
            }
            Err(source) => {
                inner.state = ConnectionState::Disconnected;
                Err(ConnectionFault::Connect {
                    addr: self.addr.clone(),
                    source,
                })
            }
        }
    }

    fn invalidate(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation == generation {
            Self::clear_locked(&mut inner);
        }
    }

    fn clear_locked(inner: &mut Inner) {
        if let Some(stream) = inner.stream.take() {
            // Already-dead sockets report NotConnected here
            let _ = stream.shutdown(Shutdown::Both);
        }
        inner.state = ConnectionState::Disconnected;
    }
}
