//! The network listener thread body.
//!
//! Reads response frames and feeds them to reassembly. While there is no
//! socket it sleeps for the reconnect interval and checks again; it never
//! connects on its own, the next send does. When a socket dies, only the
//! requests that went out on it are abandoned.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anchorcast_core::ConnectionFault;

use crate::connection::Reception;
use crate::session::Session;

/// Longest single sleep, so shutdown is noticed quickly.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

pub(crate) fn run(session: &Session, shutdown: &AtomicBool) {
    tracing::debug!(addr = session.connection.addr(), "Listener started");

    while !shutdown.load(Ordering::SeqCst) {
        let Reception { generation, frame } = session.connection.receive();
        match frame {
            Ok(Some(frame)) => session.handle_packet(&frame),
            Ok(None) => {
                if !shutdown.load(Ordering::SeqCst) {
                    session.abandon_sent_through(generation, "server closed the connection");
                }
            }
            Err(ConnectionFault::NotConnected) => {
                sleep_unless(shutdown, session.config.reconnect_interval());
            }
            Err(e) => {
                if !shutdown.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, generation, "Listener lost the connection");
                    session.abandon_sent_through(generation, &e.to_string());
                }
            }
        }
    }

    tracing::debug!("Listener stopped");
}

fn sleep_unless(shutdown: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    loop {
        let now = Instant::now();
        if shutdown.load(Ordering::SeqCst) || now >= deadline {
            return;
        }
        thread::sleep(SHUTDOWN_POLL.min(deadline - now));
    }
}
