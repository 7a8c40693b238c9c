//! The announcer client: owns every background thread.

use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use anchorcast_core::{ClientConfig, PlaybackSink, Priority, PriorityTier};
use parking_lot::Mutex;

use crate::connection::ConnectionState;
use crate::counters::CounterSnapshot;
use crate::dispatcher::Dispatcher;
use crate::error::ClientError;
use crate::listener;
use crate::playback::{NowPlayingCallback, Player};
use crate::session::Session;

/// Connected announcer: dispatches lines, receives audio, plays it in order.
///
/// Starts one listener thread, one player thread and the sender pool.
/// [`stop`](Self::stop) (or drop) shuts all of them down.
pub struct AnnouncerClient {
    session: Arc<Session>,
    dispatcher: Dispatcher,
    player: Arc<Player>,
    shutdown: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl AnnouncerClient {
    /// Validate `config`, try an initial connection and start the threads.
    ///
    /// An unreachable server is not an error here; the first send retries.
    pub fn start(
        config: ClientConfig,
        sink: Arc<dyn PlaybackSink>,
        now_playing: Option<NowPlayingCallback>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        fs::create_dir_all(&config.output_dir).map_err(|source| ClientError::OutputDir {
            path: config.output_dir.clone(),
            source,
        })?;

        let session = Arc::new(Session::new(config));
        if let Err(e) = session.connection.connect() {
            tracing::warn!(error = %e, "Initial connection failed, will retry on first send");
        }

        let player = Arc::new(Player::new(
            Arc::clone(&session.queue),
            Arc::clone(&session.cancel),
            Arc::clone(&session.counters),
            sink,
            now_playing,
        ));
        let shutdown = Arc::new(AtomicBool::new(false));
        let dispatcher = Dispatcher::new(Arc::clone(&session))?;

        let client = Self {
            session,
            dispatcher,
            player,
            shutdown,
            threads: Mutex::new(Vec::new()),
        };
        client.spawn_threads()?;

        tracing::info!(addr = client.session.connection.addr(), "Announcer client started");
        Ok(client)
    }

    fn spawn_threads(&self) -> Result<(), ClientError> {
        let listener = {
            let session = Arc::clone(&self.session);
            let shutdown = Arc::clone(&self.shutdown);
            thread::Builder::new()
                .name("anchorcast-listener".to_string())
                .spawn(move || listener::run(&session, &shutdown))
                .map_err(|source| ClientError::Spawn {
                    name: "listener",
                    source,
                })?
        };
        self.threads.lock().push(listener);

        let player = {
            let player = Arc::clone(&self.player);
            let shutdown = Arc::clone(&self.shutdown);
            thread::Builder::new()
                .name("anchorcast-player".to_string())
                .spawn(move || player.run(&shutdown))
                .map_err(|source| ClientError::Spawn {
                    name: "player",
                    source,
                })?
        };
        self.threads.lock().push(player);
        Ok(())
    }

    pub fn add_task(&self, text: &str, priority: Priority) -> Result<Option<u64>, ClientError> {
        self.ensure_running()?;
        self.dispatcher.add_task(text, priority)
    }

    pub fn interrupt_and_speak(&self, text: &str) -> Result<Option<u64>, ClientError> {
        self.ensure_running()?;
        self.dispatcher.interrupt_and_speak(text)
    }

    pub fn test_voice(&self, text: &str, use_assistant: bool) -> Result<Option<u64>, ClientError> {
        self.ensure_running()?;
        self.dispatcher.test_voice(text, use_assistant)
    }

    /// Chunks in flight plus items waiting to play.
    #[must_use]
    pub fn get_unprocessed_size(&self) -> usize {
        self.session.counters.unprocessed()
    }

    /// Whether the producer may submit another script.
    #[must_use]
    pub fn can_generate_new_script(&self) -> bool {
        self.get_unprocessed_size() < self.session.config.admission_limit
    }

    #[must_use]
    pub fn counters(&self) -> CounterSnapshot {
        self.session.counters.snapshot()
    }

    #[must_use]
    pub fn queued(&self, tier: PriorityTier) -> usize {
        self.session.counters.queued(tier)
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.session.connection.state()
    }

    #[must_use]
    pub fn reconnect_count(&self) -> u64 {
        self.session.connection.reconnect_count()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Stop playback, close the connection and join the threads.
    ///
    /// Items still queued are discarded. Safe to call more than once.
    pub fn stop(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Stopping announcer client");

        self.player.stop();
        self.session.connection.close();
        self.session.queue.notify();

        let threads: Vec<_> = self.threads.lock().drain(..).collect();
        for handle in threads {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                tracing::warn!(thread = %name, "Thread panicked during shutdown");
            }
        }

        for item in self.session.queue.drain() {
            item.discard_artifact();
            self.session.counters.dequeue(item.priority.tier());
        }
        self.session.abandon_pending("client stopped");
    }

    fn ensure_running(&self) -> Result<(), ClientError> {
        if self.is_stopped() {
            return Err(ClientError::Stopped);
        }
        Ok(())
    }
}

impl Drop for AnnouncerClient {
    fn drop(&mut self) {
        self.stop();
    }
}
