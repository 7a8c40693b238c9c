//! `anchorcast speak`.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anchorcast_client::{AnnouncerClient, ClientError, CommandPlayer, NowPlayingCallback};
use anchorcast_core::Priority;
use anyhow::{Context, Result};

use crate::config::load_client_config;
use crate::script::ScriptLine;

/// How often admission and drain are re-checked.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a feed run did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedSummary {
    /// Lines that produced a request or a local sound.
    pub submitted: usize,
    /// Lines that parsed but had nothing left to say.
    pub empty: usize,
}

pub async fn execute(
    config_path: Option<PathBuf>,
    lines: Vec<String>,
    drain_timeout: Duration,
) -> Result<()> {
    let config = load_client_config(config_path.as_deref())?;
    let sink = Arc::new(CommandPlayer::new(config.player.clone()));
    let now_playing: NowPlayingCallback = Arc::new(|text: &str| println!("> {text}"));
    let client = Arc::new(
        AnnouncerClient::start(config, sink, Some(now_playing))
            .context("Failed to start announcer client")?,
    );

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let feeder = Arc::clone(&client);
    // Not spawn_blocking: the runtime would wait on a pending stdin read at exit.
    thread::Builder::new()
        .name("script-feeder".to_string())
        .spawn(move || {
            let _ = done_tx.send(run_script(&feeder, lines, drain_timeout));
        })
        .context("Failed to start script feeder")?;

    tokio::select! {
        outcome = done_rx => {
            let (summary, drained) = outcome.context("Script feeder exited early")??;
            tracing::info!(submitted = summary.submitted, empty = summary.empty, "Script finished");
            if !drained {
                tracing::warn!(
                    unprocessed = client.get_unprocessed_size(),
                    "Drain timeout reached with speech still pending"
                );
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            tracing::info!("Ctrl+C received, stopping");
        }
    }

    tokio::task::spawn_blocking(move || client.stop())
        .await
        .context("Client shutdown task failed")?;
    Ok(())
}

fn run_script(
    client: &AnnouncerClient,
    lines: Vec<String>,
    drain_timeout: Duration,
) -> Result<(FeedSummary, bool), ClientError> {
    let summary = if lines.is_empty() {
        feed(client, io::stdin().lock().lines().map_while(Result::ok), POLL_INTERVAL)?
    } else {
        feed(client, lines, POLL_INTERVAL)?
    };
    let drained = wait_for_drain(client, drain_timeout, POLL_INTERVAL);
    Ok((summary, drained))
}

/// Submit each line, holding scripted lines back while the client is busy.
///
/// Interrupts and voice tests are never held back.
pub fn feed<I>(
    client: &AnnouncerClient,
    lines: I,
    poll: Duration,
) -> Result<FeedSummary, ClientError>
where
    I: IntoIterator<Item = String>,
{
    let mut summary = FeedSummary::default();

    for raw in lines {
        let Some(line) = ScriptLine::parse(&raw) else {
            continue;
        };

        let submitted = match &line {
            ScriptLine::Speak {
                text,
                priority: Priority::Interrupt,
            } => client.interrupt_and_speak(text)?,
            ScriptLine::Speak { text, priority } => {
                wait_for_admission(client, poll)?;
                client.add_task(text, *priority)?
            }
            ScriptLine::VoiceTest { text, assistant } => client.test_voice(text, *assistant)?,
        };

        match submitted {
            Some(request_id) => {
                tracing::debug!(request_id, text = line.text(), "Line submitted");
                summary.submitted += 1;
            }
            None => summary.empty += 1,
        }
    }

    Ok(summary)
}

fn wait_for_admission(client: &AnnouncerClient, poll: Duration) -> Result<(), ClientError> {
    let mut logged = false;
    while !client.can_generate_new_script() {
        if client.is_stopped() {
            return Err(ClientError::Stopped);
        }
        if !logged {
            tracing::debug!(
                unprocessed = client.get_unprocessed_size(),
                "Waiting for the queue to drain"
            );
            logged = true;
        }
        thread::sleep(poll);
    }
    Ok(())
}

/// Block until nothing is in flight or queued. `false` on timeout or stop.
pub fn wait_for_drain(client: &AnnouncerClient, timeout: Duration, poll: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if client.get_unprocessed_size() == 0 {
            return true;
        }
        if client.is_stopped() || Instant::now() >= deadline {
            return false;
        }
        thread::sleep(poll);
    }
}
