//! [`PlaybackSink`] that runs an external player per file.
//!
//! Stopping sends SIGTERM, waits briefly, then kills the process.

use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

#[cfg(unix)]
use std::time::Instant;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

use anchorcast_core::{PlaybackError, PlaybackSink, PlayerConfig};
use parking_lot::Mutex;

/// How often a blocked `play` checks whether its process finished.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace period between SIGTERM and SIGKILL.
#[cfg(unix)]
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Plays each file with `program args... <path>`.
pub struct CommandPlayer {
    config: PlayerConfig,
    current: Mutex<Option<Child>>,
}

impl CommandPlayer {
    #[must_use]
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            current: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.current.lock().is_some()
    }
}

impl PlaybackSink for CommandPlayer {
    fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        let child = Command::new(&self.config.program)
            .args(&self.config.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlaybackError::Spawn {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!(pid = child.id(), path = %path.display(), "Player process started");
        *self.current.lock() = Some(child);

        loop {
            {
                let mut current = self.current.lock();
                let Some(child) = current.as_mut() else {
                    // stop() took the process
                    return Ok(());
                };
                if let Some(status) = child.try_wait()? {
                    current.take();
                    return check_status(path, status);
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn stop(&self) {
        let Some(child) = self.current.lock().take() else {
            return;
        };
        match terminate(child) {
            Ok(status) => tracing::info!(%status, "Playback stopped"),
            Err(e) => tracing::warn!(error = %e, "Failed to stop player process"),
        }
    }
}

fn check_status(path: &Path, status: ExitStatus) -> Result<(), PlaybackError> {
    if status.success() {
        Ok(())
    } else {
        Err(PlaybackError::Exit {
            path: path.to_path_buf(),
            status: status.to_string(),
        })
    }
}

/// SIGTERM with a grace period, then SIGKILL, then reap.
#[cfg(unix)]
fn terminate(mut child: Child) -> io::Result<ExitStatus> {
    let pid = i32::try_from(child.id())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "child PID out of range"))?;

    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        // Process may have already exited
        if e == nix::errno::Errno::ESRCH {
            return child.wait();
        }
        return Err(io::Error::other(e));
    }

    let deadline = Instant::now() + TERMINATE_GRACE;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        thread::sleep(POLL_INTERVAL);
    }

    child.kill()?;
    child.wait()
}

#[cfg(not(unix))]
fn terminate(mut child: Child) -> io::Result<ExitStatus> {
    child.kill()?;
    child.wait()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn player(program: &str, args: &[&str]) -> CommandPlayer {
        CommandPlayer::new(PlayerConfig {
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
        })
    }

    #[test]
    fn successful_command_returns_ok() {
        // `true <path>` ignores its argument and exits 0
        player("true", &[]).play(Path::new("ignored.wav")).unwrap();
    }

    #[test]
    fn failing_command_reports_exit() {
        let err = player("false", &[]).play(Path::new("x.wav")).unwrap_err();
        assert!(matches!(err, PlaybackError::Exit { .. }));
    }

    #[test]
    fn missing_program_reports_spawn() {
        let err = player("/definitely/not/a/player", &[])
            .play(Path::new("x.wav"))
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Spawn { .. }));
    }

    #[test]
    fn stop_interrupts_long_playback() {
        // `sleep 30 <path>` would fail on the path, so wrap in sh
        let sink = Arc::new(player("sh", &["-c", "sleep 30", "sh"]));
        let worker = {
            let sink = Arc::clone(&sink);
            thread::spawn(move || sink.play(Path::new("long.wav")))
        };

        let started = Instant::now();
        while !sink.is_playing() && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(10));
        }
        sink.stop();

        assert!(worker.join().unwrap().is_ok());
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!sink.is_playing());
    }

    #[test]
    fn stop_when_idle_is_a_noop() {
        player("true", &[]).stop();
    }
}
