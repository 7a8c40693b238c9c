//! Script feeding against a real server and client on loopback.

use std::fs;
use std::io::Cursor;
use std::net::TcpListener;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anchorcast_cli::handlers::speak::{FeedSummary, feed, wait_for_drain};
use anchorcast_client::{AnnouncerClient, ClientError, NowPlayingCallback};
use anchorcast_core::{
    ClientConfig, PlaybackError, PlaybackSink, ServerConfig, SynthesisBackend, SynthesisFault,
};
use anchorcast_server::{Backends, RunningServer, SynthesisServer};
use parking_lot::Mutex;

const POLL: Duration = Duration::from_millis(10);

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
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// One sample per character of input.
struct CountingVoice;

impl SynthesisBackend for CountingVoice {
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisFault> {
        Ok(wav(&vec![1; text.chars().count()]))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

struct SilentSink;

impl PlaybackSink for SilentSink {
    fn play(&self, _path: &Path) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&self) {}
}

fn start_server() -> RunningServer {
    let config = ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        ..ServerConfig::with_defaults()
    };
    let backends = Backends::new(Arc::new(CountingVoice)).with_assistant(Arc::new(CountingVoice));
    SynthesisServer::bind(&config, backends)
        .unwrap()
        .spawn()
        .unwrap()
}

fn client_config(port: u16, dir: &Path) -> ClientConfig {
    let mut config = ClientConfig::with_defaults();
    config.server_port = port;
    config.output_dir = dir.join("out");
    config.sounds_dir = dir.join("sounds");
    config.reconnect_interval_ms = 50;
    config
}

fn start_client(config: ClientConfig) -> (AnnouncerClient, Arc<Mutex<Vec<String>>>) {
    let played = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&played);
    let now_playing: NowPlayingCallback = Arc::new(move |text: &str| {
        log.lock().push(text.to_string());
    });
    let client = AnnouncerClient::start(config, Arc::new(SilentSink), Some(now_playing)).unwrap();
    (client, played)
}

fn lines(raw: &[&str]) -> Vec<String> {
    raw.iter().map(ToString::to_string).collect()
}

#[test]
fn script_plays_everything_then_drains() {
    let server = start_server();
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("sounds")).unwrap();
    fs::write(dir.path().join("sounds").join("咳嗽声.WAV"), wav(&[5, 5])).unwrap();

    let (client, played) = start_client(client_config(server.local_addr().port(), dir.path()));
    let summary = feed(
        &client,
        lines(&[
            "欢迎来到直播间",
            "# 这一行不念",
            "[咳嗽]",
            "!感谢老铁的火箭",
            "~随便聊两句",
            "?测试一下",
            "??助手测试",
        ]),
        POLL,
    )
    .unwrap();

    assert_eq!(
        summary,
        FeedSummary {
            submitted: 6,
            empty: 0
        }
    );
    assert!(wait_for_drain(&client, Duration::from_secs(10), POLL));

    let mut texts = played.lock().clone();
    texts.sort();
    let mut expected = lines(&[
        "欢迎来到直播间",
        "[咳嗽]",
        "感谢老铁的火箭",
        "随便聊两句",
        "测试一下",
        "助手测试",
    ]);
    expected.sort();
    assert_eq!(texts, expected);

    client.stop();
    server.stop().unwrap();
}

#[test]
fn drain_times_out_while_server_is_silent() {
    // Accepts connections (via the backlog) but never answers.
    let silent = TcpListener::bind("127.0.0.1:0").unwrap();
    let dir = tempfile::tempdir().unwrap();

    let (client, played) = start_client(client_config(silent.local_addr().unwrap().port(), dir.path()));
    feed(&client, lines(&["有人吗"]), POLL).unwrap();

    assert!(!wait_for_drain(&client, Duration::from_millis(300), POLL));
    assert!(client.get_unprocessed_size() > 0);
    assert!(played.lock().is_empty());

    client.stop();
}

#[test]
fn feeding_a_stopped_client_fails() {
    let server = start_server();
    let dir = tempfile::tempdir().unwrap();
    let (client, _played) = start_client(client_config(server.local_addr().port(), dir.path()));

    client.stop();
    let result = feed(&client, lines(&["还在吗"]), POLL);
    assert!(matches!(result, Err(ClientError::Stopped)));

    server.stop().unwrap();
}
