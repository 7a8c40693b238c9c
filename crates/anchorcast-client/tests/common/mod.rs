//! Shared fixtures: a scripted loopback server and a recording sink.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anchorcast_client::AnnouncerClient;
use anchorcast_core::protocol::DEFAULT_MAX_FRAME_LEN;
use anchorcast_core::{
    ChunkRequest, ChunkResponse, ClientConfig, PlaybackError, PlaybackSink, read_frame,
    write_frame,
};
use parking_lot::Mutex;

pub fn wav(samples: &[i16]) -> Vec<u8> {
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

/// One accepted connection on the fake server side.
pub struct ServerConn {
    pub stream: TcpStream,
}

impl ServerConn {
    pub fn read_request(&mut self) -> Option<ChunkRequest> {
        let bytes = read_frame(&mut self.stream, DEFAULT_MAX_FRAME_LEN).ok()??;
        Some(ChunkRequest::from_slice(&bytes).unwrap())
    }

    pub fn read_requests(&mut self, n: usize) -> Vec<ChunkRequest> {
        (0..n)
            .map(|_| self.read_request().expect("client closed early"))
            .collect()
    }

    pub fn respond(&mut self, response: &ChunkResponse) {
        write_frame(&mut self.stream, &response.to_bytes().unwrap()).unwrap();
    }

    /// Answer with one sample whose value is the chunk id.
    pub fn respond_with_chunk_id(&mut self, request: &ChunkRequest) {
        let sample = i16::try_from(request.chunk_id).unwrap();
        self.respond(&ChunkResponse::success(request, &wav(&[sample])));
    }

    /// Answer with one sample whose value is the request id.
    pub fn respond_with_request_id(&mut self, request: &ChunkRequest) {
        let sample = i16::try_from(request.request_id).unwrap();
        self.respond(&ChunkResponse::success(request, &wav(&[sample])));
    }
}

pub struct FakeServer {
    listener: TcpListener,
}

impl FakeServer {
    pub fn bind() -> Self {
        Self {
            listener: TcpListener::bind("127.0.0.1:0").unwrap(),
        }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().unwrap().port()
    }

    pub fn accept(&self) -> ServerConn {
        let (stream, _) = self.listener.accept().unwrap();
        ServerConn { stream }
    }
}

/// Plays nothing; records the samples of every file it is handed.
#[derive(Default)]
pub struct RecordingSink {
    pub played: Mutex<Vec<Vec<i16>>>,
    pub paths: Mutex<Vec<std::path::PathBuf>>,
    pub delay: Duration,
}

impl RecordingSink {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn played(&self) -> Vec<Vec<i16>> {
        self.played.lock().clone()
    }

    /// First sample of each played file.
    pub fn heads(&self) -> Vec<i16> {
        self.played
            .lock()
            .iter()
            .filter_map(|s| s.first().copied())
            .collect()
    }
}

impl PlaybackSink for RecordingSink {
    fn play(&self, path: &Path) -> Result<(), PlaybackError> {
        self.paths.lock().push(path.to_path_buf());
        let samples = hound::WavReader::open(path)
            .map(|r| r.into_samples::<i16>().map(Result::unwrap).collect())
            .unwrap_or_default();
        self.played.lock().push(samples);
        std::thread::sleep(self.delay);
        Ok(())
    }

    fn stop(&self) {}
}

pub fn config(port: u16, dir: &Path) -> ClientConfig {
    let mut config = ClientConfig::with_defaults();
    config.server_port = port;
    config.output_dir = dir.join("out");
    config.sounds_dir = dir.join("sounds");
    config.reconnect_interval_ms = 50;
    config
}

pub fn start(config: ClientConfig, sink: &Arc<RecordingSink>) -> AnnouncerClient {
    AnnouncerClient::start(config, Arc::clone(sink) as Arc<dyn PlaybackSink>, None).unwrap()
}

pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}
