//! End-to-end tests over loopback TCP with a mocked synthesis backend.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use anchorcast_core::protocol::{DEFAULT_MAX_FRAME_LEN, decode_audio};
use anchorcast_core::{
    ChunkRequest, ChunkResponse, Priority, RequestType, ServerConfig, SynthesisBackend,
    SynthesisFault, read_frame, write_frame,
};
use anchorcast_server::{Backends, RunningServer, ServerError, SynthesisServer};
use mockall::mock;

mock! {
    Voice {}
    impl SynthesisBackend for Voice {
        fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisFault>;
        fn name(&self) -> &str;
    }
}

/// Answers with the text's bytes, or fails for text starting with "fail".
fn echo_voice() -> MockVoice {
    let mut voice = MockVoice::new();
    voice.expect_synthesize().returning(|text| {
        if text.starts_with("fail") {
            Err(SynthesisFault::Request("HTTP 500: model crashed".to_string()))
        } else {
            Ok(text.as_bytes().to_vec())
        }
    });
    voice
}

fn config() -> ServerConfig {
    ServerConfig {
        bind: "127.0.0.1:0".to_string(),
        urgent_workers: 2,
        normal_workers: 2,
        ..ServerConfig::with_defaults()
    }
}

fn start(backends: Backends) -> RunningServer {
    SynthesisServer::bind(&config(), backends)
        .unwrap()
        .spawn()
        .unwrap()
}

fn connect(addr: SocketAddr) -> TcpStream {
    let stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    stream
}

fn request(request_id: u64, chunk_id: u32, text: &str, priority: Priority) -> ChunkRequest {
    ChunkRequest {
        request_id,
        chunk_id,
        total_chunks: 2,
        priority,
        text: text.to_string(),
        request_type: RequestType::Default,
        triggered_keyword: None,
    }
}

fn send(stream: &mut TcpStream, request: &ChunkRequest) {
    write_frame(stream, &request.to_bytes().unwrap()).unwrap();
}

fn receive(stream: &mut TcpStream) -> ChunkResponse {
    let frame = read_frame(stream, DEFAULT_MAX_FRAME_LEN)
        .unwrap()
        .expect("server closed the connection");
    ChunkResponse::from_slice(&frame).unwrap()
}

#[test]
fn synthesizes_each_chunk_and_echoes_metadata() {
    let server = start(Backends::new(Arc::new(echo_voice())));
    let mut stream = connect(server.local_addr());

    send(&mut stream, &request(1, 1, "第一句", Priority::Normal));
    send(&mut stream, &request(1, 2, "第二句", Priority::Normal));

    let mut responses = vec![receive(&mut stream), receive(&mut stream)];
    responses.sort_by_key(ChunkResponse::chunk_id);

    for (response, expected) in responses.iter().zip(["第一句", "第二句"]) {
        match response {
            ChunkResponse::Success {
                request_id,
                total_chunks,
                priority,
                text,
                audio,
                ..
            } => {
                assert_eq!(*request_id, 1);
                assert_eq!(*total_chunks, 2);
                assert_eq!(*priority, Priority::Normal);
                assert_eq!(text, expected);
                assert_eq!(decode_audio(audio).unwrap(), expected.as_bytes());
            }
            ChunkResponse::Error { message, .. } => panic!("unexpected error: {message}"),
        }
    }

    server.stop().unwrap();
}

#[test]
fn backend_failure_is_reported_per_chunk() {
    let server = start(Backends::new(Arc::new(echo_voice())));
    let mut stream = connect(server.local_addr());

    send(&mut stream, &request(9, 1, "fail please", Priority::Interrupt));
    match receive(&mut stream) {
        ChunkResponse::Error {
            request_id,
            chunk_id,
            message,
        } => {
            assert_eq!((request_id, chunk_id), (9, 1));
            assert!(message.contains("model crashed"));
        }
        ChunkResponse::Success { .. } => panic!("expected an error packet"),
    }

    server.stop().unwrap();
}

#[test]
fn malformed_payload_keeps_connection_open() {
    let server = start(Backends::new(Arc::new(echo_voice())));
    let mut stream = connect(server.local_addr());

    write_frame(&mut stream, b"{\"not\": \"a request\"}").unwrap();
    write_frame(&mut stream, b"\xff\xfe garbage").unwrap();
    send(&mut stream, &request(3, 1, "还在吗", Priority::Auto));

    let response = receive(&mut stream);
    assert_eq!(response.request_id(), 3);
    assert!(!response.is_error());

    server.stop().unwrap();
}

#[test]
fn assistant_voice_test_without_assistant_gets_error_packet() {
    let server = start(Backends::new(Arc::new(echo_voice())));
    let mut stream = connect(server.local_addr());

    let mut req = request(4, 1, "助手测试", Priority::Test);
    req.request_type = RequestType::TestAssistant;
    send(&mut stream, &req);

    let response = receive(&mut stream);
    assert!(response.is_error());
    assert_eq!(response.request_id(), 4);

    server.stop().unwrap();
}

#[test]
fn responses_go_back_to_the_requesting_connection() {
    let server = start(Backends::new(Arc::new(echo_voice())));
    let mut first = connect(server.local_addr());
    let mut second = connect(server.local_addr());

    send(&mut first, &request(100, 1, "one", Priority::Normal));
    send(&mut second, &request(200, 1, "two", Priority::Normal));

    assert_eq!(receive(&mut second).request_id(), 200);
    assert_eq!(receive(&mut first).request_id(), 100);

    server.stop().unwrap();
}

#[test]
fn stop_closes_client_connections() {
    let server = start(Backends::new(Arc::new(echo_voice())));
    let mut stream = connect(server.local_addr());

    send(&mut stream, &request(5, 1, "hello", Priority::Normal));
    receive(&mut stream);

    server.stop().unwrap();
    assert!(matches!(
        read_frame(&mut stream, DEFAULT_MAX_FRAME_LEN),
        Ok(None) | Err(_)
    ));
}

#[test]
fn stop_skips_chunks_that_have_not_started() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut voice = MockVoice::new();
    {
        let calls = Arc::clone(&calls);
        voice.expect_synthesize().returning(move |text| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            Ok(text.as_bytes().to_vec())
        });
    }
    let single = ServerConfig {
        normal_workers: 1,
        ..config()
    };
    let server = SynthesisServer::bind(&single, Backends::new(Arc::new(voice)))
        .unwrap()
        .spawn()
        .unwrap();
    let mut stream = connect(server.local_addr());

    for chunk_id in 1..=10 {
        let mut chunk = request(6, chunk_id, "slow", Priority::Normal);
        chunk.total_chunks = 10;
        send(&mut stream, &chunk);
    }
    std::thread::sleep(Duration::from_millis(100));

    let stopping = Instant::now();
    server.stop().unwrap();
    assert!(stopping.elapsed() < Duration::from_millis(1500));
    assert!(calls.load(Ordering::SeqCst) < 10);
}

#[test]
fn binding_a_used_port_fails() {
    let server = start(Backends::new(Arc::new(echo_voice())));
    let taken = ServerConfig {
        bind: server.local_addr().to_string(),
        ..config()
    };

    let result = SynthesisServer::bind(&taken, Backends::new(Arc::new(echo_voice())));
    assert!(matches!(result, Err(ServerError::Bind { .. })));

    server.stop().unwrap();
}
