use crate::*;

use kstor_core::wire::{FrameFormat, LEGACY_MAX_DATA_SIZE, PING_VALUE_SIZE};

#[tokio::test]
async fn test_ping_echoes_value() {
    for codec in codecs() {
        let server = MockServer::start(codec).await.unwrap();
        let mut client = server.connect().await.unwrap();
        assert_eq!(client.ping("hello").await.unwrap(), "hello");
        assert_eq!(client.state(), kstor_client::SessionState::Idle);
    }
}

#[tokio::test]
async fn test_ping_empty_value() {
    for codec in codecs() {
        let server = MockServer::start(codec).await.unwrap();
        let mut client = server.connect().await.unwrap();
        assert_eq!(client.ping("").await.unwrap(), "");
    }
}

#[tokio::test]
async fn test_ping_reply_stops_at_nul() {
    let server = MockServer::start(PacketCodec::plain()).await.unwrap();
    let mut client = server.connect().await.unwrap();
    assert_eq!(client.ping("abc\0def").await.unwrap(), "abc");
}

#[tokio::test]
async fn test_ping_value_too_large_sends_nothing() {
    let server = MockServer::start(PacketCodec::plain()).await.unwrap();
    let mut client = server.connect().await.unwrap();
    let value = "x".repeat(PING_VALUE_SIZE + 1);

    let err = client.ping(&value).await.unwrap_err();
    assert!(!err.is_fatal(), "input errors keep the session: {err:?}");
    assert_eq!(server.request_count(), 0);
    assert_eq!(client.ping("ok").await.unwrap(), "ok");
}

#[tokio::test]
async fn test_ping_many_in_sequence() {
    let server = MockServer::start(PacketCodec::checksummed()).await.unwrap();
    let mut client = server.connect().await.unwrap();
    for i in 0..100 {
        let value = format!("ping-{i}");
        assert_eq!(client.ping(&value).await.unwrap(), value);
    }
}

#[tokio::test]
async fn test_ping_full_buffer_value() {
    // A value filling the whole buffer has no terminator and comes back whole.
    for format in [FrameFormat::Plain, FrameFormat::Checksummed] {
        let codec = PacketCodec::new(format, LEGACY_MAX_DATA_SIZE);
        let server = MockServer::start(codec).await.unwrap();
        let mut client = server.connect().await.unwrap();
        let value = "k".repeat(PING_VALUE_SIZE);
        assert_eq!(client.ping(&value).await.unwrap(), value);
    }
}
