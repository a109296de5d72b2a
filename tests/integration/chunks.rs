use crate::*;

use kstor_client::SessionState;

fn new_id() -> ChunkId {
    ChunkId::random(&mut rand::thread_rng())
}

#[tokio::test]
async fn test_chunk_lifecycle() {
    for codec in codecs() {
        let server = MockServer::start(codec).await.unwrap();
        let mut client = server.connect().await.unwrap();
        let id = new_id();
        let data = vec![0xABu8; CHUNK_SIZE];

        client.chunk_create(id.as_bytes()).await.unwrap();
        client.chunk_write(id.as_bytes(), &data).await.unwrap();
        let read = client.chunk_read(id.as_bytes()).await.unwrap();
        assert_eq!(read.as_ref(), data.as_slice());

        client.chunk_delete(id.as_bytes()).await.unwrap();
        assert_eq!(server.chunk_count(), 0);
    }
}

#[tokio::test]
async fn test_read_unknown_chunk_reports_code() {
    for codec in codecs() {
        let server = MockServer::start(codec).await.unwrap();
        let mut client = server.connect().await.unwrap();

        let err = client.chunk_read(new_id().as_bytes()).await.unwrap_err();
        match &err {
            ClientError::Operation { packet_type, code } => {
                assert_eq!(*packet_type, PacketType::ChunkRead);
                assert_ne!(*code, 0);
            }
            other => panic!("expected Operation, got {other:?}"),
        }
        assert_eq!(err.result_code(), Some(RESULT_NOT_FOUND as i32));

        // A server-reported failure leaves the session usable.
        assert_eq!(client.state(), SessionState::Idle);
        assert_eq!(client.ping("still here").await.unwrap(), "still here");
    }
}

#[tokio::test]
async fn test_deleted_chunk_is_gone() {
    let server = MockServer::start(PacketCodec::plain()).await.unwrap();
    let mut client = server.connect().await.unwrap();
    let id = new_id();

    client.chunk_create(id.as_bytes()).await.unwrap();
    client.chunk_delete(id.as_bytes()).await.unwrap();

    let err = client.chunk_read(id.as_bytes()).await.unwrap_err();
    assert_eq!(err.result_code(), Some(RESULT_NOT_FOUND as i32));
    let err = client.chunk_delete(id.as_bytes()).await.unwrap_err();
    assert_eq!(err.result_code(), Some(RESULT_NOT_FOUND as i32));
}

#[tokio::test]
async fn test_invalid_inputs_rejected_locally() {
    let server = MockServer::start(PacketCodec::plain()).await.unwrap();
    let mut client = server.connect().await.unwrap();
    let id = new_id();

    assert!(client.chunk_create(&[0u8; 15]).await.is_err());
    assert!(client.chunk_read(&[0u8; 17]).await.is_err());
    assert!(client
        .chunk_write(id.as_bytes(), &[0u8; CHUNK_SIZE - 1])
        .await
        .is_err());

    assert_eq!(server.request_count(), 0);
    assert_eq!(client.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_sessions_see_shared_chunks_independently() {
    let server = MockServer::start(PacketCodec::checksummed()).await.unwrap();
    let mut writer = server.connect().await.unwrap();
    let mut reader = server.connect().await.unwrap();
    let id = new_id();
    let data: Vec<u8> = (0..CHUNK_SIZE).map(|i| (i % 251) as u8).collect();

    writer.chunk_create(id.as_bytes()).await.unwrap();
    writer.chunk_write(id.as_bytes(), &data).await.unwrap();

    let read = reader.chunk_read(id.as_bytes()).await.unwrap();
    assert_eq!(read.as_ref(), data.as_slice());

    reader.chunk_delete(id.as_bytes()).await.unwrap();
    let err = writer.chunk_read(id.as_bytes()).await.unwrap_err();
    assert_eq!(err.result_code(), Some(RESULT_NOT_FOUND as i32));
}
