//! End-to-end coverage driving the real router accept loop, a real peer
//! process, and a raw socket client over actual TCP connections — the S1
//! "full round trip" scenario: a client SET lands on a connected peer, and
//! a subsequent GET/GETKEYS issued by another client comes back correct.
//!
//! The S6 reset/fan-out race is covered separately as a unit test in
//! `src/peer.rs` (see `reset_drops_stale_answer_for_key_superseded_by_fanout`):
//! that scenario needs the fan-out SET and the stale ANSWER delivered to a
//! resetting peer in a specific, otherwise unreproducible order, which a
//! real-socket test can't pin down deterministically. Driving `run_reset`
//! over an in-memory duplex pipe gets the same production code path with
//! full control over frame ordering instead of a flaky race against real
//! network scheduling.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use codec::{MAX_FRAME_LEN, PROTOCOL_VERSION, handshake::Role, message::Message, opcode::Status, read_frame, write_frame};
use kvndb::{config::{Cli, EndpointType, Mode}, handshake, observer::Observer, statistics::Statistics};
use service::Router;
use store::{KeyValueStore, RamStore};
use tokio::net::{TcpListener, TcpStream};

fn peer_cli(endpoint: String, reset: bool) -> Cli {
    Cli {
        mode: Mode::Ram,
        host: "0.0.0.0".to_string(),
        port: 0,
        endpoint_type: EndpointType::Tcp,
        endpoint: Some(endpoint),
        password: None,
        verbose: false,
        logfile: None,
        reset,
        reset_sleep: 0.2,
        arguments: Vec::new(),
        #[cfg(feature = "api")]
        api_listen: None,
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) {
    let step = Duration::from_millis(10);
    let mut waited = Duration::ZERO;
    while !condition() && waited < timeout {
        tokio::time::sleep(step).await;
        waited += step;
    }
    assert!(condition(), "condition not met within {timeout:?}");
}

#[tokio::test]
async fn client_set_is_visible_to_a_subsequent_get_and_getkeys() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let statistics = Statistics::default();
    let router: Arc<Router<Observer>> = Router::new(None, Observer::new(statistics.clone()));

    tokio::spawn(kvndb::server::serve(listener, router.clone(), statistics));

    let store = Arc::new(RamStore::new());
    let cli = peer_cli(addr.to_string(), false);
    tokio::spawn(async move { kvndb::peer::run(&cli, store).await.unwrap() });

    // Wait for the peer's handshake to land it in `servers` before issuing
    // reads against it.
    wait_for(|| router.server_count() == 1, Duration::from_secs(1)).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    let range = handshake::perform(&mut client, None, Role::Client).await.unwrap();
    let rid = range.start as u32;

    write_frame(
        &mut client,
        &Message::Set { key: Bytes::from_static(b"hello"), value: Bytes::from_static(b"world") }.encode(),
    )
    .await
    .unwrap();

    // SET has no reply; give the fan-out a moment to reach the peer before
    // reading it back.
    tokio::time::sleep(Duration::from_millis(50)).await;

    write_frame(&mut client, &Message::Get { rid, key: Bytes::from_static(b"hello") }.encode()).await.unwrap();
    let reply = Message::decode(&read_frame(&mut client, MAX_FRAME_LEN).await.unwrap()).unwrap();
    assert_eq!(reply, Message::Answer { rid, value: Bytes::from_static(b"world") });

    write_frame(&mut client, &Message::GetKeys { rid }.encode()).await.unwrap();
    let reply = Message::decode(&read_frame(&mut client, MAX_FRAME_LEN).await.unwrap()).unwrap();
    assert_eq!(reply, Message::AllKeys { rid, keys: vec![Bytes::from_static(b"hello")] });

    write_frame(&mut client, &Message::Get { rid, key: Bytes::from_static(b"missing") }.encode()).await.unwrap();
    let reply = Message::decode(&read_frame(&mut client, MAX_FRAME_LEN).await.unwrap()).unwrap();
    assert_eq!(reply, Message::NotFound { rid });
}

/// S2: replication to two peers, one of them lost then rejoined with
/// `--reset`. A read against the sole survivor still sees the mutation,
/// and the rejoining peer's own store ends up consistent with it.
#[tokio::test]
async fn lost_peer_resyncs_from_its_surviving_sibling_on_reset() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let statistics = Statistics::default();
    let router: Arc<Router<Observer>> = Router::new(None, Observer::new(statistics.clone()));
    tokio::spawn(kvndb::server::serve(listener, router.clone(), statistics));

    let cli_p1 = peer_cli(addr.to_string(), false);
    let p1 = tokio::spawn(async move { kvndb::peer::run(&cli_p1, Arc::new(RamStore::new())).await });

    let cli_p2 = peer_cli(addr.to_string(), false);
    tokio::spawn(async move { kvndb::peer::run(&cli_p2, Arc::new(RamStore::new())).await.unwrap() });

    wait_for(|| router.server_count() == 2, Duration::from_secs(1)).await;

    let mut client = TcpStream::connect(addr).await.unwrap();
    let range = handshake::perform(&mut client, None, Role::Client).await.unwrap();
    let rid = range.start as u32;

    write_frame(&mut client, &Message::Set { key: Bytes::from_static(b"a"), value: Bytes::from_static(b"1") }.encode())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Drop P1's connection and wait for the router to notice.
    p1.abort();
    wait_for(|| router.server_count() == 1, Duration::from_secs(1)).await;

    write_frame(&mut client, &Message::Get { rid, key: Bytes::from_static(b"a") }.encode()).await.unwrap();
    let reply = Message::decode(&read_frame(&mut client, MAX_FRAME_LEN).await.unwrap()).unwrap();
    assert_eq!(reply, Message::Answer { rid, value: Bytes::from_static(b"1") }, "P2 must still answer for the key P1 held too");

    // P1 rejoins with an empty store and `--reset`, pulling state through P2.
    let cli_p1_resync = peer_cli(addr.to_string(), true);
    let p1_store = Arc::new(RamStore::new());
    let p1_store_handle = p1_store.clone();
    tokio::spawn(async move { kvndb::peer::run(&cli_p1_resync, p1_store_handle).await.unwrap() });

    wait_for(|| p1_store.get(b"a").map(|v| v == Bytes::from_static(b"1")).unwrap_or(false), Duration::from_secs(2)).await;
}

/// S4: a client with the wrong shared password is held for the mismatch
/// delay and then disconnected; a client with the correct password
/// completes the handshake and proceeds to an operational mode.
#[tokio::test]
async fn password_gate_rejects_wrong_password_after_a_delay_and_admits_the_right_one() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let statistics = Statistics::default();
    let router: Arc<Router<Observer>> =
        Router::new(Some(Bytes::from_static(b"s3cret")), Observer::new(statistics.clone()));
    tokio::spawn(kvndb::server::serve(listener, router, statistics));

    let mut wrong = TcpStream::connect(addr).await.unwrap();
    write_frame(&mut wrong, &codec::handshake::encode_version(PROTOCOL_VERSION)).await.unwrap();
    let status = codec::handshake::decode_status(&read_frame(&mut wrong, MAX_FRAME_LEN).await.unwrap()).unwrap();
    assert_eq!(status, Status::PasswordRequired);

    write_frame(&mut wrong, b"not-the-password").await.unwrap();
    let started = std::time::Instant::now();
    let status = codec::handshake::decode_status(&read_frame(&mut wrong, MAX_FRAME_LEN).await.unwrap()).unwrap();
    assert_eq!(status, Status::Error);
    assert!(started.elapsed() >= Duration::from_secs(3), "wrong password must be held for the mismatch delay");

    let mut right = TcpStream::connect(addr).await.unwrap();
    let range = handshake::perform(&mut right, Some("s3cret"), Role::Client).await.unwrap();
    assert!(range.end > range.start);
}
