use bytes::Bytes;
use codec::{handshake::Role, message::Message};
use kvndb_service::{GetOutcome, Router, RouterHandler};
use tokio::sync::mpsc;

#[derive(Clone)]
struct NullHandler;
impl RouterHandler for NullHandler {}

fn session() -> (mpsc::UnboundedSender<Vec<u8>>, mpsc::UnboundedReceiver<Vec<u8>>) {
    mpsc::unbounded_channel()
}

#[tokio::test]
async fn set_fans_out_to_every_peer_and_syncing_session() {
    let router = Router::new(None, NullHandler);

    let (tx1, mut rx1) = session();
    let (id1, _) = router.join(Role::Server, tx1);

    let (tx2, mut rx2) = session();
    let (id2, _) = router.join(Role::Server, tx2);

    router.set(Bytes::from_static(b"k"), Bytes::from_static(b"v"));

    let got1 = Message::decode(&rx1.recv().await.unwrap()).unwrap();
    let got2 = Message::decode(&rx2.recv().await.unwrap()).unwrap();

    assert_eq!(got1, Message::Set { key: Bytes::from_static(b"k"), value: Bytes::from_static(b"v") });
    assert_eq!(got2, got1);

    router.leave(id1);
    router.leave(id2);
}

#[tokio::test]
async fn get_with_no_peers_resolves_not_found_immediately() {
    let router = Router::new(None, NullHandler);

    let outcome = router.get(0, Bytes::from_static(b"missing")).await.unwrap();
    assert!(matches!(outcome, GetOutcome::NotFound));
}

#[tokio::test]
async fn get_dispatches_to_the_single_peer_and_correlates_the_answer() {
    let router = Router::new(None, NullHandler);

    let (tx, mut rx) = session();
    let (_id, _range) = router.join(Role::Server, tx);

    let pending = router.get(42, Bytes::from_static(b"k"));

    let dispatched = Message::decode(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(dispatched, Message::Get { rid: 42, key: Bytes::from_static(b"k") });

    router.got_answer(Message::Answer { rid: 42, value: Bytes::from_static(b"v") });

    let outcome = pending.await.unwrap();
    match outcome {
        GetOutcome::Value(v) => assert_eq!(v, Bytes::from_static(b"v")),
        GetOutcome::NotFound => panic!("expected a value"),
    }
}

#[tokio::test]
async fn peer_disconnect_fails_its_outstanding_calls() {
    let router = Router::new(None, NullHandler);

    let (tx, mut rx) = session();
    let (id, _range) = router.join(Role::Server, tx);

    let pending = router.get(7, Bytes::from_static(b"k"));
    let _ = rx.recv().await.unwrap();

    router.leave(id);

    assert!(matches!(pending.await.unwrap(), GetOutcome::NotFound));
}

#[tokio::test]
async fn switch_moves_a_peer_between_servers_and_syncing() {
    let router = Router::new(None, NullHandler);

    let (tx, mut rx) = session();
    let (id, _range) = router.join(Role::Server, tx);

    assert!(router.switch(id));
    // Now in `syncing`, not `servers`: a fresh GET must not be dispatched
    // to it, but fan-out mutations still reach it.
    let outcome = router.get(1, Bytes::from_static(b"k")).await.unwrap();
    assert!(matches!(outcome, GetOutcome::NotFound));

    router.set(Bytes::from_static(b"k"), Bytes::from_static(b"v"));
    let got = Message::decode(&rx.recv().await.unwrap()).unwrap();
    assert_eq!(got, Message::Set { key: Bytes::from_static(b"k"), value: Bytes::from_static(b"v") });

    assert!(router.switch(id));
}

#[tokio::test]
async fn client_sessions_cannot_switch() {
    let router = Router::new(None, NullHandler);

    let (tx, _rx) = session();
    let (id, _range) = router.join(Role::Client, tx);

    assert!(!router.switch(id));
}

#[tokio::test]
async fn range_starts_are_disjoint_and_reused_after_release() {
    let router = Router::new(None, NullHandler);

    let (tx_a, _) = session();
    let (id_a, range_a) = router.join(Role::Server, tx_a);

    let (tx_b, _) = session();
    let (id_b, range_b) = router.join(Role::Server, tx_b);

    assert_ne!(range_a.start, range_b.start);

    router.leave(id_a);

    let (tx_c, _) = session();
    let (_id_c, range_c) = router.join(Role::Server, tx_c);
    assert_eq!(range_c.start, range_a.start);

    router.leave(id_b);
}
