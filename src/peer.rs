//! Peer-side session (§4.6-4.7): serves the router's GET/SET/DEL/GETKEYS
//! against a local `KeyValueStore`, and drives the reset-sync algorithm
//! when started with `--reset`, grounded on `dbproto.py`'s
//! `DatabaseClientProtocol` for the step ordering.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::Context;
use bytes::Bytes;
use codec::{
    MAX_FRAME_LEN,
    handshake::Role,
    message::{Message, Rid},
    read_frame, write_frame,
};
use service::rid::RidAllocator;
use store::KeyValueStore;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

use crate::{config::Cli, handshake};

/// Issued GETs are paced by a cooperative sleep every this many requests
/// during a reset drain (§4.7 step 5).
const RESET_PACING_BATCH: usize = 128;

/// Connects out to the router, performs the handshake as SERVER, optionally
/// runs the reset-sync algorithm, then serves router requests against
/// `store` until the connection drops.
pub async fn run(cli: &Cli, store: Arc<dyn KeyValueStore>) -> anyhow::Result<()> {
    let mut stream = TcpStream::connect(cli.address()).await.context("connect to router")?;
    stream.set_nodelay(true).ok();

    let range = handshake::perform(&mut stream, cli.password.as_deref(), Role::Server)
        .await
        .context("peer handshake")?;

    let mut rids = RidAllocator::new(range);

    if cli.reset {
        log::info!("starting reset-sync");
        store.reset().context("reset local store before sync")?;
        run_reset(&mut stream, &store, &mut rids, cli.reset_sleep).await.context("reset-sync drain")?;
        log::info!("reset-sync complete, serving reads");
    }

    loop {
        let frame = match read_frame(&mut stream, MAX_FRAME_LEN).await {
            Ok(frame) => frame,
            Err(_) => break,
        };

        let message = match Message::decode(&frame) {
            Ok(message) => message,
            Err(_) => break,
        };

        match message {
            Message::Set { key, value } => {
                store.set(key, value)?;
            }
            Message::Del { key } => {
                store.delete(&key)?;
            }
            Message::Get { rid, key } => {
                let reply = match store.get(&key) {
                    Ok(value) => Message::Answer { rid, value },
                    Err(_) => Message::NotFound { rid },
                };
                write_frame(&mut stream, &reply.encode()).await?;
            }
            Message::GetKeys { rid } => {
                let keys = store.getkeys()?;
                write_frame(&mut stream, &Message::AllKeys { rid, keys }.encode()).await?;
            }
            // A second SWITCH here would only occur if we asked for one
            // ourselves, which only happens inside `run_reset`; a stray
            // one from the router is a protocol violation.
            _ => break,
        }
    }

    store.close()?;
    Ok(())
}

/// Drives §4.7's reset algorithm: switch to client-facing role, pull the
/// full key list, then drain it with paced GETs, applying fan-out
/// mutations as they arrive and cancelling any pull they supersede (the
/// §9/REDESIGN resolution of the S6 race and the DEL-after-GET case).
async fn run_reset<S>(
    stream: &mut S,
    store: &Arc<dyn KeyValueStore>,
    rids: &mut RidAllocator,
    reset_sleep: f64,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_frame(stream, &Message::Switch.encode()).await.context("send switch (enter reset)")?;

    let keys_rid = rids.alloc().context("allocate rid for reset getkeys")?;
    write_frame(stream, &Message::GetKeys { rid: keys_rid }.encode()).await.context("send reset getkeys")?;

    let mut to_sync: Vec<Bytes> = Vec::new();
    let mut reset_requests: HashMap<Rid, Bytes> = HashMap::new();
    let mut pending_keys: HashMap<Bytes, Rid> = HashMap::new();
    let mut got_keylist = false;
    let mut issued = 0usize;

    loop {
        if got_keylist && to_sync.is_empty() && reset_requests.is_empty() {
            break;
        }

        let frame = read_frame(stream, MAX_FRAME_LEN).await.context("reset: read frame")?;
        let message = Message::decode(&frame).context("reset: decode frame")?;

        match message {
            Message::AllKeys { rid, keys } if rid == keys_rid && !got_keylist => {
                got_keylist = true;
                to_sync = keys;
                rids.free(rid);
            }
            Message::Set { key, value } => {
                store.set(key.clone(), value).context("reset: apply fanned-out set")?;
                cancel_pull(&key, &mut to_sync, &mut reset_requests, &mut pending_keys);
            }
            Message::Del { key } => {
                store.delete(&key).context("reset: apply fanned-out del")?;
                cancel_pull(&key, &mut to_sync, &mut reset_requests, &mut pending_keys);
            }
            Message::Answer { rid, value } => {
                if let Some(key) = reset_requests.remove(&rid) {
                    pending_keys.remove(&key);
                    store.set(key, value).context("reset: apply pulled value")?;
                    rids.free(rid);
                }
            }
            Message::NotFound { rid } => {
                if let Some(key) = reset_requests.remove(&rid) {
                    pending_keys.remove(&key);
                    rids.free(rid);
                }
            }
            _ => {}
        }

        while got_keylist && !to_sync.is_empty() {
            let key = to_sync.pop().unwrap();
            let rid = rids.alloc().context("allocate rid for reset get")?;

            reset_requests.insert(rid, key.clone());
            pending_keys.insert(key.clone(), rid);
            write_frame(stream, &Message::Get { rid, key }.encode()).await.context("send reset get")?;

            issued += 1;
            if issued % RESET_PACING_BATCH == 0 {
                tokio::time::sleep(Duration::from_secs_f64(reset_sleep)).await;
            }
        }
    }

    write_frame(stream, &Message::Switch.encode()).await.context("send switch (leave reset)")?;
    Ok(())
}

/// A fan-out mutation for `key` supersedes any pull still queued
/// (`to_sync`) and cancels any pull already in flight (`reset_requests`),
/// so a lagging ANSWER for the pre-mutation value is dropped on arrival
/// instead of overwriting what the mutation just wrote.
fn cancel_pull(
    key: &Bytes,
    to_sync: &mut Vec<Bytes>,
    reset_requests: &mut HashMap<Rid, Bytes>,
    pending_keys: &mut HashMap<Bytes, Rid>,
) {
    to_sync.retain(|k| k != key);

    if let Some(rid) = pending_keys.remove(key) {
        reset_requests.remove(&rid);
    }
}

#[cfg(test)]
mod tests {
    use codec::handshake::RidRange;
    use store::RamStore;
    use tokio::io::duplex;

    use super::*;

    /// Reproduces the S6 race directly: a fan-out SET for a key arrives
    /// while that key's reset pull is still in flight, then a stale ANSWER
    /// for the same (now-cancelled) request id arrives after it. The stale
    /// answer must be dropped, not overwrite the fanned-out value — the
    /// whole reason `cancel_pull` removes the request id from
    /// `reset_requests`/`pending_keys` the moment the supersession is
    /// known, rather than only filtering `to_sync`.
    #[tokio::test]
    async fn reset_drops_stale_answer_for_key_superseded_by_fanout() {
        let (mut router_side, mut peer_side) = duplex(4096);
        let store: Arc<dyn store::KeyValueStore> = Arc::new(RamStore::new());
        let mut rids = RidAllocator::new(RidRange { start: 0, end: 16 });

        let reset = tokio::spawn(async move {
            run_reset(&mut peer_side, &store, &mut rids, 0.0).await.unwrap();
            store
        });

        // Step 1-2: enter reset, ask for the full key list.
        assert_eq!(Message::decode(&read_frame(&mut router_side, MAX_FRAME_LEN).await.unwrap()).unwrap(), Message::Switch);
        let Message::GetKeys { rid: keys_rid } = Message::decode(&read_frame(&mut router_side, MAX_FRAME_LEN).await.unwrap()).unwrap() else {
            panic!("expected GetKeys");
        };

        write_frame(
            &mut router_side,
            &Message::AllKeys { rid: keys_rid, keys: vec![Bytes::from_static(b"k"), Bytes::from_static(b"k2")] }.encode(),
        )
        .await
        .unwrap();

        // Two GETs come back, one per key; figure out which rid is which.
        let first = Message::decode(&read_frame(&mut router_side, MAX_FRAME_LEN).await.unwrap()).unwrap();
        let second = Message::decode(&read_frame(&mut router_side, MAX_FRAME_LEN).await.unwrap()).unwrap();

        let mut rid_for = std::collections::HashMap::new();
        for message in [first, second] {
            if let Message::Get { rid, key } = message {
                rid_for.insert(key, rid);
            } else {
                panic!("expected Get");
            }
        }
        let rid_k = rid_for[&Bytes::from_static(b"k")];
        let rid_k2 = rid_for[&Bytes::from_static(b"k2")];

        // The fan-out SET for "k" lands while its pull is still in flight...
        write_frame(&mut router_side, &Message::Set { key: Bytes::from_static(b"k"), value: Bytes::from_static(b"new") }.encode())
            .await
            .unwrap();

        // ...then a stale ANSWER for that same (now-cancelled) request id
        // arrives, as it would if peer A's reply had simply been slow.
        write_frame(&mut router_side, &Message::Answer { rid: rid_k, value: Bytes::from_static(b"stale") }.encode())
            .await
            .unwrap();

        // Finish the unrelated second pull so the reset drain can exit.
        write_frame(&mut router_side, &Message::Answer { rid: rid_k2, value: Bytes::from_static(b"v2") }.encode())
            .await
            .unwrap();

        assert_eq!(Message::decode(&read_frame(&mut router_side, MAX_FRAME_LEN).await.unwrap()).unwrap(), Message::Switch);

        let store = reset.await.unwrap();
        assert_eq!(store.get(b"k").unwrap(), Bytes::from_static(b"new"));
        assert_eq!(store.get(b"k2").unwrap(), Bytes::from_static(b"v2"));
    }

    #[test]
    fn cancel_pull_removes_queued_and_in_flight_entries() {
        let mut to_sync = vec![Bytes::from_static(b"a"), Bytes::from_static(b"k")];
        let mut reset_requests = HashMap::new();
        let mut pending_keys = HashMap::new();

        reset_requests.insert(7, Bytes::from_static(b"other"));
        pending_keys.insert(Bytes::from_static(b"other"), 7);
        reset_requests.insert(9, Bytes::from_static(b"k"));
        pending_keys.insert(Bytes::from_static(b"k"), 9);

        cancel_pull(&Bytes::from_static(b"k"), &mut to_sync, &mut reset_requests, &mut pending_keys);

        assert_eq!(to_sync, vec![Bytes::from_static(b"a")]);
        assert!(!reset_requests.contains_key(&9));
        assert!(!pending_keys.contains_key(&Bytes::from_static(b"k")));
        // Unrelated entries are untouched.
        assert!(reset_requests.contains_key(&7));
    }
}
