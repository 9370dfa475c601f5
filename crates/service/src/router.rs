//! The router registry: tracks connected peers and clients, allocates RID
//! ranges, correlates outstanding GET/GETKEYS requests to their
//! originators, and performs fan-out and single-peer read dispatch.
//!
//! See §3-4.4 of the routing design this crate implements: `servers`,
//! `syncing`, `all` and `calls` below are exactly those four router
//! collections (the spec explicitly sanctions parallelizing what its
//! origin models as single-threaded state). `servers`/`syncing` share one
//! lock (`role_sets`) since a session only ever moves between the two of
//! them together, on SWITCH, and that move must be atomic; `all` (i.e.
//! `sessions`) and `calls` each keep their own lock, held only across the
//! lookup+mutation they protect.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use ahash::HashSet as AHashSet;
use bytes::Bytes;
use codec::{
    handshake::{RidRange, Role},
    message::{Message, Rid},
};
use parking_lot::{Mutex, RwLock};
use rand::seq::IteratorRandom;
use tokio::sync::{mpsc, oneshot};

use crate::table::Table;

/// RID-range chunk size handed to each newly registered session.
pub const RANGE_SIZE: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

/// Observability hook for router events, implemented by the binary crate's
/// `Observer` to drive logging, statistics and the control API's SSE feed.
/// Mirrors the collaborator-handler shape the backing service crate uses
/// for its own session lifecycle notifications.
pub trait RouterHandler: Send + Sync {
    #[allow(unused_variables)]
    fn on_join(&self, id: SessionId, role: Role) {}
    #[allow(unused_variables)]
    fn on_switch(&self, id: SessionId, now_role: Role) {}
    #[allow(unused_variables)]
    fn on_leave(&self, id: SessionId, last_mode: Role) {}
    #[allow(unused_variables)]
    fn on_fanout(&self, op: &'static str) {}
}

/// Outcome of a dispatched GET.
#[derive(Debug, Clone)]
pub enum GetOutcome {
    Value(Bytes),
    NotFound,
}

enum PendingCall {
    Get { reply: oneshot::Sender<GetOutcome>, dispatched_to: SessionId },
    GetKeys { reply: oneshot::Sender<Vec<Bytes>>, dispatched_to: SessionId },
}

impl PendingCall {
    fn dispatched_to(&self) -> SessionId {
        match self {
            Self::Get { dispatched_to, .. } => *dispatched_to,
            Self::GetKeys { dispatched_to, .. } => *dispatched_to,
        }
    }

    /// Completes the call with a transient failure, used when the peer it
    /// was dispatched to disconnects before answering (resolves the
    /// "calls leaked on peer disconnect" design note).
    fn fail(self) {
        match self {
            Self::Get { reply, .. } => {
                let _ = reply.send(GetOutcome::NotFound);
            }
            Self::GetKeys { reply, .. } => {
                let _ = reply.send(Vec::new());
            }
        }
    }
}

struct Session {
    role: Role,
    mode: Role,
    range_start: u64,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

/// `servers` and `syncing` move a session between themselves together on
/// every SWITCH (§4.7); sharing one lock makes that move atomic instead of
/// leaving a window, visible to a concurrent `fanout_targets()` call on
/// another task, where a switching session sits in neither set.
#[derive(Default)]
struct RoleSets {
    servers: AHashSet<SessionId>,
    syncing: AHashSet<SessionId>,
}

pub struct Router<H> {
    sessions: RwLock<Table<SessionId, Session>>,
    role_sets: RwLock<RoleSets>,
    range_starts: Mutex<AHashSet<u64>>,
    calls: Mutex<Table<Rid, PendingCall>>,
    next_id: AtomicU64,
    password: Option<Bytes>,
    handler: H,
}

impl<H> Router<H>
where
    H: RouterHandler,
{
    pub fn new(password: Option<Bytes>, handler: H) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(Table::default()),
            role_sets: RwLock::new(RoleSets::default()),
            range_starts: Mutex::new(AHashSet::default()),
            calls: Mutex::new(Table::default()),
            next_id: AtomicU64::new(1),
            password,
            handler,
        })
    }

    pub fn password(&self) -> Option<&Bytes> {
        self.password.as_ref()
    }

    /// Allocates a fresh RID range (§4.3). Scans candidate starts
    /// `k * RANGE_SIZE` for the first not currently held; the held set is
    /// a hash set rather than a scan of every live session, so each
    /// candidate check is O(1).
    ///
    /// # Test
    ///
    /// ```
    /// use kvndb_service::router::{Router, RouterHandler, RANGE_SIZE};
    ///
    /// #[derive(Clone)]
    /// struct NullHandler;
    /// impl RouterHandler for NullHandler {}
    ///
    /// let router = Router::new(None, NullHandler);
    /// let a = router.allocate_range();
    /// let b = router.allocate_range();
    /// assert_eq!(a.start, 0);
    /// assert_eq!(b.start, RANGE_SIZE);
    ///
    /// router.release_range(a.start);
    /// let c = router.allocate_range();
    /// assert_eq!(c.start, 0);
    /// ```
    pub fn allocate_range(&self) -> RidRange {
        let mut held = self.range_starts.lock();

        let mut k = 0u64;
        loop {
            let start = k * RANGE_SIZE;
            if !held.contains(&start) {
                held.insert(start);
                return RidRange { start, end: start + RANGE_SIZE };
            }
            k += 1;
        }
    }

    pub fn release_range(&self, start: u64) {
        self.range_starts.lock().remove(&start);
    }

    /// Registers a freshly handshaken session and appends it to `all`
    /// (and, for SERVER role, to `servers`).
    pub fn join(self: &Arc<Self>, role: Role, outbound: mpsc::UnboundedSender<Vec<u8>>) -> (SessionId, RidRange) {
        let range = self.allocate_range();
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        self.sessions
            .write()
            .insert(id, Session { role, mode: role, range_start: range.start, outbound });

        if role == Role::Server {
            self.role_sets.write().servers.insert(id);
        }

        self.handler.on_join(id, role);
        (id, range)
    }

    /// Removes a session from every router set and fails any outstanding
    /// calls dispatched to it (resolves the peer-disconnect leak design
    /// note: a lost peer's pending GET/GETKEYS are completed as a
    /// transient NotFound/empty-list rather than left to rot in `calls`).
    pub fn leave(&self, id: SessionId) {
        let removed = {
            let mut sessions = self.sessions.write();
            let mut role_sets = self.role_sets.write();
            role_sets.servers.remove(&id);
            role_sets.syncing.remove(&id);
            sessions.remove(&id)
        };

        let Some(session) = removed else {
            return;
        };

        self.release_range(session.range_start);

        let mut calls = self.calls.lock();
        let stuck: Vec<Rid> = calls
            .iter()
            .filter(|(_, call)| call.dispatched_to() == id)
            .map(|(rid, _)| *rid)
            .collect();

        for rid in stuck {
            if let Some(call) = calls.remove(&rid) {
                call.fail();
            }
        }
        drop(calls);

        self.handler.on_leave(id, session.mode);
    }

    /// Flips a peer-capable session between SERVER and CLIENT mode on a
    /// SWITCH opcode (§4.7). Returns `false` (a protocol violation in the
    /// caller's eyes) if the session never joined as SERVER, since only
    /// peers may switch.
    pub fn switch(&self, id: SessionId) -> bool {
        let Some(declared_role) = self.sessions.read().get(&id).map(|s| s.role) else {
            return false;
        };

        if declared_role != Role::Server {
            return false;
        }

        let new_mode = {
            let mut role_sets = self.role_sets.write();
            if role_sets.servers.remove(&id) {
                role_sets.syncing.insert(id);
                Role::Client
            } else {
                role_sets.syncing.remove(&id);
                role_sets.servers.insert(id);
                Role::Server
            }
        };

        if let Some(session) = self.sessions.write().get_mut(&id) {
            session.mode = new_mode;
        }

        self.handler.on_switch(id, new_mode);
        true
    }

    fn fanout_targets(&self) -> Vec<mpsc::UnboundedSender<Vec<u8>>> {
        let sessions = self.sessions.read();
        let role_sets = self.role_sets.read();

        role_sets
            .servers
            .iter()
            .chain(role_sets.syncing.iter())
            .filter_map(|id| sessions.get(id).map(|s| s.outbound.clone()))
            .collect()
    }

    /// set(key, value): fan a SET frame out to every session in
    /// `servers ∪ syncing`. No reply.
    pub fn set(&self, key: Bytes, value: Bytes) {
        let payload = Message::Set { key, value }.encode();
        for target in self.fanout_targets() {
            let _ = target.send(payload.clone());
        }
        self.handler.on_fanout("set");
    }

    /// delete(key): fan a DEL frame out to every session in
    /// `servers ∪ syncing`. No reply.
    pub fn delete(&self, key: Bytes) {
        let payload = Message::Del { key }.encode();
        for target in self.fanout_targets() {
            let _ = target.send(payload.clone());
        }
        self.handler.on_fanout("delete");
    }

    /// Snapshot of every live session's id, declared role and current mode,
    /// for the control API's `/sessions` route and for statistics.
    pub fn sessions_snapshot(&self) -> Vec<(SessionId, Role, Role)> {
        self.sessions.read().iter().map(|(id, s)| (*id, s.role, s.mode)).collect()
    }

    pub fn server_count(&self) -> usize {
        self.role_sets.read().servers.len()
    }

    pub fn syncing_count(&self) -> usize {
        self.role_sets.read().syncing.len()
    }

    fn pick_server(&self) -> Option<(SessionId, mpsc::UnboundedSender<Vec<u8>>)> {
        let id = {
            let role_sets = self.role_sets.read();
            *role_sets.servers.iter().choose(&mut rand::rng())?
        };

        let sessions = self.sessions.read();
        sessions.get(&id).map(|s| (id, s.outbound.clone()))
    }

    /// get(rid, key): dispatches to one randomly chosen peer, or completes
    /// immediately with NotFound if no peer is connected.
    pub fn get(&self, rid: Rid, key: Bytes) -> oneshot::Receiver<GetOutcome> {
        let (tx, rx) = oneshot::channel();

        match self.pick_server() {
            None => {
                let _ = tx.send(GetOutcome::NotFound);
            }
            Some((id, outbound)) => {
                self.calls.lock().insert(rid, PendingCall::Get { reply: tx, dispatched_to: id });
                let _ = outbound.send(Message::Get { rid, key }.encode());
            }
        }

        rx
    }

    /// getkeys(rid): dispatches to one randomly chosen peer, or completes
    /// immediately with an empty key list if no peer is connected (this is
    /// not an error case per §4.4).
    pub fn getkeys(&self, rid: Rid) -> oneshot::Receiver<Vec<Bytes>> {
        let (tx, rx) = oneshot::channel();

        match self.pick_server() {
            None => {
                let _ = tx.send(Vec::new());
            }
            Some((id, outbound)) => {
                self.calls.lock().insert(rid, PendingCall::GetKeys { reply: tx, dispatched_to: id });
                let _ = outbound.send(Message::GetKeys { rid }.encode());
            }
        }

        rx
    }

    /// got_answer(opcode, payload): completes the pending call keyed by
    /// the RID in an ANSWER/NOTFOUND/ALLKEYS frame. A RID with no pending
    /// call (already answered, or never dispatched by this router) is
    /// silently dropped, as is a reply type that doesn't match what the
    /// pending call was waiting for.
    pub fn got_answer(&self, message: Message) {
        let rid = match &message {
            Message::Answer { rid, .. } | Message::NotFound { rid } | Message::AllKeys { rid, .. } => *rid,
            _ => return,
        };

        let Some(call) = self.calls.lock().remove(&rid) else {
            return;
        };

        match (call, message) {
            (PendingCall::Get { reply, .. }, Message::Answer { value, .. }) => {
                let _ = reply.send(GetOutcome::Value(value));
            }
            (PendingCall::Get { reply, .. }, Message::NotFound { .. }) => {
                let _ = reply.send(GetOutcome::NotFound);
            }
            (PendingCall::GetKeys { reply, .. }, Message::AllKeys { keys, .. }) => {
                let _ = reply.send(keys);
            }
            _ => {}
        }
    }
}
