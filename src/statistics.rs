//! Process-wide counters updated on session and protocol events, exposed
//! through the control API's `/stats` route and, optionally, a prometheus
//! text exporter.

use std::sync::{
    Arc,
    atomic::{AtomicI64, AtomicU64},
};

use codec::handshake::Role;

/// [issue](https://github.com/mycrl/turn-rs/issues/101)-style Prometheus
/// exporter, adapted to this router's own counters.
#[cfg(feature = "prometheus")]
pub mod prometheus {
    use std::sync::LazyLock;

    use anyhow::Result;
    use prometheus::{Encoder, IntCounter, IntGauge, TextEncoder, register_int_counter, register_int_gauge};

    pub static METRICS: LazyLock<Metrics> = LazyLock::new(|| Metrics::new().expect("failed to register metrics"));

    pub struct Metrics {
        pub sessions_accepted: IntCounter,
        pub peers_active: IntGauge,
        pub clients_active: IntGauge,
        pub set_fanned_out: IntCounter,
        pub del_fanned_out: IntCounter,
        pub get_served: IntCounter,
        pub getkeys_served: IntCounter,
        pub handshake_failures: IntCounter,
    }

    impl Metrics {
        pub fn new() -> Result<Self> {
            Ok(Self {
                sessions_accepted: register_int_counter!("kvndb_sessions_accepted", "Sessions accepted by the router")?,
                peers_active: register_int_gauge!("kvndb_peers_active", "Peers currently in the servers or syncing sets")?,
                clients_active: register_int_gauge!("kvndb_clients_active", "Clients currently connected")?,
                set_fanned_out: register_int_counter!("kvndb_set_fanned_out", "SET frames fanned out to peers")?,
                del_fanned_out: register_int_counter!("kvndb_del_fanned_out", "DEL frames fanned out to peers")?,
                get_served: register_int_counter!("kvndb_get_served", "GET requests dispatched to a peer")?,
                getkeys_served: register_int_counter!("kvndb_getkeys_served", "GETKEYS requests dispatched to a peer")?,
                handshake_failures: register_int_counter!("kvndb_handshake_failures", "Handshakes that failed before reaching an operational mode")?,
            })
        }
    }

    pub fn generate_metrics(buf: &mut Vec<u8>) -> Result<()> {
        TextEncoder::new().encode(&prometheus::gather(), buf)?;
        Ok(())
    }
}

#[derive(Default)]
struct Count(AtomicU64);

impl Count {
    fn add(&self, value: u64) {
        self.0.fetch_add(value, std::sync::atomic::Ordering::Relaxed);
    }

    fn get(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[derive(Default)]
struct Gauge(AtomicI64);

impl Gauge {
    fn add(&self, delta: i64) {
        self.0.fetch_add(delta, std::sync::atomic::Ordering::Relaxed);
    }

    fn get(&self) -> i64 {
        self.0.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[derive(Default, Clone)]
pub struct Statistics(Arc<Inner>);

#[derive(Default)]
struct Inner {
    sessions_accepted: Count,
    peers_active: Gauge,
    clients_active: Gauge,
    set_fanned_out: Count,
    del_fanned_out: Count,
    get_served: Count,
    getkeys_served: Count,
    handshake_failures: Count,
}

/// Snapshot returned by the control API.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Snapshot {
    pub sessions_accepted: u64,
    pub peers_active: i64,
    pub clients_active: i64,
    pub set_fanned_out: u64,
    pub del_fanned_out: u64,
    pub get_served: u64,
    pub getkeys_served: u64,
    pub handshake_failures: u64,
}

impl Statistics {
    /// A session reached an operational mode (§4.2 step 3): bumps the
    /// lifetime accepted counter and the role's active gauge.
    pub fn session_joined(&self, role: Role) {
        self.0.sessions_accepted.add(1);
        self.enter_role(role);

        #[cfg(feature = "prometheus")]
        self::prometheus::METRICS.sessions_accepted.inc();
    }

    /// An operational session's connection was lost; `role` is its mode at
    /// the moment of loss, since a peer mid-reset has switched to `Client`.
    pub fn session_left(&self, role: Role) {
        self.leave_role(role);
    }

    /// A SWITCH moved a session between gauges without changing the total
    /// live-session count, so it doesn't touch `sessions_accepted`.
    pub fn session_switched(&self, from: Role, to: Role) {
        self.leave_role(from);
        self.enter_role(to);
    }

    fn enter_role(&self, role: Role) {
        match role {
            Role::Server => self.0.peers_active.add(1),
            Role::Client => self.0.clients_active.add(1),
        }

        #[cfg(feature = "prometheus")]
        match role {
            Role::Server => self::prometheus::METRICS.peers_active.inc(),
            Role::Client => self::prometheus::METRICS.clients_active.inc(),
        }
    }

    fn leave_role(&self, role: Role) {
        match role {
            Role::Server => self.0.peers_active.add(-1),
            Role::Client => self.0.clients_active.add(-1),
        }

        #[cfg(feature = "prometheus")]
        match role {
            Role::Server => self::prometheus::METRICS.peers_active.dec(),
            Role::Client => self::prometheus::METRICS.clients_active.dec(),
        }
    }

    pub fn set_fanned_out(&self) {
        self.0.set_fanned_out.add(1);

        #[cfg(feature = "prometheus")]
        self::prometheus::METRICS.set_fanned_out.inc();
    }

    pub fn del_fanned_out(&self) {
        self.0.del_fanned_out.add(1);

        #[cfg(feature = "prometheus")]
        self::prometheus::METRICS.del_fanned_out.inc();
    }

    pub fn get_served(&self) {
        self.0.get_served.add(1);

        #[cfg(feature = "prometheus")]
        self::prometheus::METRICS.get_served.inc();
    }

    pub fn getkeys_served(&self) {
        self.0.getkeys_served.add(1);

        #[cfg(feature = "prometheus")]
        self::prometheus::METRICS.getkeys_served.inc();
    }

    pub fn handshake_failed(&self) {
        self.0.handshake_failures.add(1);

        #[cfg(feature = "prometheus")]
        self::prometheus::METRICS.handshake_failures.inc();
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            sessions_accepted: self.0.sessions_accepted.get(),
            peers_active: self.0.peers_active.get(),
            clients_active: self.0.clients_active.get(),
            set_fanned_out: self.0.set_fanned_out.get(),
            del_fanned_out: self.0.del_fanned_out.get(),
            get_served: self.0.get_served.get(),
            getkeys_served: self.0.getkeys_served.get(),
            handshake_failures: self.0.handshake_failures.get(),
        }
    }
}
