use codec::handshake::Role;
use service::{RouterHandler, SessionId};

#[cfg(feature = "api")]
use serde_json::json;

use crate::statistics::Statistics;

#[derive(Clone)]
pub struct Observer {
    statistics: Statistics,
}

impl Observer {
    pub fn new(statistics: Statistics) -> Self {
        Self { statistics }
    }
}

impl RouterHandler for Observer {
    fn on_join(&self, id: SessionId, role: Role) {
        log::info!("session joined: id={id:?}, role={role:?}");
        self.statistics.session_joined(role);

        #[cfg(feature = "api")]
        crate::api::events::send_with_stream("join", || json!({ "id": format!("{id:?}"), "role": format!("{role:?}") }));
    }

    fn on_switch(&self, id: SessionId, now_role: Role) {
        log::info!("session switched: id={id:?}, now={now_role:?}");

        let previous_role = match now_role {
            Role::Server => Role::Client,
            Role::Client => Role::Server,
        };
        self.statistics.session_switched(previous_role, now_role);

        #[cfg(feature = "api")]
        crate::api::events::send_with_stream("switch", || json!({ "id": format!("{id:?}"), "now_role": format!("{now_role:?}") }));
    }

    fn on_leave(&self, id: SessionId, last_mode: Role) {
        log::info!("session left: id={id:?}");
        self.statistics.session_left(last_mode);

        #[cfg(feature = "api")]
        crate::api::events::send_with_stream("leave", || json!({ "id": format!("{id:?}") }));
    }

    fn on_fanout(&self, op: &'static str) {
        match op {
            "set" => self.statistics.set_fanned_out(),
            "delete" => self.statistics.del_fanned_out(),
            _ => {}
        }
    }
}
