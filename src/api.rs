use std::{sync::Arc, time::Instant};

use axum::{
    Json, Router as AxumRouter,
    http::StatusCode,
    response::{IntoResponse, Sse, sse::KeepAlive},
    routing::get,
};

use serde_json::json;
use tokio::net::TcpListener;

use crate::{observer::Observer, statistics::Statistics};

struct ApiState {
    router: Arc<service::Router<Observer>>,
    statistics: Statistics,
    uptime: Instant,
}

pub mod events {
    use std::sync::LazyLock;

    use axum::response::sse::Event;
    use serde::Serialize;
    use tokio::sync::broadcast::{Sender, channel};
    use tokio_stream::wrappers::BroadcastStream;

    static CHANNEL: LazyLock<Sender<Event>> = LazyLock::new(|| channel(64).0);

    pub fn get_event_stream() -> BroadcastStream<Event> {
        BroadcastStream::new(CHANNEL.subscribe())
    }

    pub fn send_with_stream<T, F>(event: &str, handle: F)
    where
        F: FnOnce() -> T,
        T: Serialize,
    {
        if CHANNEL.receiver_count() > 0 {
            let _ = CHANNEL.send(Event::default().event(event).json_data(handle()).unwrap());
        }
    }
}

/// Starts the control API HTTP surface.
///
/// Warn: this server has no authentication. It exposes session identifiers
/// and operational counters; do not expose it to an untrusted network.
pub async fn start_server(
    listen: std::net::SocketAddr,
    router: Arc<service::Router<Observer>>,
    statistics: Statistics,
) -> anyhow::Result<()> {
    let state = Arc::new(ApiState { router, statistics, uptime: Instant::now() });

    #[allow(unused_mut)]
    let mut app = AxumRouter::new()
        .route(
            "/stats",
            get(|axum::extract::State(state): axum::extract::State<Arc<ApiState>>| async move {
                Json(json!({
                    "uptime_secs": state.uptime.elapsed().as_secs(),
                    "servers": state.router.server_count(),
                    "syncing": state.router.syncing_count(),
                    "counters": state.statistics.snapshot(),
                }))
            }),
        )
        .route(
            "/sessions",
            get(|axum::extract::State(state): axum::extract::State<Arc<ApiState>>| async move {
                let sessions: Vec<_> = state
                    .router
                    .sessions_snapshot()
                    .into_iter()
                    .map(|(id, role, mode)| json!({ "id": format!("{id:?}"), "role": format!("{role:?}"), "mode": format!("{mode:?}") }))
                    .collect();

                Json(sessions)
            }),
        )
        .route(
            "/events",
            get(|| async move { Sse::new(events::get_event_stream()).keep_alive(KeepAlive::default()) }),
        );

    #[cfg(feature = "prometheus")]
    {
        use axum::http::header::CONTENT_TYPE;

        app = app.route(
            "/metrics",
            get(|| async move {
                let mut buf = Vec::with_capacity(4096);

                if crate::statistics::prometheus::generate_metrics(&mut buf).is_err() {
                    StatusCode::EXPECTATION_FAILED.into_response()
                } else {
                    ([(CONTENT_TYPE, "text/plain")], buf).into_response()
                }
            }),
        );
    }

    let listener = TcpListener::bind(listen).await?;
    log::info!("api server listening on {listen}");

    axum::serve(listener, app.with_state(state)).await?;
    Ok(())
}
