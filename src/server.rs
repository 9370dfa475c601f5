//! Router TCP listener: accepts connections and hands each one to `conn`,
//! which drives the authoritative side of the handshake (§4.2) and the
//! operational dispatch (§4.4-4.7) for its lifetime.

use std::sync::Arc;

use anyhow::Context;
use service::Router;
use tokio::net::TcpListener;

use crate::{conn, observer::Observer, statistics::Statistics};

pub async fn start(address: &str, router: Arc<Router<Observer>>, statistics: Statistics) -> anyhow::Result<()> {
    let listener = TcpListener::bind(address).await.context("bind router listener")?;
    log::info!("router listening on {address}");
    serve(listener, router, statistics).await
}

/// Accept loop over an already-bound listener, split out from `start` so
/// tests can bind an ephemeral port (`127.0.0.1:0`), read back the address
/// the OS picked, and only then start accepting.
pub async fn serve(listener: TcpListener, router: Arc<Router<Observer>>, statistics: Statistics) -> anyhow::Result<()> {
    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                log::warn!("accept failed: {e}");
                continue;
            }
        };

        log::debug!("accepted connection from {peer_addr}");
        tokio::spawn(conn::handle(stream, router.clone(), statistics.clone()));
    }
}
