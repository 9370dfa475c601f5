//! Library entry point wiring the CLI surface (§6.3) to the router, peer
//! and client runtimes. Split out from `main.rs` so the integration tests
//! can drive a whole process without going through argv.

#[cfg(feature = "api")]
pub mod api;

pub mod client;
pub mod config;
pub mod conn;
pub mod handshake;
pub mod logging;
pub mod observer;
pub mod peer;
pub mod server;
pub mod statistics;

use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;

use self::{
    config::{Cli, Mode},
    observer::Observer,
    statistics::Statistics,
};

use service::Router;

/// Dispatches to the runtime `cli.mode` selects: the router's accept loop,
/// a database peer backed by one of the three store kinds, or the
/// interactive client shell.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.mode {
        Mode::Router => run_router(cli).await,
        Mode::Ram => peer::run(&cli, Arc::new(store::RamStore::new())).await,
        Mode::Dbm => {
            let path = cli.arguments.first().context("dbm mode requires a snapshot file path")?;
            peer::run(&cli, Arc::new(store::DbmStore::open(path)?)).await
        }
        Mode::Dir => {
            let path = cli.arguments.first().context("dir mode requires a directory path")?;
            peer::run(&cli, Arc::new(store::DirStore::open(path)?)).await
        }
        Mode::Cmd => client::run(&cli).await,
    }
}

async fn run_router(cli: Cli) -> anyhow::Result<()> {
    let statistics = Statistics::default();
    let observer = Observer::new(statistics.clone());
    let password = cli.password.clone().map(Bytes::from);
    let router: Arc<Router<Observer>> = Router::new(password, observer);

    #[cfg(feature = "api")]
    if let Some(api_listen) = &cli.api_listen {
        let addr: std::net::SocketAddr = api_listen.parse().context("invalid --api-listen address")?;
        let router = router.clone();
        let statistics = statistics.clone();

        tokio::spawn(async move {
            if let Err(e) = api::start_server(addr, router, statistics).await {
                log::error!("control api server stopped: {e}");
            }
        });
    }

    server::start(&cli.address(), router, statistics).await
}
