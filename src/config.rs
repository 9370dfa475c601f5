//! Command line surface. One binary, a `mode` subcommand picks router /
//! peer-store-kind / interactive client, the remaining flags are shared
//! across every mode the way the original `argparse` surface laid them
//! out (host/port are positional, `-t/-e/-p/-v/-l/-r/--reset-sleep` are
//! shared, and `arguments` are passed through to the chosen store kind).

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Default listen/connect port when neither `port` nor `--endpoint` is given.
pub const DEFAULT_PORT: u16 = 54565;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "lowercase")]
pub enum Mode {
    /// Run the central router.
    Router,
    /// Connect as a database peer backed by an in-memory store.
    Ram,
    /// Connect as a database peer backed by a single-file snapshot store.
    Dbm,
    /// Connect as a database peer backed by a one-file-per-key directory store.
    Dir,
    /// Connect as an interactive command-line client.
    Cmd,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "lowercase")]
pub enum EndpointType {
    Tcp,
    Tcp6,
    /// Accepted for compatibility with the original endpoint-type surface;
    /// channel security is an explicit open question this crate does not
    /// implement (see DESIGN.md).
    Tls,
}

#[derive(Parser, Debug)]
#[command(
    about = env!("CARGO_PKG_DESCRIPTION"),
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// What mode the process should operate in.
    pub mode: Mode,

    /// Host to serve on (router) or connect to (peer/cmd).
    #[arg(default_value = "0.0.0.0")]
    pub host: String,

    /// Port to serve on/connect to.
    #[arg(default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Endpoint type to use.
    #[arg(short = 't', long = "type", default_value = "tcp")]
    pub endpoint_type: EndpointType,

    /// Use this endpoint (`host:port`) instead of the `host`/`port` pair.
    #[arg(short = 'e', long)]
    pub endpoint: Option<String>,

    /// Shared password for the router, or the password a peer/client
    /// authenticates with.
    #[arg(short = 'p', long)]
    pub password: Option<String>,

    /// Print more messages.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// File to log to (default: stdout).
    #[arg(short = 'l', long)]
    pub logfile: Option<PathBuf>,

    /// Reset the local database and reload it from the router's collective
    /// before serving reads (peer modes only).
    #[arg(short = 'r', long)]
    pub reset: bool,

    /// Wait this many seconds every 128 requests sent during a reset drain.
    #[arg(long = "reset-sleep", default_value_t = 0.2)]
    pub reset_sleep: f64,

    /// Arguments passed to the chosen store backend (e.g. a file/directory
    /// path for `dbm`/`dir`).
    pub arguments: Vec<String>,

    /// Bind the control API (`/stats`, `/sessions`, `/events`, and
    /// `/metrics` when built with the `prometheus` feature) on this
    /// address, router mode only. Unset disables the control API.
    #[cfg(feature = "api")]
    #[arg(long = "api-listen")]
    pub api_listen: Option<String>,
}

impl Cli {
    /// Resolves the `host`/`port` pair and `--endpoint` override into a
    /// single address string suitable for `ToSocketAddrs`.
    ///
    /// The `host` default is meant for the router's bind-all-interfaces
    /// case; a peer or client connecting out with no explicit host/endpoint
    /// should reach for the loopback interface instead of dialing
    /// `0.0.0.0`.
    pub fn address(&self) -> String {
        if let Some(endpoint) = &self.endpoint {
            return endpoint.clone();
        }

        let host = if self.mode != Mode::Router && self.host == "0.0.0.0" {
            "127.0.0.1"
        } else {
            self.host.as_str()
        };

        format!("{host}:{}", self.port)
    }
}
