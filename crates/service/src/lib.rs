//! Session registry and routing core: everything in §3-4.4 and §4.8 of the
//! routing design except the wire format itself (that's `kvndb-codec`) and
//! the per-process socket I/O (that's the `kvndb` binary crate).

pub mod rid;
pub mod router;
mod table;

pub use router::{GetOutcome, Router, RouterHandler, SessionId};
