//! Public interface to the QuorumKV core library, linked by the replica
//! server executables and the workload driver.
//!
//! Two client-side quorum protocols share one replica wire surface: an
//! ABD-style multi-writer multi-reader atomic register, and a lease-based
//! mutual-exclusion ("blocking") protocol.

#[macro_use]
mod utils;

mod client;
mod protocol;
mod server;

pub use client::{
    parse_servers, AbdClient, BlockingClient, KvClient, KvProtocol,
    ReadResponse,
};
pub use protocol::{ClientId, Reply, Request, Tag};
pub use server::{serve, AbdStore, BlockingStore, Store, LOCK_LEASE};
pub use utils::{bind_reuse, KvError, LISTEN_BACKLOG, SOCKET_TIMEOUT};
