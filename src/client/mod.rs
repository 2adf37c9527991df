//! Client-side modules: the quorum protocol cores and the capability trait
//! the workload driver is polymorphic over.

mod abd;
mod blocking;
mod rpc;

pub use abd::AbdClient;
pub use blocking::BlockingClient;
pub use rpc::ReadResponse;

use std::net::SocketAddr;

use crate::protocol::ClientId;
use crate::utils::KvError;

use async_trait::async_trait;

/// Read/write capability offered by both protocol cores.
#[async_trait]
pub trait KvClient: Send + Sync {
    /// Reads the value of `key` through the protocol's quorum exchange.
    /// An unwritten key reads as the empty string. Fails when the quorum
    /// requirement cannot be met.
    async fn get(&self, key: &str) -> Result<String, KvError>;

    /// Writes `value` under `key` through the protocol's quorum exchange.
    async fn put(&self, key: &str, value: &str) -> Result<(), KvError>;
}

/// Helper macro for saving boiler-plate `Box<dyn ..>` mapping.
macro_rules! box_if_ok {
    ($r:expr) => {
        $r.map(|c| Box::new(c) as _) // explicitly coerce to unsized Box<dyn ..>
    };
}

/// Enum of the supported client protocol types.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum KvProtocol {
    Abd,
    Blocking,
}

impl KvProtocol {
    /// Parses a command line protocol name.
    pub fn parse_name(name: &str) -> Option<Self> {
        match name {
            "abd" => Some(Self::Abd),
            "blocking" => Some(Self::Blocking),
            _ => None,
        }
    }

    /// Creates a boxed client core of this protocol.
    pub fn new_client(
        &self,
        id: ClientId,
        servers: Vec<SocketAddr>,
    ) -> Result<Box<dyn KvClient>, KvError> {
        match self {
            Self::Abd => box_if_ok!(AbdClient::new(id, servers)),
            Self::Blocking => box_if_ok!(BlockingClient::new(id, servers)),
        }
    }
}

/// Quorum size for a replica set of `n`: any two such subsets intersect.
pub(crate) fn majority(n: usize) -> usize {
    n / 2 + 1
}

/// Parses `host:port` endpoint specifiers into socket addresses. Hosts are
/// IP literals; no name resolution is attempted.
pub fn parse_servers(specs: &[String]) -> Result<Vec<SocketAddr>, KvError> {
    specs.iter().map(|spec| Ok(spec.parse()?)).collect()
}
