//! ABD protocol client core: two-phase reads with write-back and
//! read-then-increment writes over a fixed majority quorum.

use std::net::SocketAddr;

use crate::client::rpc;
use crate::client::{majority, KvClient};
use crate::protocol::{ClientId, Request, Tag};
use crate::utils::KvError;

use async_trait::async_trait;

/// ABD (multi-writer multi-reader atomic register) client core.
pub struct AbdClient {
    /// My client ID, used as the tiebreaker half of new tags.
    id: ClientId,

    /// Replica list shared by all clients; indexing defines the quorums.
    servers: Vec<SocketAddr>,

    /// Majority quorum size R.
    quorum: usize,
}

impl AbdClient {
    /// Creates a new ABD client core over the given replica list.
    pub fn new(
        id: ClientId,
        servers: Vec<SocketAddr>,
    ) -> Result<Self, KvError> {
        if id == 0 {
            return logged_err!(id; "client IDs must be positive");
        }
        if servers.is_empty() {
            return logged_err!(id; "servers list is empty");
        }
        let quorum = majority(servers.len());
        Ok(AbdClient {
            id,
            servers,
            quorum,
        })
    }

    /// The first R replicas by index. Keeping this subset fixed makes the
    /// write-back set exactly the read set, so quorum intersection needs no
    /// per-operation bookkeeping.
    fn quorum_targets(&self) -> &[SocketAddr] {
        &self.servers[..self.quorum]
    }
}

#[async_trait]
impl KvClient for AbdClient {
    async fn get(&self, key: &str) -> Result<String, KvError> {
        let resps = rpc::read_phase(self.quorum_targets(), key).await;
        let best = match rpc::highest_tagged(resps) {
            Some(best) => best,
            None => {
                kv_debug!(self.id; "get '{}': no valid read response", key);
                return Err(KvError::msg("read quorum unreachable"));
            }
        };

        // write-back: the returned (tag, value) must be quorum-visible
        // before the read completes; replica tag monotonicity makes replays
        // harmless
        let write_back = Request::Write {
            key: key.into(),
            tag: best.tag,
            value: best.value.clone(),
        };
        rpc::fan_out(self.quorum_targets(), &write_back).await;

        Ok(best.value)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), KvError> {
        let resps = rpc::read_phase(self.quorum_targets(), key).await;
        // an unreadable quorum degrades to the sentinel: the write still
        // proceeds with lamport 1
        let max_tag = rpc::highest_tagged(resps)
            .map(|best| best.tag)
            .unwrap_or_default();
        let tag = Tag::new(max_tag.lamport + 1, self.id);

        let write = Request::Write {
            key: key.into(),
            tag,
            value: value.into(),
        };
        rpc::fan_out(self.quorum_targets(), &write).await;
        kv_trace!(self.id; "put '{}' installed tag {}", key, tag);

        Ok(())
    }
}
