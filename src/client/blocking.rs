//! Blocking protocol client core: majority lock acquisition with early
//! quorum termination, strict-quorum read and conditional write phases,
//! and best-effort unlock.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::client::rpc;
use crate::client::{majority, KvClient};
use crate::protocol::{ClientId, Reply, Request, Tag};
use crate::utils::KvError;

use async_trait::async_trait;
use futures::future::join_all;

/// Lease-based mutual-exclusion client core.
pub struct BlockingClient {
    /// My client ID: lock owner identity on the replicas, and the
    /// tiebreaker half of new tags.
    id: ClientId,

    /// Replica list shared by all clients; indexing defines the quorums.
    servers: Vec<SocketAddr>,

    /// Majority quorum size R.
    quorum: usize,
}

impl BlockingClient {
    /// Creates a new blocking client core over the given replica list.
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
        Ok(BlockingClient {
            id,
            servers,
            quorum,
        })
    }

    /// Tries to lock `key` on every replica concurrently. Once a majority
    /// of grants has been recorded, a stop flag short-circuits attempts
    /// that have not started yet; attempts already in flight run to
    /// completion and their grants are still recorded, so the terminating
    /// unlock phase can release every lock actually held. Returns the
    /// granted replica indices in arrival order.
    async fn acquire_locks(&self, key: &str) -> Vec<usize> {
        let grants = Arc::new(Mutex::new(Vec::with_capacity(self.quorum)));
        let stop = Arc::new(AtomicBool::new(false));

        let handles: Vec<_> = self
            .servers
            .iter()
            .enumerate()
            .map(|(idx, &addr)| {
                let grants = grants.clone();
                let stop = stop.clone();
                let quorum = self.quorum;
                let req = Request::Lock {
                    key: key.into(),
                    client: self.id,
                };
                tokio::spawn(async move {
                    if stop.load(Ordering::Acquire) {
                        return;
                    }
                    if let Ok(Reply::LockGranted) = rpc::call(addr, req).await
                    {
                        let mut grants =
                            grants.lock().expect("grants mutex poisoned");
                        grants.push(idx);
                        if grants.len() >= quorum {
                            stop.store(true, Ordering::Release);
                        }
                    }
                })
            })
            .collect();
        join_all(handles).await;

        let held = grants.lock().expect("grants mutex poisoned").clone();
        held
    }

    /// Releases held locks in parallel, ignoring individual failures: a
    /// lost UNLOCK is backstopped by lease expiry on the replica.
    async fn release_locks(&self, key: &str, held: &[usize]) {
        let addrs: Vec<SocketAddr> =
            held.iter().map(|&idx| self.servers[idx]).collect();
        let req = Request::Unlock {
            key: key.into(),
            client: self.id,
        };
        rpc::fan_out(&addrs, &req).await;
    }

    /// Addresses of the first R grants, the subset operated on.
    fn quorum_addrs(&self, held: &[usize]) -> Vec<SocketAddr> {
        held[..self.quorum]
            .iter()
            .map(|&idx| self.servers[idx])
            .collect()
    }
}

#[async_trait]
impl KvClient for BlockingClient {
    async fn get(&self, key: &str) -> Result<String, KvError> {
        let held = self.acquire_locks(key).await;
        if held.len() < self.quorum {
            kv_debug!(self.id; "get '{}': only {} of {} locks granted",
                               key, held.len(), self.quorum);
            self.release_locks(key, &held).await;
            return Err(KvError::msg("lock quorum unmet"));
        }

        let quorum_addrs = self.quorum_addrs(&held);
        let resps = rpc::read_phase(&quorum_addrs, key).await;

        // strict quorum: every locked replica must answer the read
        let result = if resps.iter().any(Option::is_none) {
            Err(KvError::msg("read on locked quorum incomplete"))
        } else {
            rpc::highest_tagged(resps)
                .map(|best| best.value)
                .ok_or_else(|| KvError::msg("read on locked quorum incomplete"))
        };

        self.release_locks(key, &held).await;
        result
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), KvError> {
        let held = self.acquire_locks(key).await;
        if held.len() < self.quorum {
            kv_debug!(self.id; "put '{}': only {} of {} locks granted",
                               key, held.len(), self.quorum);
            self.release_locks(key, &held).await;
            return Err(KvError::msg("lock quorum unmet"));
        }

        let quorum_addrs = self.quorum_addrs(&held);
        let resps = rpc::read_phase(&quorum_addrs, key).await;

        let result = if resps.iter().any(Option::is_none) {
            Err(KvError::msg("read on locked quorum incomplete"))
        } else {
            let max_tag = rpc::highest_tagged(resps)
                .map(|best| best.tag)
                .unwrap_or_default();
            let tag = Tag::new(max_tag.lamport + 1, self.id);

            let write = Request::Write {
                key: key.into(),
                tag,
                value: value.into(),
            };
            // every replica must both still hold our lock and ACK the tag
            let acks = rpc::fan_out(&quorum_addrs, &write)
                .await
                .into_iter()
                .filter(|reply| matches!(reply, Some(Reply::Ack)))
                .count();
            if acks == self.quorum {
                Ok(())
            } else {
                kv_debug!(self.id; "put '{}': {} of {} write ACKs",
                                   key, acks, self.quorum);
                Err(KvError::msg("write quorum unmet"))
            }
        };

        self.release_locks(key, &held).await;
        result
    }
}
