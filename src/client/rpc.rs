//! One-shot fan-out RPC plumbing shared by both protocol cores.

use std::net::SocketAddr;

use crate::protocol::{Reply, Request, Tag};
use crate::utils::{exchange_line, KvError};

use futures::future::join_all;

/// One replica's view collected during a read phase.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ReadResponse {
    /// Tag the replica reported for the key.
    pub tag: Tag,

    /// Value stored under that tag.
    pub value: String,
}

/// Issues one request to one replica over a fresh connection. Transport
/// failure, timeout, and a malformed reply line all collapse into `Err`;
/// nothing is retried at this layer.
pub(crate) async fn call(
    addr: SocketAddr,
    req: Request,
) -> Result<Reply, KvError> {
    let line = exchange_line(addr, &req.to_line()).await?;
    Reply::from_line(&line)
        .ok_or_else(|| KvError::msg(format!("malformed reply '{}'", line)))
}

/// Fans one request out to every listed replica concurrently (one task per
/// replica) and joins all of them. A failed attempt occupies its slot with
/// `None`, preserving replica indexing.
pub(crate) async fn fan_out(
    addrs: &[SocketAddr],
    req: &Request,
) -> Vec<Option<Reply>> {
    let handles: Vec<_> = addrs
        .iter()
        .map(|&addr| {
            let req = req.clone();
            tokio::spawn(async move { call(addr, req).await })
        })
        .collect();

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| match joined {
            Ok(Ok(reply)) => Some(reply),
            _ => None,
        })
        .collect()
}

/// Read-phase fan-out: replies that are not well-formed `READ_RESP`s count
/// as invalid for their replica.
pub(crate) async fn read_phase(
    addrs: &[SocketAddr],
    key: &str,
) -> Vec<Option<ReadResponse>> {
    fan_out(addrs, &Request::Read { key: key.into() })
        .await
        .into_iter()
        .map(|reply| match reply {
            Some(Reply::Value { tag, value }) => {
                Some(ReadResponse { tag, value })
            }
            _ => None,
        })
        .collect()
}

/// Picks the highest-tagged entry among the valid responses, or `None` if
/// every response was invalid.
pub(crate) fn highest_tagged(
    resps: Vec<Option<ReadResponse>>,
) -> Option<ReadResponse> {
    resps
        .into_iter()
        .flatten()
        .max_by(|a, b| a.tag.cmp(&b.tag))
}
