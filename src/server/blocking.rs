//! Blocking replica store: tag-ordered cells gated by lease-expiring locks.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::protocol::{ClientId, Reply, Request, Tag};
use crate::server::Store;

use tokio::time::{Duration, Instant};

/// Lease length granted with every lock. A crashed client stalls a key for
/// at most this long.
pub const LOCK_LEASE: Duration = Duration::from_secs(5);

/// Per-key cell. `lock` holds the current owner and its lease deadline on
/// this replica's monotonic clock; `None` means unlocked.
#[derive(Debug, Clone, Default)]
struct LockedCell {
    tag: Tag,
    value: String,
    lock: Option<(ClientId, Instant)>,
}

impl LockedCell {
    /// Clears the lock holder if its lease deadline has passed. Must be
    /// called inside the store critical section before any decision that
    /// depends on lock state.
    fn expire_lock(&mut self, now: Instant) {
        if let Some((_, deadline)) = self.lock {
            if now > deadline {
                self.lock = None;
            }
        }
    }
}

/// In-memory blocking replica state. Same single store-wide mutex as the
/// ABD store; lease expiry and the verb's decision happen in one critical
/// section, against this replica's own monotonic clock.
#[derive(Debug, Default)]
pub struct BlockingStore {
    cells: Mutex<HashMap<String, LockedCell>>,
}

impl BlockingStore {
    /// Creates an empty blocking replica store.
    pub fn new() -> Self {
        BlockingStore {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl Store for BlockingStore {
    const NAME: &'static str = "blocking";

    fn handle(&self, req: Request) -> Reply {
        let now = Instant::now();
        let mut cells = self.cells.lock().expect("store mutex poisoned");

        match req {
            Request::Lock { key, client } => {
                let cell = cells.entry(key).or_default();
                cell.expire_lock(now);
                if cell.lock.is_none() {
                    cell.lock = Some((client, now + LOCK_LEASE));
                    Reply::LockGranted
                } else {
                    Reply::LockDenied
                }
            }

            Request::Unlock { key, client } => {
                let cell = cells.entry(key).or_default();
                cell.expire_lock(now);
                if cell.lock.map(|(holder, _)| holder) == Some(client) {
                    cell.lock = None;
                }
                Reply::Ack
            }

            Request::Read { key } => {
                // reads are not lock-gated; expiry cleanup is opportunistic
                let cell = cells.entry(key).or_default();
                cell.expire_lock(now);
                Reply::Value {
                    tag: cell.tag,
                    value: cell.value.clone(),
                }
            }

            Request::Write { key, tag, value } => {
                let cell = cells.entry(key).or_default();
                cell.expire_lock(now);
                // the writer is identified by its tag's cid; it must hold a
                // live lease here for the write to be considered at all
                if cell.lock.map(|(holder, _)| holder) == Some(tag.cid) {
                    if tag > cell.tag {
                        cell.tag = tag;
                        cell.value = value;
                    }
                    Reply::Ack
                } else {
                    Reply::WriteDenied
                }
            }
        }
    }
}

#[cfg(test)]
mod blocking_tests {
    use super::*;
    use rand::Rng;
    use tokio::time;

    fn lock(store: &BlockingStore, key: &str, client: ClientId) -> Reply {
        store.handle(Request::Lock {
            key: key.into(),
            client,
        })
    }

    fn unlock(store: &BlockingStore, key: &str, client: ClientId) -> Reply {
        store.handle(Request::Unlock {
            key: key.into(),
            client,
        })
    }

    fn write(
        store: &BlockingStore,
        key: &str,
        tag: Tag,
        value: &str,
    ) -> Reply {
        store.handle(Request::Write {
            key: key.into(),
            tag,
            value: value.into(),
        })
    }

    fn read(store: &BlockingStore, key: &str) -> (Tag, String) {
        match store.handle(Request::Read { key: key.into() }) {
            Reply::Value { tag, value } => (tag, value),
            reply => panic!("unexpected reply {:?}", reply),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn grant_deny_unlock_cycle() {
        let store = BlockingStore::new();
        assert_eq!(lock(&store, "k", 1), Reply::LockGranted);
        assert_eq!(lock(&store, "k", 2), Reply::LockDenied);
        // re-request by the holder itself is also denied (no reentrancy)
        assert_eq!(lock(&store, "k", 1), Reply::LockDenied);

        assert_eq!(unlock(&store, "k", 1), Reply::Ack);
        assert_eq!(lock(&store, "k", 2), Reply::LockGranted);
    }

    #[tokio::test(start_paused = true)]
    async fn unlock_by_non_holder_ignored() {
        let store = BlockingStore::new();
        assert_eq!(lock(&store, "k", 1), Reply::LockGranted);
        // always ACKed, but the lock must survive
        assert_eq!(unlock(&store, "k", 2), Reply::Ack);
        assert_eq!(lock(&store, "k", 2), Reply::LockDenied);
    }

    #[tokio::test(start_paused = true)]
    async fn lease_expiry_allows_regrant() {
        let store = BlockingStore::new();
        assert_eq!(lock(&store, "k", 1), Reply::LockGranted);
        assert_eq!(lock(&store, "k", 2), Reply::LockDenied);

        time::advance(LOCK_LEASE + Duration::from_millis(10)).await;
        assert_eq!(lock(&store, "k", 2), Reply::LockGranted);
    }

    #[tokio::test(start_paused = true)]
    async fn write_requires_live_lease() {
        let store = BlockingStore::new();
        // no lock at all
        assert_eq!(
            write(&store, "k", Tag::new(1, 1), "v"),
            Reply::WriteDenied
        );

        // lock held by someone else
        assert_eq!(lock(&store, "k", 2), Reply::LockGranted);
        assert_eq!(
            write(&store, "k", Tag::new(1, 1), "v"),
            Reply::WriteDenied
        );

        // held by the writer
        assert_eq!(unlock(&store, "k", 2), Reply::Ack);
        assert_eq!(lock(&store, "k", 1), Reply::LockGranted);
        assert_eq!(write(&store, "k", Tag::new(1, 1), "v"), Reply::Ack);
        assert_eq!(read(&store, "k"), (Tag::new(1, 1), "v".into()));

        // held, but lease ran out before the write arrived
        time::advance(LOCK_LEASE + Duration::from_millis(10)).await;
        assert_eq!(
            write(&store, "k", Tag::new(2, 1), "late"),
            Reply::WriteDenied
        );
        assert_eq!(read(&store, "k"), (Tag::new(1, 1), "v".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_tag_acked_but_retained() {
        let store = BlockingStore::new();
        assert_eq!(lock(&store, "k", 9), Reply::LockGranted);
        assert_eq!(write(&store, "k", Tag::new(3, 9), "newer"), Reply::Ack);
        // holder replays an older tag: lock check passes, tag rule retains
        assert_eq!(write(&store, "k", Tag::new(2, 9), "older"), Reply::Ack);
        assert_eq!(read(&store, "k"), (Tag::new(3, 9), "newer".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn rand_lock_churn_single_holder() {
        let store = BlockingStore::new();
        let mut rng = rand::thread_rng();
        // reference model of the lock holder; with the clock paused no
        // lease can expire, so grants follow holder state exactly
        let mut holder: Option<ClientId> = None;

        for _ in 0..300 {
            let client: ClientId = rng.gen_range(1..6);
            if rng.gen_bool(0.5) {
                let granted = lock(&store, "k", client);
                match holder {
                    None => {
                        assert_eq!(granted, Reply::LockGranted);
                        holder = Some(client);
                    }
                    Some(_) => assert_eq!(granted, Reply::LockDenied),
                }
            } else {
                assert_eq!(unlock(&store, "k", client), Reply::Ack);
                if holder == Some(client) {
                    holder = None;
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn read_not_gated_by_lock() {
        let store = BlockingStore::new();
        assert_eq!(lock(&store, "k", 1), Reply::LockGranted);
        assert_eq!(write(&store, "k", Tag::new(1, 1), "v"), Reply::Ack);
        // a different client may read while the key is locked
        assert_eq!(read(&store, "k"), (Tag::new(1, 1), "v".into()));
    }
}
