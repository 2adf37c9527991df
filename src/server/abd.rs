//! ABD replica store: per-key tag-ordered cells.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::protocol::{Reply, Request, Tag};
use crate::server::Store;

/// Per-key cell. Created on first touch with the sentinel tag and the empty
/// value; never destroyed.
#[derive(Debug, Clone, Default)]
struct KeyCell {
    tag: Tag,
    value: String,
}

/// In-memory ABD replica state. A single store-wide mutex serializes every
/// read and write, so each key sees a linear order of server-side events;
/// critical sections cover exactly the compare-and-assign (writes) or the
/// state load (reads).
#[derive(Debug, Default)]
pub struct AbdStore {
    cells: Mutex<HashMap<String, KeyCell>>,
}

impl AbdStore {
    /// Creates an empty ABD replica store.
    pub fn new() -> Self {
        AbdStore {
            cells: Mutex::new(HashMap::new()),
        }
    }
}

impl Store for AbdStore {
    const NAME: &'static str = "abd";

    fn handle(&self, req: Request) -> Reply {
        match req {
            Request::Read { key } => {
                let mut cells =
                    self.cells.lock().expect("store mutex poisoned");
                let cell = cells.entry(key).or_default();
                Reply::Value {
                    tag: cell.tag,
                    value: cell.value.clone(),
                }
            }

            Request::Write { key, tag, value } => {
                let mut cells =
                    self.cells.lock().expect("store mutex poisoned");
                let cell = cells.entry(key).or_default();
                // install iff strictly newer; replaying an already-seen tag
                // (e.g. a concurrent read's write-back) is a no-op
                if tag > cell.tag {
                    cell.tag = tag;
                    cell.value = value;
                }
                Reply::Ack
            }

            // lock verbs belong to the blocking protocol only
            Request::Lock { .. } | Request::Unlock { .. } => Reply::Error,
        }
    }
}

#[cfg(test)]
mod abd_tests {
    use super::*;
    use rand::Rng;

    fn read(store: &AbdStore, key: &str) -> (Tag, String) {
        match store.handle(Request::Read { key: key.into() }) {
            Reply::Value { tag, value } => (tag, value),
            reply => panic!("unexpected reply {:?}", reply),
        }
    }

    fn write(store: &AbdStore, key: &str, tag: Tag, value: &str) -> Reply {
        store.handle(Request::Write {
            key: key.into(),
            tag,
            value: value.into(),
        })
    }

    #[test]
    fn first_touch_cell() {
        let store = AbdStore::new();
        assert_eq!(read(&store, "fresh"), (Tag::default(), "".into()));
    }

    #[test]
    fn install_then_read_back() {
        let store = AbdStore::new();
        assert_eq!(write(&store, "k", Tag::new(1, 1), "alpha"), Reply::Ack);
        assert_eq!(read(&store, "k"), (Tag::new(1, 1), "alpha".into()));
    }

    #[test]
    fn stale_write_retained() {
        let store = AbdStore::new();
        write(&store, "k", Tag::new(5, 7), "new");
        // lower lamport, and equal lamport with lower cid, both lose
        assert_eq!(write(&store, "k", Tag::new(4, 9), "older"), Reply::Ack);
        assert_eq!(write(&store, "k", Tag::new(5, 3), "older"), Reply::Ack);
        assert_eq!(read(&store, "k"), (Tag::new(5, 7), "new".into()));
    }

    #[test]
    fn equal_tag_is_noop() {
        let store = AbdStore::new();
        write(&store, "k", Tag::new(2, 1), "first");
        // same-tag replay (a concurrent write-back) must not clobber
        assert_eq!(write(&store, "k", Tag::new(2, 1), "second"), Reply::Ack);
        assert_eq!(read(&store, "k"), (Tag::new(2, 1), "first".into()));
    }

    #[test]
    fn tags_monotonic_across_writes() {
        let store = AbdStore::new();
        let mut last = Tag::default();
        for tag in [
            Tag::new(1, 2),
            Tag::new(1, 1), // stale
            Tag::new(2, 1),
            Tag::new(1, 9), // stale
            Tag::new(2, 4),
        ] {
            write(&store, "k", tag, "x");
            let (stored, _) = read(&store, "k");
            assert!(stored >= last);
            last = stored;
        }
        assert_eq!(last, Tag::new(2, 4));
    }

    fn gen_rand_str(len: usize) -> String {
        rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    #[test]
    fn rand_writes_keep_highest_tag() {
        let store = AbdStore::new();
        let mut rng = rand::thread_rng();
        // reference model: per key, the highest tag seen and its value
        let mut expected: HashMap<String, (Tag, String)> = HashMap::new();

        for _ in 0..500 {
            let key = format!("k{}", rng.gen_range(0..5));
            let tag = Tag::new(rng.gen_range(0..20), rng.gen_range(1..8));
            let value = gen_rand_str(8);

            assert_eq!(write(&store, &key, tag, &value), Reply::Ack);
            let entry = expected.entry(key.clone()).or_default();
            if tag > entry.0 {
                *entry = (tag, value);
            }

            assert_eq!(read(&store, &key), entry.clone());
        }
    }

    #[test]
    fn lock_verbs_rejected() {
        let store = AbdStore::new();
        assert_eq!(
            store.handle(Request::Lock {
                key: "k".into(),
                client: 1,
            }),
            Reply::Error
        );
        assert_eq!(
            store.handle(Request::Unlock {
                key: "k".into(),
                client: 1,
            }),
            Reply::Error
        );
    }
}
