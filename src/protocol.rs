//! Wire protocol data model: write tags and the newline-terminated ASCII
//! request/reply forms exchanged between clients and replicas.
//!
//! Each message is a single line of whitespace-separated tokens. The value
//! field, where present, is always last: parsing skips the whitespace after
//! the preceding integer and takes the remainder of the line verbatim, so
//! values may contain interior spaces (but never newlines) and may be of
//! length zero.

use std::fmt;

/// Client ID type. Workload clients use positive IDs, so the sentinel tag
/// `(0, 0)` compares below any tag a client can write.
pub type ClientId = u64;

/// Logical write tag: a Lamport counter paired with the writer's client ID.
/// The derived ordering is lexicographic on `(lamport, cid)`, which is
/// exactly the total order that makes concurrent writes comparable.
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default, Hash,
)]
pub struct Tag {
    /// Lamport-style logical counter.
    pub lamport: u64,

    /// ID of the client that formed this tag.
    pub cid: ClientId,
}

impl Tag {
    /// Creates a tag from its two components.
    pub fn new(lamport: u64, cid: ClientId) -> Self {
        Tag { lamport, cid }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({},{})", self.lamport, self.cid)
    }
}

/// Request sent from a client to a replica. One request per connection.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Request {
    /// Read the current `(tag, value)` of a key.
    Read { key: String },

    /// Install `(tag, value)` into a key if the tag is strictly newer.
    Write { key: String, tag: Tag, value: String },

    /// Try to acquire the per-key lock (blocking protocol only).
    Lock { key: String, client: ClientId },

    /// Release the per-key lock if held by this client (blocking only).
    Unlock { key: String, client: ClientId },
}

/// Reply sent from a replica back to the requesting client.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Reply {
    /// Current cell state in response to a `Read`.
    Value { tag: Tag, value: String },

    /// Write applied (or deliberately retained older state), or unlock done.
    Ack,

    /// Write refused because the requester does not hold the lock.
    WriteDenied,

    /// Lock acquired; replica starts the lease clock.
    LockGranted,

    /// Lock currently held by someone else.
    LockDenied,

    /// Request line was not understood.
    Error,
}

/// Takes the next whitespace-delimited token off the front of `cursor`.
fn next_token<'a>(cursor: &mut &'a str) -> Option<&'a str> {
    let rest = cursor.trim_start();
    if rest.is_empty() {
        return None;
    }
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let (token, tail) = rest.split_at(end);
    *cursor = tail;
    Some(token)
}

/// Interprets everything after the last parsed integer as the value field:
/// leading whitespace (the token separator) is skipped, the remainder is
/// taken verbatim. An exhausted line yields the zero-length value.
fn rest_as_value(cursor: &str) -> String {
    cursor.trim_start().into()
}

impl Request {
    /// Renders the request as its wire line (without the trailing newline).
    pub fn to_line(&self) -> String {
        match self {
            Request::Read { key } => format!("READ_REQ {}", key),
            Request::Write { key, tag, value } => format!(
                "WRITE_REQ {} {} {} {}",
                key, tag.lamport, tag.cid, value
            ),
            Request::Lock { key, client } => {
                format!("LOCK_REQ {} {}", key, client)
            }
            Request::Unlock { key, client } => {
                format!("UNLOCK {} {}", key, client)
            }
        }
    }

    /// Parses a request line. Returns `None` for unknown verbs or missing /
    /// non-integer fields; the server answers those with `ERR`.
    pub fn from_line(line: &str) -> Option<Self> {
        let mut cursor = line;
        match next_token(&mut cursor)? {
            "READ_REQ" => {
                let key = next_token(&mut cursor)?.into();
                Some(Request::Read { key })
            }
            "WRITE_REQ" => {
                let key = next_token(&mut cursor)?.into();
                let lamport = next_token(&mut cursor)?.parse().ok()?;
                let cid = next_token(&mut cursor)?.parse().ok()?;
                Some(Request::Write {
                    key,
                    tag: Tag::new(lamport, cid),
                    value: rest_as_value(cursor),
                })
            }
            "LOCK_REQ" => {
                let key = next_token(&mut cursor)?.into();
                let client = next_token(&mut cursor)?.parse().ok()?;
                Some(Request::Lock { key, client })
            }
            "UNLOCK" => {
                let key = next_token(&mut cursor)?.into();
                let client = next_token(&mut cursor)?.parse().ok()?;
                Some(Request::Unlock { key, client })
            }
            _ => None,
        }
    }
}

impl Reply {
    /// Renders the reply as its wire line (without the trailing newline).
    pub fn to_line(&self) -> String {
        match self {
            Reply::Value { tag, value } => {
                format!("READ_RESP {} {} {}", tag.lamport, tag.cid, value)
            }
            Reply::Ack => "ACK".into(),
            Reply::WriteDenied => "WRITE_DENIED".into(),
            Reply::LockGranted => "LOCK_GRANTED".into(),
            Reply::LockDenied => "LOCK_DENIED".into(),
            Reply::Error => "ERR".into(),
        }
    }

    /// Parses a reply line. Returns `None` on anything malformed; clients
    /// treat that replica as unreachable for the attempt.
    pub fn from_line(line: &str) -> Option<Self> {
        let mut cursor = line;
        match next_token(&mut cursor)? {
            "READ_RESP" => {
                let lamport = next_token(&mut cursor)?.parse().ok()?;
                let cid = next_token(&mut cursor)?.parse().ok()?;
                Some(Reply::Value {
                    tag: Tag::new(lamport, cid),
                    value: rest_as_value(cursor),
                })
            }
            // bare verbs admit no trailing tokens
            "ACK" if cursor.trim_start().is_empty() => Some(Reply::Ack),
            "WRITE_DENIED" if cursor.trim_start().is_empty() => {
                Some(Reply::WriteDenied)
            }
            "LOCK_GRANTED" if cursor.trim_start().is_empty() => {
                Some(Reply::LockGranted)
            }
            "LOCK_DENIED" if cursor.trim_start().is_empty() => {
                Some(Reply::LockDenied)
            }
            "ERR" if cursor.trim_start().is_empty() => Some(Reply::Error),
            _ => None,
        }
    }
}
