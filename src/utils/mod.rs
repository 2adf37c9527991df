//! Helper utilities, functions, and macros.

#[macro_use]
mod print;

mod error;
mod net;

pub use error::KvError;
pub use net::{bind_reuse, LISTEN_BACKLOG, SOCKET_TIMEOUT};

pub(crate) use net::{exchange_line, recv_line, send_line};
