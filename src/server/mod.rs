//! Server-side modules: the replica stores and the shared accept loop.

mod abd;
mod blocking;

pub use abd::AbdStore;
pub use blocking::{BlockingStore, LOCK_LEASE};

use std::sync::Arc;

use crate::protocol::{Reply, Request};
use crate::utils::{bind_reuse, recv_line, send_line, KvError};

use tokio::io::BufReader;
use tokio::net::TcpStream;

/// Interface provided by both replica store flavors: decide one request's
/// reply inside the store's own critical section.
pub trait Store: Send + Sync + 'static {
    /// Protocol name used in log lines.
    const NAME: &'static str;

    /// Handles a single parsed request.
    fn handle(&self, req: Request) -> Reply;
}

/// Runs the replica accept loop on `0.0.0.0:<port>`: one detached handler
/// task per accepted connection, one request per connection.
pub async fn serve<S: Store>(
    store: Arc<S>,
    port: u16,
) -> Result<(), KvError> {
    let listener = bind_reuse(port)?;
    kv_info!(port; "{} replica listening on 0.0.0.0:{}", S::NAME, port);

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let store = store.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_conn(store, stream).await {
                        kv_debug!(port; "connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                kv_warn!(port; "error accepting connection: {}", e);
            }
        }
    }
}

/// Serves one connection: read one request line, reply once, close. An
/// unparsable line gets `ERR`; a peer that closes without sending a full
/// line gets nothing.
async fn handle_conn<S: Store>(
    store: Arc<S>,
    mut stream: TcpStream,
) -> Result<(), KvError> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);

    let line = match recv_line(&mut reader).await? {
        Some(line) if !line.is_empty() => line,
        _ => return Ok(()),
    };

    let reply = match Request::from_line(&line) {
        Some(req) => store.handle(req),
        None => Reply::Error,
    };
    send_line(&mut write_half, &reply.to_line()).await
}
