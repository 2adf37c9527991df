//! TCP bind/connect and newline-terminated line exchange helpers.

use std::net::{Ipv4Addr, SocketAddr};

use crate::utils::KvError;

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::{self, Duration};

/// Per-socket send/receive timeout. A timeout is indistinguishable from a
/// transport failure to callers.
pub const SOCKET_TIMEOUT: Duration = Duration::from_secs(1);

/// Listen backlog length for replica servers.
pub const LISTEN_BACKLOG: u32 = 50;

/// Binds a TCP listener on `0.0.0.0:<port>` with `SO_REUSEADDR` set, so that
/// a replica can be restarted on the same port without waiting out
/// `TIME_WAIT` sockets.
pub fn bind_reuse(port: u16) -> Result<TcpListener, KvError> {
    let socket = TcpSocket::new_v4()?;
    socket.set_reuseaddr(true)?;
    socket.set_nodelay(true)?;

    socket.bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))?;
    Ok(socket.listen(LISTEN_BACKLOG)?)
}

/// Opens a one-shot connection to given server address, bounded by
/// `SOCKET_TIMEOUT`.
pub(crate) async fn connect_timed(
    addr: SocketAddr,
) -> Result<TcpStream, KvError> {
    let stream = time::timeout(SOCKET_TIMEOUT, TcpStream::connect(addr))
        .await??;
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Sends one newline-terminated line into the writable connection, bounded
/// by `SOCKET_TIMEOUT`. Input `line` must not contain `'\n'` itself.
pub(crate) async fn send_line<Conn>(
    conn_write: &mut Conn,
    line: &str,
) -> Result<(), KvError>
where
    Conn: AsyncWrite + Unpin,
{
    debug_assert!(!line.contains('\n'));
    let mut framed = String::with_capacity(line.len() + 1);
    framed.push_str(line);
    framed.push('\n');

    time::timeout(SOCKET_TIMEOUT, conn_write.write_all(framed.as_bytes()))
        .await??;
    Ok(())
}

/// Receives one line from the readable (buffered) connection, bounded by
/// `SOCKET_TIMEOUT`. The trailing newline is stripped. Returns `Ok(None)` if
/// the peer closed the connection before sending a full line.
pub(crate) async fn recv_line<Conn>(
    conn_read: &mut Conn,
) -> Result<Option<String>, KvError>
where
    Conn: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    let nread = time::timeout(SOCKET_TIMEOUT, conn_read.read_line(&mut line))
        .await??;
    if nread == 0 {
        return Ok(None);
    }

    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(Some(line))
}

/// One-shot request/response exchange: connect, send one line, read one
/// line, drop the connection. Every blocking step is bounded by
/// `SOCKET_TIMEOUT`.
pub(crate) async fn exchange_line(
    addr: SocketAddr,
    line: &str,
) -> Result<String, KvError> {
    let mut stream = connect_timed(addr).await?;
    let (read_half, mut write_half) = stream.split();

    send_line(&mut write_half, line).await?;
    let mut reader = tokio::io::BufReader::new(read_half);
    recv_line(&mut reader)
        .await?
        .ok_or_else(|| KvError::msg("peer closed without replying"))
}

#[cfg(test)]
mod net_tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn line_round_trip() -> Result<(), KvError> {
        let listener = bind_reuse(54800)?;
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await?;
            let (read_half, mut write_half) = stream.split();
            let mut reader = BufReader::new(read_half);
            let line = recv_line(&mut reader).await?.unwrap();
            send_line(&mut write_half, &format!("echo {}", line)).await?;
            Ok::<(), KvError>(())
        });

        let mut stream = connect_timed("127.0.0.1:54800".parse()?).await?;
        let (read_half, mut write_half) = stream.split();
        send_line(&mut write_half, "hello there").await?;
        let mut reader = BufReader::new(read_half);
        assert_eq!(
            recv_line(&mut reader).await?,
            Some("echo hello there".into())
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn recv_bounded_by_timeout() -> Result<(), KvError> {
        let listener = bind_reuse(54801)?;
        tokio::spawn(async move {
            // accept, then stay silent well past the timeout
            let (_stream, _) = listener.accept().await?;
            time::sleep(Duration::from_secs(10)).await;
            Ok::<(), KvError>(())
        });

        let mut stream = connect_timed("127.0.0.1:54801".parse()?).await?;
        let (read_half, _) = stream.split();
        let mut reader = BufReader::new(read_half);
        assert!(recv_line(&mut reader).await.is_err());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn recv_peer_closed() -> Result<(), KvError> {
        let listener = bind_reuse(54802)?;
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            drop(stream);
            Ok::<(), KvError>(())
        });

        let mut stream = connect_timed("127.0.0.1:54802".parse()?).await?;
        let (read_half, _) = stream.split();
        let mut reader = BufReader::new(read_half);
        assert_eq!(recv_line(&mut reader).await?, None);
        Ok(())
    }
}
