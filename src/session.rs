//! Client and server session sequencing.
//!
//! One session covers one connection from setup through teardown. The client
//! connects, sends the generated payload, receives the echo, verifies it,
//! waits out the drain delay, and closes. The server accepts one connection,
//! receives the payload, echoes it verbatim, and holds its close until it
//! observes the client's shutdown.
//!
//! Teardown ordering matters: closing an endpoint that still has unread data
//! buffered at the peer can destroy that data. The client therefore finishes
//! and waits before closing, and the server performs one final blocking read
//! that returns end-of-stream once the client has closed. The drain delay is
//! a protocol-external settle window, not a real close handshake.

use crate::config::SizePreset;
use crate::pattern;
use crate::transfer::{self, TransferError};
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Fixed wait before the client closes, so in-flight acknowledgement traffic
/// can settle before teardown begins.
pub const DRAIN_DELAY: Duration = Duration::from_secs(5);

/// A session failure, named by the phase it occurred in.
#[derive(Debug)]
pub enum SessionError {
    /// Payload buffer allocation could not be satisfied.
    Alloc { len: usize },
    Connect(io::Error),
    Bind(io::Error),
    Listen(io::Error),
    Accept(io::Error),
    Send(TransferError),
    Receive(TransferError),
    Close(io::Error),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Alloc { len } => {
                write!(f, "failed to allocate {len}-byte payload buffer")
            }
            SessionError::Connect(e) => write!(f, "connect failed: {e}"),
            SessionError::Bind(e) => write!(f, "bind failed: {e}"),
            SessionError::Listen(e) => write!(f, "listen failed: {e}"),
            SessionError::Accept(e) => write!(f, "accept failed: {e}"),
            SessionError::Send(e) => write!(f, "send failed: {e}"),
            SessionError::Receive(e) => write!(f, "receive failed: {e}"),
            SessionError::Close(e) => write!(f, "close failed: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Alloc { .. } => None,
            SessionError::Connect(e)
            | SessionError::Bind(e)
            | SessionError::Listen(e)
            | SessionError::Accept(e)
            | SessionError::Close(e) => Some(e),
            SessionError::Send(e) | SessionError::Receive(e) => Some(e),
        }
    }
}

/// Client-side session outcome.
#[derive(Debug)]
pub struct ClientReport {
    /// Whether the echoed payload matched the generated pattern.
    pub pattern_ok: bool,
    /// Round-trip time from connect through verify; excludes the drain delay
    /// and teardown.
    pub elapsed: Duration,
    pub payload_len: usize,
}

/// Server-side session outcome.
#[derive(Debug)]
pub struct ServerReport {
    /// Diagnostic pattern check; the client is the authority on correctness.
    pub pattern_ok: bool,
    /// Whether the final read observed the client's shutdown cleanly.
    pub clean_shutdown: bool,
    pub payload_len: usize,
}

/// Allocate a zeroed payload buffer, surfacing allocation failure instead of
/// aborting.
fn alloc_zeroed(len: usize) -> Result<Vec<u8>, SessionError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SessionError::Alloc { len })?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Run one client session against `addr` with the default drain delay.
pub async fn run_client(addr: SocketAddr, size: SizePreset) -> Result<ClientReport, SessionError> {
    run_client_with_drain(addr, size, DRAIN_DELAY).await
}

async fn run_client_with_drain(
    addr: SocketAddr,
    size: SizePreset,
    drain: Duration,
) -> Result<ClientReport, SessionError> {
    let len = size.bytes();
    let mut tx = alloc_zeroed(len)?;
    pattern::fill(&mut tx);
    // Written once, read-only from here on
    let tx = Bytes::from(tx);
    let mut rx = alloc_zeroed(len)?;

    let start = Instant::now();
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(SessionError::Connect)?;
    info!(peer = %addr, "connected");

    transfer::send_all(&mut stream, &tx)
        .await
        .map_err(SessionError::Send)?;
    debug!(bytes = len, "payload sent");

    transfer::recv_all(&mut stream, &mut rx)
        .await
        .map_err(SessionError::Receive)?;
    debug!(bytes = len, "echo received");

    let pattern_ok = match pattern::first_mismatch(&rx) {
        None => {
            debug!("echoed payload matches the pattern");
            true
        }
        Some(at) => {
            warn!(mismatch_at = at, "echoed payload does not match the pattern");
            false
        }
    };
    let elapsed = start.elapsed();

    if !drain.is_zero() {
        debug!(secs = drain.as_secs_f64(), "draining before close");
        tokio::time::sleep(drain).await;
    }
    stream.shutdown().await.map_err(SessionError::Close)?;

    Ok(ClientReport {
        pattern_ok,
        elapsed,
        payload_len: len,
    })
}

/// Server side of the harness: one listener, one accepted connection, one
/// echo session.
pub struct Server {
    listener: TcpListener,
    size: SizePreset,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// Built via socket2 so the listen backlog can be exactly 1 — this
    /// harness serves one client per run, not a long-running service — with
    /// address reuse enabled for quick restarts.
    pub async fn bind(addr: SocketAddr, size: SizePreset) -> Result<Self, SessionError> {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))
            .map_err(SessionError::Bind)?;
        socket
            .set_reuse_address(true)
            .map_err(SessionError::Bind)?;
        socket.bind(&addr.into()).map_err(SessionError::Bind)?;
        socket.listen(1).map_err(SessionError::Listen)?;
        socket
            .set_nonblocking(true)
            .map_err(SessionError::Listen)?;
        let listener =
            TcpListener::from_std(socket.into()).map_err(SessionError::Listen)?;
        Ok(Self { listener, size })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept one connection, receive the payload, echo it back, and tear
    /// down after the client closes.
    pub async fn serve_one(self) -> Result<ServerReport, SessionError> {
        let (mut stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(SessionError::Accept)?;
        info!(peer = %peer, "accepted connection");

        let len = self.size.bytes();
        let mut buf = alloc_zeroed(len)?;

        transfer::recv_all(&mut stream, &mut buf)
            .await
            .map_err(SessionError::Receive)?;
        // Diagnostic only; the client is the authority on correctness
        let pattern_ok = match pattern::first_mismatch(&buf) {
            None => {
                debug!(bytes = len, "payload received, pattern matches");
                true
            }
            Some(at) => {
                warn!(mismatch_at = at, "received payload does not match the pattern");
                false
            }
        };

        transfer::send_all(&mut stream, &buf)
            .await
            .map_err(SessionError::Send)?;
        debug!(bytes = len, "payload echoed back");

        // The client closes first. Block until its shutdown is observed so
        // closing here cannot reset data still buffered toward the peer.
        let mut probe = [0u8; 1];
        let clean_shutdown = match stream.read(&mut probe).await {
            Ok(0) => {
                debug!("client closed its side");
                true
            }
            Ok(n) => {
                warn!(bytes = n, "unexpected data after echo");
                false
            }
            Err(e) => {
                warn!(error = %e, "error while waiting for client close");
                false
            }
        };

        stream.shutdown().await.map_err(SessionError::Close)?;
        drop(stream);

        Ok(ServerReport {
            pattern_ok,
            clean_shutdown,
            payload_len: len,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    async fn bind_local(size: SizePreset) -> Server {
        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0));
        Server::bind(addr, size).await.unwrap()
    }

    #[tokio::test]
    async fn test_small_roundtrip() {
        let server = bind_local(SizePreset::Small).await;
        let addr = server.local_addr().unwrap();
        let server_task = tokio::spawn(server.serve_one());

        let report = run_client_with_drain(addr, SizePreset::Small, Duration::ZERO)
            .await
            .unwrap();
        assert!(report.pattern_ok);
        assert_eq!(report.payload_len, 4096);

        let server_report = server_task.await.unwrap().unwrap();
        assert!(server_report.pattern_ok);
        assert!(server_report.clean_shutdown);
        assert_eq!(server_report.payload_len, 4096);
    }

    #[tokio::test]
    async fn test_large_roundtrip() {
        let server = bind_local(SizePreset::Large).await;
        let addr = server.local_addr().unwrap();
        let server_task = tokio::spawn(server.serve_one());

        let report = run_client_with_drain(addr, SizePreset::Large, Duration::ZERO)
            .await
            .unwrap();
        assert!(report.pattern_ok);
        assert_eq!(report.payload_len, 1024 * 1024);

        let server_report = server_task.await.unwrap().unwrap();
        assert!(server_report.pattern_ok);
        assert!(server_report.clean_shutdown);
    }

    #[tokio::test]
    async fn test_elapsed_excludes_drain() {
        let server = bind_local(SizePreset::Small).await;
        let addr = server.local_addr().unwrap();
        let server_task = tokio::spawn(server.serve_one());

        let drain = Duration::from_millis(300);
        let wall = Instant::now();
        let report = run_client_with_drain(addr, SizePreset::Small, drain)
            .await
            .unwrap();

        // The session as a whole waited out the drain, the reported
        // round-trip did not include it
        assert!(wall.elapsed() >= drain);
        assert!(report.elapsed < drain);

        server_task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_server_observes_client_shutdown() {
        // Even with no drain at all, loopback delivers everything before the
        // client's shutdown lands; on a real path the settle window exists
        // to keep teardown away from still-moving data.
        let server = bind_local(SizePreset::Small).await;
        let addr = server.local_addr().unwrap();
        let server_task = tokio::spawn(server.serve_one());

        run_client_with_drain(addr, SizePreset::Small, Duration::ZERO)
            .await
            .unwrap();

        let server_report = server_task.await.unwrap().unwrap();
        assert!(
            server_report.clean_shutdown,
            "final read must observe end-of-stream after the client closes"
        );
    }

    #[tokio::test]
    async fn test_short_payload_is_peer_closed() {
        let server = bind_local(SizePreset::Small).await;
        let addr = server.local_addr().unwrap();
        let server_task = tokio::spawn(server.serve_one());

        // Misbehaving client: sends 1000 of the 4096 expected bytes
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut partial = vec![0u8; 1000];
        pattern::fill(&mut partial);
        stream.write_all(&partial).await.unwrap();
        stream.shutdown().await.unwrap();

        let err = server_task.await.unwrap().unwrap_err();
        match err {
            SessionError::Receive(TransferError::PeerClosed { bytes_moved }) => {
                assert_eq!(bytes_moved, 1000)
            }
            other => panic!("expected Receive(PeerClosed), got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_corrupted_echo_reported_not_fatal() {
        // A server that flips one byte before echoing
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let bad_server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            stream.read_exact(&mut buf).await.unwrap();
            buf[123] ^= 0xff;
            stream.write_all(&buf).await.unwrap();
            let mut probe = [0u8; 1];
            let _ = stream.read(&mut probe).await;
        });

        let report = run_client_with_drain(addr, SizePreset::Small, Duration::ZERO)
            .await
            .unwrap();
        assert!(!report.pattern_ok, "mismatch must be reported");
        assert_eq!(report.payload_len, 4096);

        bad_server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_names_phase() {
        // Bind then drop to get a port nothing is listening on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = run_client_with_drain(addr, SizePreset::Small, Duration::ZERO)
            .await
            .unwrap_err();
        match &err {
            SessionError::Connect(_) => {}
            other => panic!("expected Connect, got {other:?}"),
        }
        assert!(err.to_string().contains("connect"));
    }
}
