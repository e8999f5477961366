//! Partial-I/O send and receive loops.
//!
//! A single send or receive on a stream transport may move fewer bytes than
//! requested. `send_all` and `recv_all` repeat single-shot operations on the
//! remaining suffix of the buffer until the exact byte count has moved, and
//! turn the transport's edge outcomes into typed failures: a zero-length
//! read before the target is the peer shutting down early, and a zero-length
//! write report is transport misbehavior. Neither loop imposes a timeout of
//! its own.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// A failed or cut-short transfer, with the progress made before it stopped.
#[derive(Debug)]
pub enum TransferError {
    /// The transport reported an error mid-transfer.
    Io {
        bytes_moved: usize,
        source: io::Error,
    },
    /// The peer closed its write side before the full payload arrived.
    PeerClosed { bytes_moved: usize },
    /// A write call reported zero bytes accepted without an error.
    WriteZero { bytes_moved: usize },
}

impl TransferError {
    /// Bytes successfully moved before the transfer stopped.
    pub fn bytes_moved(&self) -> usize {
        match self {
            TransferError::Io { bytes_moved, .. }
            | TransferError::PeerClosed { bytes_moved }
            | TransferError::WriteZero { bytes_moved } => *bytes_moved,
        }
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferError::Io {
                bytes_moved,
                source,
            } => {
                write!(f, "transport error after {bytes_moved} bytes: {source}")
            }
            TransferError::PeerClosed { bytes_moved } => {
                write!(f, "peer closed the connection after {bytes_moved} bytes")
            }
            TransferError::WriteZero { bytes_moved } => {
                write!(f, "transport accepted zero bytes after {bytes_moved} bytes")
            }
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Write all of `buf` to `writer`, looping over partial writes.
///
/// Each call may accept anything between one byte and the full remaining
/// suffix; the loop advances by exactly what the transport reports.
pub async fn send_all<W>(writer: &mut W, buf: &[u8]) -> Result<(), TransferError>
where
    W: AsyncWrite + Unpin,
{
    let target = buf.len();
    let mut sent = 0;
    while sent < target {
        let n = match writer.write(&buf[sent..]).await {
            Ok(n) => n,
            Err(source) => {
                return Err(TransferError::Io {
                    bytes_moved: sent,
                    source,
                })
            }
        };
        if n == 0 {
            return Err(TransferError::WriteZero { bytes_moved: sent });
        }
        sent += n;
        trace!(n, so_far = sent, total = target, "send progress");
    }
    Ok(())
}

/// Fill all of `buf` from `reader`, looping over partial reads.
///
/// Never reads past `buf.len()`, so bytes belonging to a later protocol
/// phase stay in the transport. A clean end-of-stream before the target
/// length is `PeerClosed`, not success.
pub async fn recv_all<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), TransferError>
where
    R: AsyncRead + Unpin,
{
    let target = buf.len();
    let mut received = 0;
    while received < target {
        let n = match reader.read(&mut buf[received..]).await {
            Ok(n) => n,
            Err(source) => {
                return Err(TransferError::Io {
                    bytes_moved: received,
                    source,
                })
            }
        };
        if n == 0 {
            return Err(TransferError::PeerClosed {
                bytes_moved: received,
            });
        }
        received += n;
        trace!(n, so_far = received, total = target, "receive progress");
    }
    Ok(())
}
