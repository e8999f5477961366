//! echo-harness: a TCP echo correctness and latency test harness
//!
//! One client connects to one server, sends a deterministically generated
//! payload of a fixed preset size, and the server echoes the exact bytes
//! back. The client verifies the echo against the pattern it sent and
//! reports the round-trip time.
//!
//! Components:
//! - Deterministic payload pattern generation and verification
//! - Partial-I/O send/receive loops that move an exact byte count
//! - Client and server session sequencing, including teardown ordering
//! - Configuration via CLI arguments or TOML file

pub mod config;
pub mod pattern;
pub mod session;
pub mod transfer;
