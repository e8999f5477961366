//! echo-server: receive one payload, echo it back verbatim, and exit.
//!
//! Binds the configured address, accepts a single connection, and runs one
//! echo session. The process exits non-zero if any phase of the session
//! fails; a pattern mismatch in the received payload is diagnostic only.

use clap::Parser;
use echo_harness::config::{Config, Role, ServerArgs};
use echo_harness::session::Server;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ServerArgs::parse();
    let config = Config::resolve(&args.common, Role::Server)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        address = %config.address,
        port = config.port,
        size = %config.size,
        payload_bytes = config.size.bytes(),
        "starting echo server"
    );

    let server = Server::bind(config.socket_addr(), config.size).await?;
    info!(addr = %server.local_addr()?, "listening");

    let report = server.serve_one().await?;
    if !report.pattern_ok {
        warn!("received payload did not match the expected pattern");
    }
    if !report.clean_shutdown {
        warn!("client teardown was not observed cleanly");
    }
    info!(bytes = report.payload_len, "echo session complete");
    Ok(())
}
