//! echo-client: send a generated payload, verify the echo, time the trip.
//!
//! Connects to the configured server, transmits the pattern payload, reads
//! the echo back, and reports the round-trip time in microseconds. The
//! reported time excludes the drain delay before close. A pattern mismatch
//! is reported but does not change the exit status; transport failures do.

use clap::Parser;
use echo_harness::config::{ClientArgs, Config, Role};
use echo_harness::session;
use std::io::BufRead;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientArgs::parse();
    let config = Config::resolve(&args.common, Role::Client)?;

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
        "starting echo client"
    );

    if args.wait {
        // Time to start a capture on the path before any traffic flows
        println!("Waiting, press enter to continue...");
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
    }

    let report = session::run_client(config.socket_addr(), config.size).await?;
    if report.pattern_ok {
        info!(
            elapsed_us = report.elapsed.as_micros() as u64,
            bytes = report.payload_len,
            "test complete, echo verified"
        );
    } else {
        warn!(
            elapsed_us = report.elapsed.as_micros() as u64,
            bytes = report.payload_len,
            "test complete, echoed payload did NOT match"
        );
    }
    Ok(())
}
