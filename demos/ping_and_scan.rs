//! Ping a clamd daemon and scan a few inputs.
//!
//! Expects clamd listening on TCP, e.g.
//! `docker run -p 3310:3310 clamav/clamav`.
//!
//! Run with: cargo run --example ping_and_scan -- [host] [port] [file...]

use clamstream::prelude::*;
use std::path::Path;
use std::time::Duration;

const EICAR: &[u8] = b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Audit events go to target `clamstream::audit`
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,clamstream=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "localhost".to_string());
    let port = args.next().map(|p| p.parse::<u16>()).transpose()?.unwrap_or(3310);
    let files: Vec<String> = args.collect();

    let config = ClamdConfig::new(host, port)
        .with_read_timeout(Duration::from_secs(30))
        .with_max_stream_size(25 * 1024 * 1024);
    let client = ClamdClient::new(config)?;

    println!("=== clamd at {} ===", client.config().address());
    println!("ping: {}", client.ping().await?);
    println!("version: {}", client.version().await?);

    println!("\n=== INSTREAM ===");
    for (label, payload) in [("text", &b"Nothing to see here"[..]), ("eicar", EICAR)] {
        report(label, client.scan_with_result(payload).await);
    }

    if !files.is_empty() {
        println!("\n=== SCAN <path> ===");
        for file in &files {
            report(file, client.scan_with_result(Path::new(file)).await);
        }
    }

    Ok(())
}

fn report(label: &str, result: ScanResult) {
    match &result {
        ScanResult::Passed { .. } => println!("{label}: clean"),
        ScanResult::Found { signature, .. } => println!("{label}: INFECTED ({signature})"),
        ScanResult::Error { reply } => println!("{label}: daemon error: {reply}"),
        ScanResult::Failed(err) if err.is_size_limit() => {
            println!("{label}: too large for the daemon: {err}")
        }
        ScanResult::Failed(err) => println!("{label}: failed: {err}"),
    }
}
