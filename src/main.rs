//! FlashLog - An Event-Driven Log Ingestion Endpoint
//!
//! This is the main entry point for the FlashLog server.
//! It parses the configuration, runs the connection reactor on a blocking
//! thread and logs every record it decodes.

use flashlog::config::{CliCommand, IngestConfig};
use flashlog::connection::ConnectionStats;
use flashlog::protocol::{LineProcessor, Record};
use flashlog::server::Server;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!(
        r#"
FlashLog - An Event-Driven Log Ingestion Endpoint

USAGE:
    flashlog [OPTIONS]

OPTIONS:
    -h, --host <HOST>              Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>              Port to listen on (default: 24224)
        --chunk-size <SIZE>        Initial buffer size and growth step (default: 32K)
        --growth-size <SIZE>       Growth step, if different from the chunk size
        --buffer-max-size <SIZE>   Per-connection buffer ceiling (default: 6M)
        --max-record-size <SIZE>   Longest accepted record (default: 1M)
    -v, --version                  Print version information
        --help                     Print this help message

SIZES accept K and M suffixes, e.g. 64K or 8M.

EXAMPLES:
    flashlog                             # Start on 127.0.0.1:24224
    flashlog --port 5170                 # Start on port 5170
    flashlog --buffer-max-size 16M       # Allow larger bursts per client

SENDING LOGS:
    $ printf 'hello\nworld\n' | nc 127.0.0.1 24224
"#
    );
}

/// Logs records as they arrive from the reactor thread
async fn consume_records(mut records: UnboundedReceiver<Record>) {
    while let Some(record) = records.recv().await {
        info!(
            token = %record.token,
            bytes = record.payload.len(),
            "{}",
            String::from_utf8_lossy(&record.payload)
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match IngestConfig::from_args(std::env::args().skip(1)) {
        Ok(CliCommand::Run(config)) => Arc::new(config),
        Ok(CliCommand::Help) => {
            print_help();
            return Ok(());
        }
        Ok(CliCommand::Version) => {
            println!("FlashLog version {}", flashlog::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!(
        version = flashlog::VERSION,
        chunk_size = config.chunk_size,
        buffer_max_size = config.buffer_size_ceiling,
        "FlashLog starting"
    );

    let (tx, rx) = unbounded_channel();
    let processor = LineProcessor::new(config.max_record_size, tx);
    let stats = Arc::new(ConnectionStats::new());

    let server = Server::bind(Arc::clone(&config), processor, Arc::clone(&stats))?;
    info!("Listening on {}", server.local_addr()?);
    let handle = server.handle();

    let consumer = tokio::spawn(consume_records(rx));
    let mut reactor = tokio::task::spawn_blocking(move || server.run());

    tokio::select! {
        result = &mut reactor => {
            if let Err(e) = result? {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        result = signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, stopping server...");
            handle.shutdown()?;
            reactor.await??;
        }
    }

    // The processor (and its sender) was dropped with the server
    consumer.await?;

    let snapshot = stats.snapshot();
    info!(
        connections = snapshot.connections_accepted,
        bytes = snapshot.bytes_read,
        records = snapshot.records_processed,
        buffer_rejections = snapshot.buffer_rejections,
        protocol_errors = snapshot.protocol_errors,
        "Server shutdown complete"
    );
    Ok(())
}
