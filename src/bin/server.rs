//! EmberKV Server Binary
//!
//! Opens the databases and serves RESP clients over TCP.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use emberkv::config::WalSyncStrategy;
use emberkv::network::Server;
use emberkv::{Config, Databases};
use tracing_subscriber::{fmt, EnvFilter};

/// EmberKV Server
#[derive(Parser, Debug)]
#[command(name = "emberkv-server")]
#[command(about = "RESP-compatible hash store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./emberkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// MemTable size limit in MB before flush
    #[arg(short = 'M', long, default_value = "64")]
    memtable_mb: usize,

    /// Number of logical databases
    #[arg(long, default_value = "16")]
    databases: usize,

    /// fsync the WAL every N entries (1 = every write)
    #[arg(long, default_value = "100")]
    sync_every: usize,

    /// Idle read timeout in milliseconds (0 = none)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,emberkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("EmberKV Server v{}", emberkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Listen address: {}", args.listen);

    let sync_strategy = if args.sync_every <= 1 {
        WalSyncStrategy::EveryWrite
    } else {
        WalSyncStrategy::EveryNEntries {
            count: args.sync_every,
        }
    };

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .memtable_size_limit(args.memtable_mb * 1024 * 1024)
        .databases(args.databases)
        .wal_sync_strategy(sync_strategy)
        .read_timeout_ms(args.read_timeout_ms)
        .build();

    let databases = match Databases::open(&config) {
        Ok(dbs) => Arc::new(dbs),
        Err(e) => {
            tracing::error!("Failed to open databases: {}", e);
            std::process::exit(1);
        }
    };

    let mut server = Server::new(config, Arc::clone(&databases));

    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received");
        shutdown.store(true, Ordering::SeqCst);
    }) {
        tracing::error!("Failed to install signal handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
    drop(server);

    match Arc::try_unwrap(databases) {
        Ok(dbs) => {
            if let Err(e) = dbs.close() {
                tracing::error!("Failed to close databases cleanly: {}", e);
                std::process::exit(1);
            }
        }
        Err(_) => tracing::warn!("Databases still shared at exit; relying on WAL recovery"),
    }

    tracing::info!("Server stopped");
}
