use anyhow::{Context, bail};
use clap::Parser;
use core::time::Duration;
use std::sync::Arc;
use todohash_tonic_core::todohash::{HashingConfig, RecordStore, SqliteStore, Strategy};

/// Path that selects a private in-memory SQLite database.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Runtime configuration for the record server.
///
/// Every value can be given as a CLI argument or an environment variable
/// (including through a `.env` file).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "todohash-tonic-server",
    version,
    about = "A gRPC service for owner-scoped records with concurrent hashing"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:50051" or "/tmp/todohash.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:50051"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// SQLite database file. `:memory:` keeps records for the lifetime of
    /// the process only.
    ///
    /// Environment variable: `DATABASE_URL`
    #[arg(long, env = "DATABASE_URL", default_value_t = String::from(IN_MEMORY_DATABASE))]
    pub database_url: String,

    /// Simulated processing time of each record hash, in milliseconds.
    ///
    /// Environment variable: `HASH_DELAY_MS`
    #[arg(long, env = "HASH_DELAY_MS", default_value_t = 500)]
    pub hash_delay_ms: u64,

    /// Upper bound on a `HashOwnerRecords` call, in milliseconds. A shorter
    /// client `grpc-timeout` takes precedence.
    ///
    /// Environment variable: `HASH_TIMEOUT_MS`
    #[arg(long, env = "HASH_TIMEOUT_MS", default_value_t = 5_000)]
    pub hash_timeout_ms: u64,

    /// How hashed records are collected: indexed-slot, slot-handle,
    /// locked-append, locked-append-prealloc, channel-relay or
    /// indexed-channel-relay.
    ///
    /// Environment variable: `AGGREGATION_STRATEGY`
    #[arg(long, env = "AGGREGATION_STRATEGY", default_value_t = Strategy::IndexedSlot)]
    pub aggregation_strategy: Strategy,

    /// Interval between items of the paced streaming endpoints, in
    /// milliseconds.
    ///
    /// Environment variable: `STREAM_INTERVAL_MS`
    #[arg(long, env = "STREAM_INTERVAL_MS", default_value_t = 100)]
    pub stream_interval_ms: u64,

    /// Capacity of the response buffer of streaming endpoints.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight requests to drain on shutdown before
    /// cancelling them.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub database_url: String,
    pub hashing: HashingConfig,
    pub hash_timeout: Duration,
    pub stream_interval: Duration,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.hash_delay_ms == 0 {
            bail!("HASH_DELAY_MS must be greater than 0");
        }
        if args.hash_timeout_ms == 0 {
            bail!("HASH_TIMEOUT_MS must be greater than 0");
        }
        if args.stream_interval_ms == 0 {
            bail!("STREAM_INTERVAL_MS must be greater than 0");
        }
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }
        if args.database_url.trim().is_empty() {
            bail!("DATABASE_URL must not be empty");
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            database_url: args.database_url,
            hashing: HashingConfig {
                delay: Duration::from_millis(args.hash_delay_ms),
                strategy: args.aggregation_strategy,
            },
            hash_timeout: Duration::from_millis(args.hash_timeout_ms),
            stream_interval: Duration::from_millis(args.stream_interval_ms),
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

impl ServerConfig {
    /// Opens the SQLite store named by `database_url`, creating the schema if
    /// needed.
    pub fn open_store(&self) -> anyhow::Result<Arc<dyn RecordStore>> {
        let store = if self.database_url == IN_MEMORY_DATABASE {
            SqliteStore::open_in_memory()
        } else {
            SqliteStore::open(&self.database_url)
        }
        .with_context(|| format!("failed to open database `{}`", self.database_url))?;
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let args = CliArgs::try_parse_from(
            core::iter::once("todohash-tonic-server").chain(args.iter().copied()),
        )?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn defaults_are_valid() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.hashing, HashingConfig::default());
        assert_eq!(config.hash_timeout, Duration::from_secs(5));
        assert_eq!(config.stream_interval, Duration::from_millis(100));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
        assert_eq!(config.database_url, IN_MEMORY_DATABASE);
    }

    #[test]
    fn parses_strategy_names() {
        let config = parse(&["--aggregation-strategy", "channel-relay"]).unwrap();
        assert_eq!(config.hashing.strategy, Strategy::ChannelRelay);
        assert!(parse(&["--aggregation-strategy", "round-robin"]).is_err());
    }

    #[test]
    fn rejects_zero_durations() {
        assert!(parse(&["--hash-delay-ms", "0"]).is_err());
        assert!(parse(&["--hash-timeout-ms", "0"]).is_err());
        assert!(parse(&["--stream-interval-ms", "0"]).is_err());
        assert!(parse(&["--stream-buffer-size", "0"]).is_err());
    }

    #[test]
    fn opens_in_memory_store() {
        let store = parse(&[]).unwrap().open_store().unwrap();
        assert!(store.list_all().unwrap().is_empty());
    }
}
