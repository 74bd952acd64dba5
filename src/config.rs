//! Server configuration, parsed from the command line.

use crate::commands::DEFAULT_MAX_ITEM_SIZE;
use crate::storage::ExpiryConfig;
use crate::DEFAULT_PORT;
use clap::Parser;
use std::time::Duration;

/// mcached - an in-memory cache speaking the memcached text protocol
#[derive(Parser, Debug, Clone)]
#[command(name = "mcached")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = crate::DEFAULT_HOST)]
    pub listen: String,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Largest payload a set may declare, in bytes
    #[arg(short = 'I', long, default_value_t = DEFAULT_MAX_ITEM_SIZE)]
    pub max_item_size: usize,

    /// Milliseconds between expiry sweeps
    #[arg(long, default_value_t = 1000)]
    pub sweep_interval_ms: u64,

    /// Most expired entries removed per sweep
    #[arg(long, default_value_t = 1024)]
    pub sweep_max_keys: usize,

    /// Close connections idle for this many seconds (0 = never)
    #[arg(long, default_value_t = 0)]
    pub idle_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            listen: crate::DEFAULT_HOST.to_string(),
            verbose: 0,
            max_item_size: DEFAULT_MAX_ITEM_SIZE,
            sweep_interval_ms: 1000,
            sweep_max_keys: 1024,
            idle_timeout: 0,
        }
    }
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }

    pub fn expiry_config(&self) -> ExpiryConfig {
        ExpiryConfig {
            interval: Duration::from_millis(self.sweep_interval_ms),
            max_keys_per_sweep: self.sweep_max_keys,
        }
    }

    /// `None` when idle connections are kept forever.
    pub fn idle_timeout(&self) -> Option<Duration> {
        match self.idle_timeout {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Default log filter for the chosen verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_parsed_defaults() {
        let parsed = Config::parse_from(["mcached"]);
        let default = Config::default();

        assert_eq!(parsed.port, 11211);
        assert_eq!(parsed.port, default.port);
        assert_eq!(parsed.listen, default.listen);
        assert_eq!(parsed.max_item_size, default.max_item_size);
        assert_eq!(parsed.sweep_interval_ms, default.sweep_interval_ms);
        assert_eq!(parsed.sweep_max_keys, default.sweep_max_keys);
        assert_eq!(parsed.idle_timeout(), None);
    }

    #[test]
    fn test_parse_flags() {
        let config = Config::parse_from([
            "mcached",
            "-p",
            "11311",
            "-l",
            "127.0.0.1",
            "-vv",
            "-I",
            "2048",
            "--sweep-interval-ms",
            "250",
            "--sweep-max-keys",
            "10",
            "--idle-timeout",
            "30",
        ]);

        assert_eq!(config.bind_address(), "127.0.0.1:11311");
        assert_eq!(config.log_filter(), "trace");
        assert_eq!(config.max_item_size, 2048);
        assert_eq!(config.expiry_config().interval, Duration::from_millis(250));
        assert_eq!(config.expiry_config().max_keys_per_sweep, 10);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(Config::parse_from(["mcached"]).log_filter(), "info");
        assert_eq!(Config::parse_from(["mcached", "-v"]).log_filter(), "debug");
    }
}
