//! CLI module for apimon
//!
//! Provides the `test` and `monitor` subcommands.

pub mod monitor;

use clap::{Parser, Subcommand, ValueEnum};

/// apimon - API request tester and health monitor
#[derive(Parser, Debug)]
#[command(name = "apimon")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    APIMON_LOG_LEVEL              Log filter (default: info, falls back to RUST_LOG)
    APIMON_LOG_DIR                Also write daily-rotated log files to this directory
    APIMON_REQUEST_TIMEOUT_SECS   Manual test timeout (default: 10)
    APIMON_CHECK_TIMEOUT_SECS     Scheduled check timeout (default: 5)
    APIMON_CHECK_INTERVAL_SECS    Monitoring interval (default: 300)
    APIMON_HISTORY_CAPACITY       History ring buffer size (default: 100)
    APIMON_STATS_SAMPLE_SIZE      Records used for average response time (default: 50)
    APIMON_MAX_CONCURRENT_CHECKS  Concurrent checks per tick (default: 32)
    APIMON_API_KEY_HEADER         Default api-key header (default: X-API-Key)
    APIMON_USER_AGENT             User-Agent header (default: apimon/<version>)
    APIMON_MAX_BODY_BYTES         Response body read limit (default: 1048576)
    APIMON_HISTORY_BODY_CHARS     Stored body length (default: 1000)
    APIMON_SLOW_THRESHOLD_MS      Slow endpoint threshold (default: 2000)
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a request and print the result
    Test(test::TestArgs),
    /// Periodically check the endpoints defined in a file
    Monitor(monitor::MonitorArgs),
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human readable text
    #[default]
    Text,
    /// JSON
    Json,
}
