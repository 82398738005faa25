//! Configuration management via environment variables
//!
//! Provides helper functions for reading `APIMON_*` environment variables and
//! the [`MonitorConfig`] assembled from them, plus the endpoint definition file
//! consumed by the `monitor` subcommand.

use crate::common::error::{MonitorError, MonitorResult};
use crate::types::request::RequestSpec;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default header used for `api-key` authentication
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Get an environment variable, ignoring empty values
pub fn get_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable or a default value
pub fn get_env_or(name: &str, default: &str) -> String {
    get_env(name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable parsed to a specific type
///
/// Unparseable values fall back to `default` with a warning.
pub fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    match get_env(name) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(
                    "Environment variable '{}' has invalid value '{}', using default",
                    name,
                    raw
                );
                default
            }
        },
        None => default,
    }
}

/// Default user agent sent with every request
pub fn default_user_agent() -> String {
    format!("apimon/{}", env!("CARGO_PKG_VERSION"))
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Timeout applied to manual tests
    pub request_timeout: Duration,
    /// Timeout applied to each scheduled check
    pub check_timeout: Duration,
    /// Monitoring interval used when none is given explicitly
    pub check_interval: Duration,
    /// Capacity of the history ring buffer
    pub history_capacity: usize,
    /// Number of recent scheduled-check records used by stats
    pub stats_sample_size: usize,
    /// Upper bound on concurrently running checks within a tick
    pub max_concurrent_checks: usize,
    /// Header name used for `api-key` auth without an explicit header
    pub api_key_header: String,
    /// `User-Agent` sent unless the request overrides it
    pub user_agent: String,
    /// Maximum number of response body bytes read per request
    pub max_body_bytes: usize,
    /// Stored response bodies are truncated to this many characters
    pub history_body_chars: usize,
    /// Response time above which an endpoint counts as slow
    pub slow_threshold_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            check_timeout: Duration::from_secs(5),
            check_interval: Duration::from_secs(300),
            history_capacity: 100,
            stats_sample_size: 50,
            max_concurrent_checks: 32,
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            user_agent: default_user_agent(),
            max_body_bytes: 1024 * 1024,
            history_body_chars: 1000,
            slow_threshold_ms: 2000,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let request_timeout_secs = get_env_parse(
            "APIMON_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        );
        let check_timeout_secs =
            get_env_parse("APIMON_CHECK_TIMEOUT_SECS", defaults.check_timeout.as_secs());
        let check_interval_secs = get_env_parse(
            "APIMON_CHECK_INTERVAL_SECS",
            defaults.check_interval.as_secs(),
        );

        Self {
            request_timeout: Duration::from_secs(request_timeout_secs.max(1)),
            check_timeout: Duration::from_secs(check_timeout_secs.max(1)),
            check_interval: Duration::from_secs(check_interval_secs.max(1)),
            history_capacity: get_env_parse("APIMON_HISTORY_CAPACITY", defaults.history_capacity)
                .max(1),
            stats_sample_size: get_env_parse(
                "APIMON_STATS_SAMPLE_SIZE",
                defaults.stats_sample_size,
            )
            .max(1),
            max_concurrent_checks: get_env_parse(
                "APIMON_MAX_CONCURRENT_CHECKS",
                defaults.max_concurrent_checks,
            )
            .max(1),
            api_key_header: get_env_or("APIMON_API_KEY_HEADER", &defaults.api_key_header),
            user_agent: get_env_or("APIMON_USER_AGENT", &defaults.user_agent),
            max_body_bytes: get_env_parse("APIMON_MAX_BODY_BYTES", defaults.max_body_bytes),
            history_body_chars: get_env_parse(
                "APIMON_HISTORY_BODY_CHARS",
                defaults.history_body_chars,
            ),
            slow_threshold_ms: get_env_parse(
                "APIMON_SLOW_THRESHOLD_MS",
                defaults.slow_threshold_ms,
            ),
        }
    }
}

/// One monitored endpoint in an endpoints file
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointDefinition {
    /// Endpoint identifier
    pub id: String,
    /// Request used for the periodic check
    #[serde(flatten)]
    pub request: RequestSpec,
}

/// Endpoints file (`endpoints: [...]`)
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointsFile {
    /// Endpoint definitions
    #[serde(default)]
    pub endpoints: Vec<EndpointDefinition>,
}

/// Load endpoint definitions from a YAML or JSON file
///
/// Files ending in `.json` are parsed as JSON, everything else as YAML.
pub fn load_endpoints_file(path: &Path) -> MonitorResult<Vec<EndpointDefinition>> {
    let contents = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let file: EndpointsFile = if is_json {
        serde_json::from_str(&contents)?
    } else {
        serde_yaml::from_str(&contents)?
    };

    let mut seen = std::collections::HashSet::new();
    for endpoint in &file.endpoints {
        if endpoint.id.trim().is_empty() {
            return Err(MonitorError::Config(format!(
                "{}: endpoint id must not be empty",
                path.display()
            )));
        }
        if !seen.insert(endpoint.id.as_str()) {
            return Err(MonitorError::Config(format!(
                "{}: duplicate endpoint id '{}'",
                path.display(),
                endpoint.id
            )));
        }
    }

    Ok(file.endpoints)
}
