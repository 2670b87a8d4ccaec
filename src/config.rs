//! Configuration for the gsr registry
//!
//! All options are resolved from `GSR_*` environment variables with
//! documented defaults. Unknown options and malformed numerics fall back
//! silently to the defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ETCD_ENDPOINTS: &str = "http://127.0.0.1:2379";
const DEFAULT_KEY_PREFIX: &str = "gsr/";
const DEFAULT_CONNECT_TIMEOUT_SECONDS: i64 = 300;
const DEFAULT_DIAL_TIMEOUT_SECONDS: i64 = 1;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: i64 = 1;
const DEFAULT_USE_TLS: bool = false;
const DEFAULT_TLS_CERT_PATH: &str = "/etc/gsr/server.pem";
const DEFAULT_TLS_KEY_PATH: &str = "/etc/gsr/server.key";
const DEFAULT_LOG_LEVEL: u8 = 0;
const DEFAULT_LEASE_SECONDS: i64 = 60;

/// Default port appended to etcd endpoints that omit one.
const DEFAULT_ETCD_PORT: &str = "2379";

/// Immutable configuration for a registry handle.
///
/// Construct with [`GsrConfig::from_env`] or build one explicitly and pass
/// it to `Registry::with_config`. The value is threaded through the handle;
/// no process-wide configuration state exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GsrConfig {
    /// etcd endpoint URLs, scheme and port normalized.
    pub etcd_endpoints: Vec<String>,

    /// Key prefix for all registry keys, ending in exactly one `/`.
    pub key_prefix: String,

    /// Ceiling on total time spent in the connect retry loop.
    pub connect_timeout: Duration,

    /// Per-attempt dial timeout.
    pub dial_timeout: Duration,

    /// Deadline applied to each individual etcd request.
    pub request_timeout: Duration,

    /// Whether to connect to etcd over TLS.
    pub use_tls: bool,

    /// Client certificate path, used when TLS is enabled.
    pub tls_cert_path: PathBuf,

    /// Client private key path, used when TLS is enabled.
    pub tls_key_path: PathBuf,

    /// Log verbosity: 0 = silent, 1 = info, 2 and up = debug.
    pub log_level: u8,

    /// TTL in seconds for endpoint leases.
    pub lease_seconds: i64,
}

impl Default for GsrConfig {
    fn default() -> Self {
        Self {
            etcd_endpoints: vec![DEFAULT_ETCD_ENDPOINTS.to_string()],
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS as u64),
            dial_timeout: Duration::from_secs(DEFAULT_DIAL_TIMEOUT_SECONDS as u64),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS as u64),
            use_tls: DEFAULT_USE_TLS,
            tls_cert_path: PathBuf::from(DEFAULT_TLS_CERT_PATH),
            tls_key_path: PathBuf::from(DEFAULT_TLS_KEY_PATH),
            log_level: DEFAULT_LOG_LEVEL,
            lease_seconds: DEFAULT_LEASE_SECONDS,
        }
    }
}

impl GsrConfig {
    /// Resolve the configuration from `GSR_*` environment variables.
    pub fn from_env() -> Self {
        let etcd_endpoints = env_or_default_str("GSR_ETCD_ENDPOINTS", DEFAULT_ETCD_ENDPOINTS)
            .split(',')
            .map(normalize_endpoint)
            .collect();
        let key_prefix =
            normalize_prefix(&env_or_default_str("GSR_KEY_PREFIX", DEFAULT_KEY_PREFIX));
        let connect_timeout = seconds_from_env(
            "GSR_ETCD_CONNECT_TIMEOUT_SECONDS",
            DEFAULT_CONNECT_TIMEOUT_SECONDS,
        );
        let dial_timeout =
            seconds_from_env("GSR_ETCD_DIAL_TIMEOUT_SECONDS", DEFAULT_DIAL_TIMEOUT_SECONDS);
        let request_timeout = seconds_from_env(
            "GSR_ETCD_REQUEST_TIMEOUT_SECONDS",
            DEFAULT_REQUEST_TIMEOUT_SECONDS,
        );
        let use_tls = env_or_default_bool("GSR_USE_TLS", DEFAULT_USE_TLS);
        let tls_cert_path =
            PathBuf::from(env_or_default_str("GSR_TLS_CERT_PATH", DEFAULT_TLS_CERT_PATH));
        let tls_key_path =
            PathBuf::from(env_or_default_str("GSR_TLS_KEY_PATH", DEFAULT_TLS_KEY_PATH));
        let log_level = u8::try_from(env_or_default_int("GSR_LOG_LEVEL", DEFAULT_LOG_LEVEL as i64))
            .unwrap_or(DEFAULT_LOG_LEVEL);
        let lease_seconds = env_or_default_int("GSR_LEASE_SECONDS", DEFAULT_LEASE_SECONDS).max(1);

        Self {
            etcd_endpoints,
            key_prefix,
            connect_timeout,
            dial_timeout,
            request_timeout,
            use_tls,
            tls_cert_path,
            tls_key_path,
            log_level,
            lease_seconds,
        }
    }

    /// Filter directive matching the configured verbosity, suitable for
    /// `tracing_subscriber::EnvFilter` in the embedding program.
    pub fn log_filter(&self) -> &'static str {
        match self.log_level {
            0 => "off",
            1 => "info",
            _ => "debug",
        }
    }
}

/// Ensure an endpoint has a scheme and a port, matching the documented
/// normalization: missing scheme gets `http://`, missing port gets the
/// etcd default.
fn normalize_endpoint(endpoint: &str) -> String {
    let mut normalized = endpoint.trim().to_string();
    if !normalized.starts_with("http") {
        normalized = format!("http://{normalized}");
    }
    if normalized.matches(':').count() == 1 {
        normalized = format!("{normalized}:{DEFAULT_ETCD_PORT}");
    }
    normalized
}

/// Trim any run of trailing slashes and append exactly one.
fn normalize_prefix(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

fn seconds_from_env(key: &str, default: i64) -> Duration {
    Duration::from_secs(env_or_default_int(key, default).max(0) as u64)
}

fn env_or_default_str(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_or_default_int(key: &str, default: i64) -> i64 {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value.parse().unwrap_or(default),
        _ => default,
    }
}

fn env_or_default_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => match value.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => true,
            "false" | "f" | "0" | "no" => false,
            _ => default,
        },
        _ => default,
    }
}
