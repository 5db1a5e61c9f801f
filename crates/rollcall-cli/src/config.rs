//! Command line and environment configuration.

use clap::Parser;
use rollcall_core::constants::{
    DEFAULT_PROBE_ATTEMPTS, DEFAULT_PROBE_INTERVAL_MS, DEFAULT_SCAN_COOLDOWN_MS,
    DEFAULT_SCAN_TIMEOUT_MS, DEFAULT_TELEMETRY_TIMEOUT_MS, DEFAULT_TICK_INTERVAL_MS,
};
use rollcall_engine::{EngineConfig, TelemetryConfig};
use rollcall_network::ApiConfig;
use std::net::SocketAddr;
use std::time::Duration;

/// Card and fingerprint attendance terminal
#[derive(Parser, Debug, Clone)]
#[command(name = "rollcall")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Card and fingerprint attendance terminal", long_about = None)]
pub struct Args {
    /// Address the control API listens on
    #[arg(short, long, env = "ROLLCALL_BIND", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    /// Backend endpoint identification events are POSTed to
    #[arg(
        long,
        env = "ROLLCALL_TELEMETRY_URL",
        default_value = "http://127.0.0.1:8000/attendances"
    )]
    pub telemetry_url: String,

    /// Key sent to the backend with every event
    #[arg(long, env = "ROLLCALL_API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Engine tick period in milliseconds
    #[arg(long, default_value_t = DEFAULT_TICK_INTERVAL_MS)]
    pub tick_ms: u64,

    /// Fingerprint confirmation window in milliseconds
    #[arg(long, default_value_t = DEFAULT_SCAN_TIMEOUT_MS)]
    pub scan_timeout_ms: u64,

    /// Pause after each scan before the reader is polled again
    #[arg(long, default_value_t = DEFAULT_SCAN_COOLDOWN_MS)]
    pub scan_cooldown_ms: u64,

    /// Timeout for each telemetry request in milliseconds
    #[arg(long, default_value_t = DEFAULT_TELEMETRY_TIMEOUT_MS)]
    pub telemetry_timeout_ms: u64,

    /// Startup handshake attempts before running card-only
    #[arg(long, default_value_t = DEFAULT_PROBE_ATTEMPTS)]
    pub probe_attempts: u32,

    /// Delay between startup handshake attempts in milliseconds
    #[arg(long, default_value_t = DEFAULT_PROBE_INTERVAL_MS)]
    pub probe_interval_ms: u64,

    /// Do not read simulator commands from stdin
    #[arg(long, default_value = "false")]
    pub no_console: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_millis(self.tick_ms),
            scan_timeout: Duration::from_millis(self.scan_timeout_ms),
            scan_cooldown: Duration::from_millis(self.scan_cooldown_ms),
            probe_attempts: self.probe_attempts,
            probe_interval: Duration::from_millis(self.probe_interval_ms),
            ..EngineConfig::default()
        }
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            url: self.telemetry_url.clone(),
            api_key: self.api_key.clone(),
            timeout: Duration::from_millis(self.telemetry_timeout_ms),
        }
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig { bind: self.bind }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_library_defaults() {
        let args = Args::try_parse_from(["rollcall"]).unwrap();

        assert_eq!(args.engine_config(), EngineConfig::default());
        assert_eq!(args.api_config(), ApiConfig::default());
        assert_eq!(args.telemetry_config().url, TelemetryConfig::default().url);
        assert!(!args.no_console);
    }

    #[test]
    fn test_overrides() {
        let args = Args::try_parse_from([
            "rollcall",
            "--bind",
            "127.0.0.1:9000",
            "--api-key",
            "secret",
            "--scan-timeout-ms",
            "5000",
            "--no-console",
        ])
        .unwrap();

        assert_eq!(args.bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(args.telemetry_config().api_key, "secret");
        assert_eq!(args.engine_config().scan_timeout, Duration::from_secs(5));
        assert!(args.no_console);
    }

    #[test]
    fn test_rejects_bad_bind_address() {
        assert!(Args::try_parse_from(["rollcall", "--bind", "not-an-address"]).is_err());
    }
}
