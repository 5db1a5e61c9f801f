//! Rollcall attendance terminal.
//!
//! Wires the devices, the coordination engine, the telemetry uplink and the
//! control API together and runs them until Ctrl+C. Devices are the mock
//! implementations driven from the serial console simulator on stdin.

mod config;
mod console;

use anyhow::{Context, Result};
use clap::Parser;
use rollcall_engine::{Engine, TelemetryDispatcher};
use rollcall_hardware::devices::{AnyBiometricDevice, AnyProximityReader};
use rollcall_hardware::mock::{MockFingerprintSensor, MockProximityReader};
use rollcall_network::{HttpTransport, LinkMonitor, api};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Args;
use crate::console::Console;

/// Grace period for blocking tasks (the stdin reader) at exit.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let result = runtime.block_on(run(args));

    // A pending stdin read would otherwise hold the process open.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(args: Args) -> Result<()> {
    info!("Starting rollcall terminal v{}", env!("CARGO_PKG_VERSION"));

    let (sensor, fingers) = MockFingerprintSensor::new();
    let (reader, cards) = MockProximityReader::new();
    let link = LinkMonitor::new(true);

    let transport = HttpTransport::new().context("Failed to build HTTP client")?;
    let telemetry = args.telemetry_config();
    info!(url = %telemetry.url, "Telemetry endpoint");
    let dispatcher = TelemetryDispatcher::new(telemetry, transport, link.clone());

    let (mut engine, control) = Engine::new(
        args.engine_config(),
        AnyBiometricDevice::Mock(sensor),
        AnyProximityReader::Mock(reader),
        dispatcher,
    );
    engine.start().await;

    let shutdown = CancellationToken::new();

    let listener = api::bind(&args.api_config())
        .await
        .with_context(|| format!("Failed to bind control API on {}", args.bind))?;
    let server = tokio::spawn(api::serve(listener, control.clone(), shutdown.clone()));

    // Held until exit so the mock devices stay attached without a console.
    let console = Console::new(fingers, cards, link, control);
    if !args.no_console {
        let input = BufReader::new(tokio::io::stdin());
        tokio::spawn(console.clone().run(input, shutdown.clone()));
    }

    tokio::spawn(cancel_on_signal(signal::ctrl_c(), shutdown.clone()));

    let stats = engine.run(shutdown.clone()).await;
    info!(
        accepted = stats.accepted,
        rejected = stats.rejected,
        transport_errors = stats.transport_errors,
        disconnected = stats.disconnected,
        "Telemetry summary"
    );

    server
        .await
        .context("Control API task failed")?
        .context("Control API server error")?;

    drop(console);
    info!("Shutdown complete");
    Ok(())
}

/// Cancel `shutdown` once `signal` fires.
///
/// A signal listener that cannot be installed leaves the terminal running.
async fn cancel_on_signal<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for Ctrl+C: {}", e);
        return;
    }
    info!("Received Ctrl+C, shutting down...");
    shutdown.cancel();
}

/// Install the global subscriber; `RUST_LOG` overrides `level`.
fn setup_logging(level: &str) {
    let log_level = level.parse::<Level>().unwrap_or(Level::INFO);

    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;

    #[tokio::test]
    async fn test_signal_cancels_shutdown() {
        let shutdown = CancellationToken::new();
        cancel_on_signal(ready(Ok(())), shutdown.clone()).await;
        assert!(shutdown.is_cancelled());
    }

    #[tokio::test]
    async fn test_signal_listener_failure_keeps_running() {
        let shutdown = CancellationToken::new();
        let failed = ready(Err(std::io::Error::other("no signal handler")));
        cancel_on_signal(failed, shutdown.clone()).await;
        assert!(!shutdown.is_cancelled());
    }
}
