//! Serial console simulator.
//!
//! Reads one command per line and drives the mock devices, the link state
//! and the engine's mode switches. Mirrors the single-letter commands of the
//! terminal's serial port (`f`, `t`) and adds the stimuli real hardware would
//! produce (cards, fingers, radio and sensor connectivity).

use rollcall_core::CardId;
use rollcall_engine::{ControlError, ControlHandle, ControlRequest, ControlResponse};
use rollcall_hardware::HardwareError;
use rollcall_hardware::mock::{MockFingerprintHandle, MockProximityReaderHandle};
use rollcall_network::LinkMonitor;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const HELP: &str = "\
Commands:
  card <hex>        present a card UID to the reader
  finger <pattern>  place a finger (any text identifies it)
  lift              remove the finger from the sensor
  wifi on|off       bring the network link up or down
  sensor on|off     connect or disconnect the fingerprint sensor
  f                 toggle fingerprint requirement
  t                 test the fingerprint sensor
  help              show this help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Card(CardId),
    Finger(Vec<u8>),
    Lift,
    Wifi(bool),
    Sensor(bool),
    ToggleFingerprint,
    TestSensor,
    Help,
}

#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("Unknown command: {0} (type 'help')")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid card: {0}")]
    Card(#[from] rollcall_core::Error),

    #[error(transparent)]
    Device(#[from] HardwareError),

    #[error(transparent)]
    Control(#[from] ControlError),
}

impl FromStr for Command {
    type Err = ConsoleError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let arg = words.next();

        match (verb.to_ascii_lowercase().as_str(), arg) {
            ("card", Some(hex)) => Ok(Self::Card(CardId::from_hex(hex)?)),
            ("card", None) => Err(ConsoleError::Usage("card <hex>")),
            ("finger", Some(pattern)) => Ok(Self::Finger(pattern.as_bytes().to_vec())),
            ("finger", None) => Err(ConsoleError::Usage("finger <pattern>")),
            ("lift", _) => Ok(Self::Lift),
            ("wifi", Some(state)) => on_off(state, "wifi on|off").map(Self::Wifi),
            ("wifi", None) => Err(ConsoleError::Usage("wifi on|off")),
            ("sensor", Some(state)) => on_off(state, "sensor on|off").map(Self::Sensor),
            ("sensor", None) => Err(ConsoleError::Usage("sensor on|off")),
            ("f", _) => Ok(Self::ToggleFingerprint),
            ("t", _) => Ok(Self::TestSensor),
            ("help" | "?", _) => Ok(Self::Help),
            _ => Err(ConsoleError::Unknown(line.trim().to_string())),
        }
    }
}

fn on_off(state: &str, usage: &'static str) -> Result<bool, ConsoleError> {
    match state {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(ConsoleError::Usage(usage)),
    }
}

/// Everything the console can poke.
#[derive(Debug, Clone)]
pub struct Console {
    fingers: MockFingerprintHandle,
    cards: MockProximityReaderHandle,
    link: LinkMonitor,
    control: ControlHandle,
}

impl Console {
    pub fn new(
        fingers: MockFingerprintHandle,
        cards: MockProximityReaderHandle,
        link: LinkMonitor,
        control: ControlHandle,
    ) -> Self {
        Self {
            fingers,
            cards,
            link,
            control,
        }
    }

    /// Apply one command and describe what happened.
    pub async fn execute(&self, command: Command) -> Result<String, ConsoleError> {
        debug!(?command, "Console command");

        match command {
            Command::Card(card) => {
                let reply = format!("Card {card} presented");
                self.cards.present_card(card)?;
                Ok(reply)
            }
            Command::Finger(pattern) => {
                self.fingers.place_finger(pattern);
                Ok("Finger placed".to_string())
            }
            Command::Lift => {
                self.fingers.lift_finger();
                Ok("Finger lifted".to_string())
            }
            Command::Wifi(up) => {
                self.link.set_connected(up);
                Ok(format!("WiFi {}", if up { "connected" } else { "disconnected" }))
            }
            Command::Sensor(connected) => {
                self.fingers.set_connected(connected);
                Ok(format!(
                    "Fingerprint sensor {}",
                    if connected { "connected" } else { "disconnected" }
                ))
            }
            Command::ToggleFingerprint => {
                match self
                    .control
                    .request(ControlRequest::ToggleFingerprintRequired)
                    .await?
                {
                    ControlResponse::FingerprintMode { required } => Ok(format!(
                        "Fingerprint mode: {}",
                        if required { "ON" } else { "OFF" }
                    )),
                    other => Ok(format!("{other:?}")),
                }
            }
            Command::TestSensor => match self.control.request(ControlRequest::TestSensor).await? {
                ControlResponse::SensorTest(report) => match report.parameters {
                    Some(p) if report.connected => Ok(format!(
                        "Sensor OK: capacity {}, security level {}, system id {:#06x}",
                        p.capacity, p.security_level, p.system_id
                    )),
                    _ => Ok("Sensor not responding".to_string()),
                },
                other => Ok(format!("{other:?}")),
            },
            Command::Help => Ok(HELP.to_string()),
        }
    }

    /// Process lines from `input` until it closes or `shutdown` fires.
    pub async fn run<R>(self, input: R, shutdown: CancellationToken)
    where
        R: AsyncBufRead + Unpin,
    {
        info!("Console ready, type 'help' for commands");
        let mut lines = input.lines();

        loop {
            let line = tokio::select! {
                () = shutdown.cancelled() => break,
                line = lines.next_line() => line,
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("Console input closed");
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "Console read failed");
                    break;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let outcome = match line.parse::<Command>() {
                Ok(command) => self.execute(command).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(reply) => println!("{reply}"),
                Err(e) => println!("{e}"),
            }
        }
    }
}
