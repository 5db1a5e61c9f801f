//! Network link state.

use rollcall_engine::telemetry::Connectivity;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Shared flag recording whether the uplink is associated.
///
/// Clones observe and update the same state. The radio driver (or the
/// console simulator) flips it; the telemetry dispatcher reads it.
///
/// # Examples
///
/// ```
/// use rollcall_network::LinkMonitor;
/// use rollcall_engine::telemetry::Connectivity;
///
/// let link = LinkMonitor::new(true);
/// let observer = link.clone();
///
/// link.set_connected(false);
/// assert!(!observer.is_connected());
/// ```
#[derive(Debug, Clone)]
pub struct LinkMonitor {
    up: Arc<AtomicBool>,
}

impl LinkMonitor {
    pub fn new(connected: bool) -> Self {
        Self {
            up: Arc::new(AtomicBool::new(connected)),
        }
    }

    /// Record a link change; logs only on transitions.
    pub fn set_connected(&self, connected: bool) {
        let previous = self.up.swap(connected, Ordering::AcqRel);
        if previous != connected {
            info!(connected, "Network link changed");
        }
    }
}

impl Default for LinkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Connectivity for LinkMonitor {
    fn is_connected(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }
}
