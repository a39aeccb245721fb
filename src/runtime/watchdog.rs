//! Blocked-operation watchdog for port sends and receives
//!
//! Each port records the start time of its current blocking operation in an
//! atomic. A monitoring thread scans the registered ports once a second and
//! warns, once per operation, about any that have been blocked longer than the
//! threshold.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const DEFAULT_THRESHOLD: Duration = Duration::from_secs(5);
const SCAN_INTERVAL: Duration = Duration::from_secs(1);

#[inline(always)]
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

struct PortState {
    /// ms since epoch when the current operation started, 0 when idle
    op_started: AtomicU64,
    warned: AtomicBool,
    node_name: String,
    port_name: String,
    operation: &'static str,
}

/// Per-port handle held by senders and receivers
#[derive(Clone)]
pub struct WatchdogHandle {
    state: Arc<PortState>,
}

impl WatchdogHandle {
    #[inline(always)]
    fn begin(&self) {
        self.state.op_started.store(now_millis(), Ordering::Relaxed);
        self.state.warned.store(false, Ordering::Relaxed);
    }

    #[inline(always)]
    fn end(&self) {
        if self.state.warned.swap(false, Ordering::Relaxed) {
            info!(
                "UNBLOCKED: [{}] {} on port '{}'",
                self.state.node_name, self.state.operation, self.state.port_name
            );
        }
        self.state.op_started.store(0, Ordering::Relaxed);
    }
}

/// Shared registry of monitored ports
#[derive(Clone)]
pub struct Watchdog {
    ports: Arc<Mutex<Vec<Weak<PortState>>>>,
    running: Arc<AtomicBool>,
    threshold: Duration,
}

impl Watchdog {
    pub fn new() -> Self {
        Self {
            ports: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(true)),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Report operations blocked longer than `threshold`
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Register a port for monitoring
    pub fn register_port(
        &self,
        node_name: &str,
        operation: &'static str,
        port_name: &str,
    ) -> WatchdogHandle {
        let state = Arc::new(PortState {
            op_started: AtomicU64::new(0),
            warned: AtomicBool::new(false),
            node_name: node_name.to_string(),
            port_name: port_name.to_string(),
            operation,
        });

        if let Ok(mut ports) = self.ports.lock() {
            ports.push(Arc::downgrade(&state));
        }

        WatchdogHandle { state }
    }

    /// Scan registered ports, returning how many are currently over threshold
    pub fn check_for_blocked(&self) -> usize {
        let now = now_millis();
        let threshold_ms = self.threshold.as_millis() as u64;
        let mut blocked = 0;

        let Ok(mut ports) = self.ports.lock() else {
            return 0;
        };

        ports.retain(|weak| {
            let Some(state) = weak.upgrade() else {
                return false;
            };
            let start = state.op_started.load(Ordering::Relaxed);
            if start > 0 {
                let elapsed_ms = now.saturating_sub(start);
                if elapsed_ms > threshold_ms {
                    blocked += 1;
                    if !state.warned.swap(true, Ordering::Relaxed) {
                        warn!(
                            "BLOCKED: [{}] {} on port '{}' for {:.1}s",
                            state.node_name,
                            state.operation,
                            state.port_name,
                            elapsed_ms as f64 / 1000.0
                        );
                    }
                }
            }
            true
        });

        blocked
    }

    /// Start the monitoring thread
    pub fn start_monitoring_thread(&self) -> JoinHandle<()> {
        let watchdog = self.clone();
        std::thread::spawn(move || {
            while watchdog.running.load(Ordering::Relaxed) {
                std::thread::sleep(SCAN_INTERVAL);
                watchdog.check_for_blocked();
            }
        })
    }

    /// Stop the monitoring thread after its current scan
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard marking a blocking operation on a port
pub struct OperationGuard<'a> {
    handle: &'a WatchdogHandle,
}

impl<'a> OperationGuard<'a> {
    #[inline(always)]
    pub fn new(handle: &'a WatchdogHandle) -> Self {
        handle.begin();
        Self { handle }
    }
}

impl Drop for OperationGuard<'_> {
    #[inline(always)]
    fn drop(&mut self) {
        self.handle.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_port_not_blocked() {
        let wd = Watchdog::new().with_threshold(Duration::ZERO);
        let _handle = wd.register_port("deserializer", "recv", "data_in");
        assert_eq!(wd.check_for_blocked(), 0);
    }

    #[test]
    fn test_long_operation_reported() {
        let wd = Watchdog::new().with_threshold(Duration::ZERO);
        let handle = wd.register_port("deserializer", "send", "data_out");
        {
            let _guard = OperationGuard::new(&handle);
            std::thread::sleep(Duration::from_millis(5));
            assert_eq!(wd.check_for_blocked(), 1);
        }
        assert_eq!(wd.check_for_blocked(), 0);
    }

    #[test]
    fn test_dropped_ports_are_forgotten() {
        let wd = Watchdog::new().with_threshold(Duration::ZERO);
        let handle = wd.register_port("source", "send", "out");
        drop(handle);
        wd.check_for_blocked();
        assert!(wd.ports.lock().unwrap().is_empty());
    }
}
