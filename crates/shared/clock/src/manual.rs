use chrono::Duration;
use concord_core::Timestamp;
use concord_ports::Clock;
use parking_lot::RwLock;
use std::sync::Arc;

/// Clock that only moves when told to
///
/// Used to pin "now" in tests: order timestamps, heartbeat alignment and
/// cancel times all read it through the `Clock` port.
pub struct ManualClock {
    current_time: RwLock<Timestamp>,
}

impl ManualClock {
    /// Create a manual clock frozen at `initial_time`
    pub fn new(initial_time: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            current_time: RwLock::new(initial_time),
        })
    }

    /// Advance the time by a specified duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current_time.write();
        *current += duration;
    }

    /// Explicitly set the time
    ///
    /// Warning: moving backwards breaks heartbeat alignment assumptions.
    pub fn set_time(&self, time: Timestamp) {
        *self.current_time.write() = time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current_time.read()
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
