use chrono::Utc;
use concord_core::Timestamp;
use concord_ports::Clock;

/// Wall clock used by every production process
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock::new();
        let before = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(clock.now() - before >= Duration::milliseconds(9));
    }
}
