use concord_core::Timestamp;

/// Source of wall-clock time
///
/// Everything that stamps orders or aligns heartbeats reads time through
/// this port, so tests can pin it with a manual clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;

    /// Name used in log lines
    fn name(&self) -> &str {
        "Clock"
    }
}
