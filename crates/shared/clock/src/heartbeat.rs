//! Periodic tasks aligned to the wall clock
//!
//! A heartbeat either runs free (first tick immediately, then every period)
//! or "pile": ticks land on wall-clock multiples of the period, shifted by
//! an offset. A 60s pile heartbeat with a 2s offset started at 10:00:05
//! first fires at 10:01:02, then 10:02:02, and so on, in every process.
//!
//! Each task gets its own thread. After a tick the task sleeps at least
//! `min_tick` so a tick finishing just before a grid point cannot fire
//! twice. A tick that overruns its period is logged and the next one starts
//! right away; missed ticks are dropped, never replayed.

use chrono::Duration as TimeDelta;
use concord_core::Timestamp;
use concord_ports::Clock;
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatError {
    #[error("Heartbeat period must be positive: {0}")]
    InvalidPeriod(String),

    #[error("Heartbeat scheduler already started")]
    AlreadyStarted,

    #[error("Failed to spawn heartbeat thread: {0}")]
    Spawn(String),
}

/// How the first tick is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    /// Fire at start, then every period after start + offset
    #[default]
    FreeRunning,
    /// Fire on wall-clock multiples of the period, plus offset
    Pile,
}

/// Definition of a periodic task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub name: String,
    pub period: Duration,
    pub alignment: Alignment,
    pub offset: Duration,
}

impl Heartbeat {
    pub fn every(period: Duration) -> Self {
        Self {
            name: "heartbeat".to_string(),
            period,
            alignment: Alignment::FreeRunning,
            offset: Duration::ZERO,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn pile(mut self) -> Self {
        self.alignment = Alignment::Pile;
        self
    }

    pub fn offset(mut self, offset: Duration) -> Self {
        self.offset = offset;
        self
    }

    fn validate(&self) -> Result<(), HeartbeatError> {
        if self.period.is_zero() {
            return Err(HeartbeatError::InvalidPeriod(self.name.clone()));
        }
        Ok(())
    }
}

fn delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX)
}

/// Tick placement for one heartbeat, independent of threads and sleeping
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    period: TimeDelta,
    alignment: Alignment,
    offset: TimeDelta,
    min_tick: TimeDelta,
    anchor: Timestamp,
}

impl Schedule {
    /// Schedule for a task started at `start`
    pub fn new(heartbeat: &Heartbeat, min_tick: Duration, start: Timestamp) -> Self {
        let offset = delta(heartbeat.offset);
        let anchor = match heartbeat.alignment {
            Alignment::Pile => Timestamp::UNIX_EPOCH + offset,
            Alignment::FreeRunning => start + offset,
        };
        Self {
            period: delta(heartbeat.period),
            alignment: heartbeat.alignment,
            offset,
            min_tick: delta(min_tick),
            anchor,
        }
    }

    /// First grid point strictly after `after`
    pub fn next_aligned(&self, after: Timestamp) -> Timestamp {
        let period = self.period.num_nanoseconds().unwrap_or(i64::MAX).max(1);
        let elapsed = (after - self.anchor).num_nanoseconds().unwrap_or(0);
        let remainder = elapsed.rem_euclid(period);
        after + TimeDelta::nanoseconds(period - remainder)
    }

    /// When the first tick fires for a task started at `start`
    pub fn first_fire(&self, start: Timestamp) -> Timestamp {
        match self.alignment {
            Alignment::FreeRunning => start,
            Alignment::Pile => self.next_aligned(start + self.min_tick),
        }
    }

    /// When the next tick fires after a tick that started at `fired` and
    /// returned at `finished`.
    pub fn next_fire(&self, fired: Timestamp, finished: Timestamp) -> Timestamp {
        let earliest = finished.max(fired + self.min_tick);
        if self.overran(fired, finished) {
            earliest
        } else {
            self.next_aligned(earliest)
        }
    }

    pub fn overran(&self, fired: Timestamp, finished: Timestamp) -> bool {
        finished - fired > self.period
    }

    pub fn offset(&self) -> TimeDelta {
        self.offset
    }
}

type Callback = Box<dyn FnMut() + Send + 'static>;

struct StopSignal {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Sleep up to `timeout`; returns true if stop was requested
    fn wait(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped && !timeout.is_zero() {
            self.cond.wait_for(&mut stopped, timeout);
        }
        *stopped
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.cond.notify_all();
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }
}

/// Runs heartbeat tasks, one thread each
pub struct HeartbeatScheduler {
    clock: Arc<dyn Clock>,
    min_tick: Duration,
    pending: Vec<(Heartbeat, Callback)>,
    handles: Vec<JoinHandle<()>>,
    stop: Arc<StopSignal>,
    started: bool,
}

impl HeartbeatScheduler {
    pub fn new(clock: Arc<dyn Clock>, min_tick: Duration) -> Self {
        Self {
            clock,
            min_tick,
            pending: Vec::new(),
            handles: Vec::new(),
            stop: Arc::new(StopSignal::new()),
            started: false,
        }
    }

    /// Register a task; it runs once `start` is called
    pub fn add<F>(&mut self, heartbeat: Heartbeat, callback: F) -> Result<(), HeartbeatError>
    where
        F: FnMut() + Send + 'static,
    {
        heartbeat.validate()?;
        if self.started {
            return Err(HeartbeatError::AlreadyStarted);
        }
        self.pending.push((heartbeat, Box::new(callback)));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.pending.len() + self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn one thread per registered task
    pub fn start(&mut self) -> Result<(), HeartbeatError> {
        if self.started {
            return Err(HeartbeatError::AlreadyStarted);
        }
        self.started = true;
        for (heartbeat, callback) in self.pending.drain(..) {
            info!(
                "Start heartbeat {} every {:?} ({:?}, offset {:?})",
                heartbeat.name, heartbeat.period, heartbeat.alignment, heartbeat.offset
            );
            let clock = Arc::clone(&self.clock);
            let stop = Arc::clone(&self.stop);
            let min_tick = self.min_tick;
            let handle = thread::Builder::new()
                .name(format!("heartbeat-{}", heartbeat.name))
                .spawn(move || run_task(heartbeat, callback, clock, stop, min_tick))
                .map_err(|e| HeartbeatError::Spawn(e.to_string()))?;
            self.handles.push(handle);
        }
        Ok(())
    }

    /// Stop every task and wait for their threads
    pub fn shutdown(&mut self) {
        self.stop.stop();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("Heartbeat thread panicked");
            }
        }
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn until(clock: &dyn Clock, at: Timestamp) -> Duration {
    (at - clock.now()).to_std().unwrap_or(Duration::ZERO)
}

fn run_task(
    heartbeat: Heartbeat,
    mut callback: Callback,
    clock: Arc<dyn Clock>,
    stop: Arc<StopSignal>,
    min_tick: Duration,
) {
    let start = clock.now();
    let schedule = Schedule::new(&heartbeat, min_tick, start);
    let mut next = schedule.first_fire(start);
    debug!("Heartbeat {} first tick at {}", heartbeat.name, next);

    loop {
        if stop.wait(until(clock.as_ref(), next)) {
            break;
        }
        // condvar may wake early; go back to sleep until the tick is due
        if clock.now() < next {
            continue;
        }

        let fired = clock.now();
        if catch_unwind(AssertUnwindSafe(&mut callback)).is_err() {
            error!("Heartbeat {} callback panicked", heartbeat.name);
        }
        let finished = clock.now();

        if schedule.overran(fired, finished) {
            warn!(
                "Heartbeat {} took {} ms, longer than its period {:?}",
                heartbeat.name,
                (finished - fired).num_milliseconds(),
                heartbeat.period
            );
        }
        next = schedule.next_fire(fired, finished);
        if stop.is_stopped() {
            break;
        }
    }
    debug!("Heartbeat {} stopped", heartbeat.name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemClock;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn at(h: u32, m: u32, s: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 3, h, m, s).unwrap()
    }

    fn pile_60s_offset_2s(start: Timestamp) -> Schedule {
        let hb = Heartbeat::every(Duration::from_secs(60))
            .pile()
            .offset(Duration::from_secs(2));
        Schedule::new(&hb, Duration::from_millis(500), start)
    }

    #[test]
    fn test_pile_first_fire_aligns_to_grid_plus_offset() {
        let start = at(10, 0, 5);
        let schedule = pile_60s_offset_2s(start);
        assert_eq!(schedule.first_fire(start), at(10, 1, 2));
    }

    #[test]
    fn test_pile_start_on_grid_waits_full_period() {
        let start = at(10, 0, 2);
        let schedule = pile_60s_offset_2s(start);
        assert_eq!(schedule.first_fire(start), at(10, 1, 2));
    }

    #[test]
    fn test_pile_min_tick_prevents_double_fire() {
        // start 300ms before a grid point: min tick pushes past it
        let start = at(10, 1, 1) + TimeDelta::milliseconds(700);
        let schedule = pile_60s_offset_2s(start);
        assert_eq!(schedule.first_fire(start), at(10, 2, 2));
    }

    #[test]
    fn test_pile_next_fire_stays_on_grid() {
        let schedule = pile_60s_offset_2s(at(10, 0, 5));
        let fired = at(10, 1, 2);
        let finished = fired + TimeDelta::milliseconds(1500);
        assert_eq!(schedule.next_fire(fired, finished), at(10, 2, 2));
    }

    #[test]
    fn test_overrun_proceeds_immediately() {
        let schedule = pile_60s_offset_2s(at(10, 0, 5));
        let fired = at(10, 1, 2);
        let finished = fired + TimeDelta::seconds(75);
        assert!(schedule.overran(fired, finished));
        // no catch-up burst: exactly one tick, right now
        assert_eq!(schedule.next_fire(fired, finished), finished);
    }

    #[test]
    fn test_free_running_fires_at_start_then_every_period() {
        let start = at(9, 15, 7);
        let hb = Heartbeat::every(Duration::from_secs(10));
        let schedule = Schedule::new(&hb, Duration::from_millis(500), start);
        assert_eq!(schedule.first_fire(start), start);
        let finished = start + TimeDelta::milliseconds(20);
        assert_eq!(schedule.next_fire(start, finished), at(9, 15, 17));
    }

    #[test]
    fn test_free_running_offset_shifts_grid() {
        let start = at(9, 15, 7);
        let hb = Heartbeat::every(Duration::from_secs(10)).offset(Duration::from_secs(3));
        let schedule = Schedule::new(&hb, Duration::ZERO, start);
        assert_eq!(schedule.offset(), TimeDelta::seconds(3));
        assert_eq!(schedule.next_fire(start, start), at(9, 15, 10));
    }

    #[test]
    fn test_zero_period_rejected() {
        let mut scheduler = HeartbeatScheduler::new(Arc::new(SystemClock::new()), Duration::ZERO);
        let result = scheduler.add(Heartbeat::every(Duration::ZERO), || {});
        assert!(matches!(result, Err(HeartbeatError::InvalidPeriod(_))));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_scheduler_runs_and_stops() {
        let _ = env_logger::builder().is_test(true).try_init();
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = HeartbeatScheduler::new(Arc::new(SystemClock::new()), Duration::ZERO);

        let c = Arc::clone(&counter);
        scheduler
            .add(
                Heartbeat::every(Duration::from_millis(20)).named("count"),
                move || {
                    c.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();
        scheduler.start().unwrap();
        assert!(matches!(scheduler.start(), Err(HeartbeatError::AlreadyStarted)));

        thread::sleep(Duration::from_millis(150));
        scheduler.shutdown();
        let ticks = counter.load(Ordering::SeqCst);
        assert!(ticks >= 3, "expected several ticks, got {}", ticks);

        thread::sleep(Duration::from_millis(60));
        assert_eq!(counter.load(Ordering::SeqCst), ticks);
    }

    #[test]
    fn test_panicking_callback_keeps_ticking() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut scheduler = HeartbeatScheduler::new(Arc::new(SystemClock::new()), Duration::ZERO);
        let c = Arc::clone(&counter);
        scheduler
            .add(Heartbeat::every(Duration::from_millis(15)), move || {
                c.fetch_add(1, Ordering::SeqCst);
                panic!("tick failed");
            })
            .unwrap();
        scheduler.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        drop(scheduler);
        assert!(counter.load(Ordering::SeqCst) >= 2);
    }
}
