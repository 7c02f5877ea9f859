//! Timer registry: one countdown entry per step address.
//!
//! Entries are keyed by `trackId:stepIndex`, created lazily on first
//! reference, and live until the session is torn down. A countdown keeps
//! running no matter which track the user is looking at.
//!
//! Advancement is timestamp-delta based: remaining time is always derived
//! from a frozen snapshot and the instant the entry was last resumed,
//! never by subtracting per tick. Sampling cadence therefore affects only
//! event latency, never accuracy.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::models::constants::FINAL_TICK_WINDOW_SECS;
use crate::session::events::TimerEvent;

/// Source of monotonic time for the registry.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time. The default for real sessions.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. Lets tests sample at exact
/// simulated instants instead of sleeping.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_micros: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_micros: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, delta: Duration) {
        self.offset_micros
            .fetch_add(delta.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_micros(self.offset_micros.load(Ordering::SeqCst))
    }
}

/// Internal countdown bookkeeping. `frozen_time_left` is the remaining
/// time at the instant of the last pause (or creation); while running,
/// the live value is `frozen_time_left - (now - resumed_at)` and may go
/// negative once the countdown has finished (overtime).
#[derive(Debug, Clone)]
struct TimerEntry {
    duration: u32,
    frozen_time_left: f64,
    resumed_at: Option<Instant>,
    done: bool,
    last_whole_second: Option<i64>,
}

impl TimerEntry {
    fn new(duration: u32) -> Self {
        Self {
            duration,
            frozen_time_left: duration as f64,
            resumed_at: None,
            done: false,
            last_whole_second: None,
        }
    }

    fn raw_time_left(&self, now: Instant) -> f64 {
        match self.resumed_at {
            Some(at) => self.frozen_time_left - now.saturating_duration_since(at).as_secs_f64(),
            None => self.frozen_time_left,
        }
    }
}

/// Read-side projection of one timer entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerSnapshot {
    pub duration: u32,
    /// Remaining seconds, clamped at zero.
    pub time_left: f64,
    /// Seconds elapsed past zero for a finished countdown.
    pub overtime: f64,
    pub running: bool,
    pub done: bool,
    pub not_started: bool,
    pub paused: bool,
}

impl TimerSnapshot {
    /// Whole seconds remaining, as a countdown display shows them.
    pub fn seconds_left(&self) -> u32 {
        self.time_left.ceil() as u32
    }

    pub fn overtime_seconds(&self) -> u32 {
        self.overtime.floor() as u32
    }
}

/// Registry of all countdown entries for one session.
pub struct TimerRegistry {
    clock: Arc<dyn Clock>,
    entries: BTreeMap<String, TimerEntry>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: BTreeMap::new(),
        }
    }

    /// Canonical timer address for a step.
    pub fn key(track_id: &str, step_index: usize) -> String {
        format!("{track_id}:{step_index}")
    }

    /// Ensure an entry exists and return its current projection. The
    /// duration supplied on first reference is canonical for the key;
    /// later calls never change it.
    pub fn get_or_create(&mut self, key: &str, duration: u32) -> TimerSnapshot {
        let now = self.clock.now();
        let entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| TimerEntry::new(duration));
        project(entry, now)
    }

    /// Projection for an existing entry, without creating one.
    pub fn snapshot(&self, key: &str) -> Option<TimerSnapshot> {
        let now = self.clock.now();
        self.entries.get(key).map(|e| project(e, now))
    }

    /// Projections of every entry, computed from a single captured "now"
    /// so timers read in the same frame never disagree.
    pub fn snapshot_all(&self) -> Vec<(String, TimerSnapshot)> {
        let now = self.clock.now();
        self.entries
            .iter()
            .map(|(key, e)| (key.clone(), project(e, now)))
            .collect()
    }

    /// Transition an entry to running. No-op when the entry is unknown,
    /// already running, or already done.
    pub fn start(&mut self, key: &str) {
        let now = self.clock.now();
        if let Some(e) = self.entries.get_mut(key) {
            if e.done || e.resumed_at.is_some() {
                return;
            }
            e.resumed_at = Some(now);
            debug!(key, time_left = e.frozen_time_left, "timer started");
        }
    }

    /// Same transition as `start`; reads better after a pause.
    pub fn resume(&mut self, key: &str) {
        self.start(key);
    }

    /// Commit elapsed time and stop advancing. No-op when not running.
    pub fn pause(&mut self, key: &str) {
        let now = self.clock.now();
        if let Some(e) = self.entries.get_mut(key) {
            let Some(at) = e.resumed_at else { return };
            if e.done {
                return;
            }
            e.frozen_time_left -= now.saturating_duration_since(at).as_secs_f64();
            e.resumed_at = None;
            debug!(key, time_left = e.frozen_time_left, "timer paused");
        }
    }

    /// User-confirmed skip: finish the countdown at exactly zero. A
    /// skipped timer fires no finished event and accrues no overtime.
    /// No-op on unknown or already-done entries.
    pub fn force_complete(&mut self, key: &str) {
        if let Some(e) = self.entries.get_mut(key) {
            if e.done {
                return;
            }
            e.frozen_time_left = 0.0;
            e.resumed_at = None;
            e.done = true;
            debug!(key, "timer force-completed");
        }
    }

    /// Recompute every running entry from one captured "now", committing
    /// completions and returning edge-triggered events. Cost is
    /// proportional to running entries; a registry with none is free to
    /// stop being sampled.
    pub fn sample(&mut self) -> Vec<TimerEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();

        for (key, e) in self.entries.iter_mut() {
            if e.done || e.resumed_at.is_none() {
                continue;
            }
            let raw = e.raw_time_left(now);

            if raw <= 0.0 {
                // `resumed_at` is kept so overtime keeps projecting.
                e.done = true;
                debug!(key = %key, "timer finished");
                events.push(TimerEvent::Finished { key: key.clone() });
                continue;
            }

            let whole = raw.ceil() as i64;
            let crossed = match e.last_whole_second {
                None => true,
                Some(prev) => whole < prev,
            };
            if crossed && whole <= FINAL_TICK_WINDOW_SECS as i64 {
                events.push(TimerEvent::FinalTick {
                    key: key.clone(),
                    seconds_left: whole as u32,
                });
            }
            e.last_whole_second = Some(whole);
        }

        events
    }

    /// True while any entry still needs sampling.
    pub fn any_running(&self) -> bool {
        self.entries
            .values()
            .any(|e| e.resumed_at.is_some() && !e.done)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry. Session restart only.
    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn project(e: &TimerEntry, now: Instant) -> TimerSnapshot {
    let raw = e.raw_time_left(now);
    let running = e.resumed_at.is_some() && !e.done;
    let not_started = !e.done && e.resumed_at.is_none() && e.frozen_time_left >= e.duration as f64;

    TimerSnapshot {
        duration: e.duration,
        time_left: raw.max(0.0),
        overtime: if e.done { (-raw).max(0.0) } else { 0.0 },
        running,
        done: e.done,
        not_started,
        paused: !e.done && e.resumed_at.is_none() && !not_started,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn registry() -> (Arc<ManualClock>, TimerRegistry) {
        let clock = Arc::new(ManualClock::new());
        let registry = TimerRegistry::with_clock(clock.clone());
        (clock, registry)
    }

    #[test]
    fn test_new_entry_is_not_started() {
        let (_clock, mut reg) = registry();
        let snap = reg.get_or_create("s0-main:1", 60);

        assert_eq!(snap.duration, 60);
        assert!((snap.time_left - 60.0).abs() < EPS);
        assert!(snap.not_started);
        assert!(!snap.running);
        assert!(!snap.paused);
        assert!(!snap.done);
    }

    #[test]
    fn test_get_or_create_keeps_first_duration() {
        let (_clock, mut reg) = registry();
        reg.get_or_create("s0-main:1", 60);
        let snap = reg.get_or_create("s0-main:1", 999);
        assert_eq!(snap.duration, 60);
    }

    #[test]
    fn test_time_left_is_sample_count_independent() {
        let (clock, mut reg) = registry();
        reg.get_or_create("s0-main:1", 60);
        reg.start("s0-main:1");

        // Irregular cadence: many tiny samples plus one large gap.
        for _ in 0..7 {
            clock.advance(Duration::from_millis(330));
            reg.sample();
        }
        clock.advance(Duration::from_millis(11_190));
        reg.sample();

        // 7 * 0.33 + 11.19 = 13.5 seconds elapsed, regardless of cadence.
        let snap = reg.snapshot("s0-main:1").expect("entry exists");
        assert!((snap.time_left - 46.5).abs() < EPS);
        assert!(snap.running);
    }

    #[test]
    fn test_pause_resume_additivity() {
        let (clock, mut reg) = registry();
        reg.get_or_create("s0-main:0", 120);
        reg.start("s0-main:0");

        clock.advance(Duration::from_millis(30_250));
        reg.pause("s0-main:0");

        let paused = reg.snapshot("s0-main:0").expect("entry exists");
        assert!(paused.paused);
        assert!((paused.time_left - 89.75).abs() < EPS);

        // Idle time while paused must not count.
        clock.advance(Duration::from_secs(999));
        reg.resume("s0-main:0");
        clock.advance(Duration::from_millis(10_500));

        let snap = reg.snapshot("s0-main:0").expect("entry exists");
        assert!((snap.time_left - 79.25).abs() < EPS);
    }

    #[test]
    fn test_finished_event_fires_exactly_once() {
        let (clock, mut reg) = registry();
        reg.get_or_create("s0-main:2", 3);
        reg.start("s0-main:2");

        clock.advance(Duration::from_millis(2_900));
        let before = reg.sample();
        assert!(!before
            .iter()
            .any(|e| matches!(e, TimerEvent::Finished { .. })));

        clock.advance(Duration::from_millis(200));
        let at_zero = reg.sample();
        assert_eq!(
            at_zero
                .iter()
                .filter(|e| matches!(e, TimerEvent::Finished { .. }))
                .count(),
            1
        );

        clock.advance(Duration::from_secs(5));
        let after = reg.sample();
        assert!(after.is_empty());
    }

    #[test]
    fn test_overtime_keeps_growing_after_done() {
        let (clock, mut reg) = registry();
        reg.get_or_create("s0-main:2", 3);
        reg.start("s0-main:2");

        clock.advance(Duration::from_secs(3));
        reg.sample();

        clock.advance(Duration::from_secs(2));
        let snap = reg.snapshot("s0-main:2").expect("entry exists");
        assert!(snap.done);
        assert!(!snap.running);
        assert!((snap.time_left).abs() < EPS);
        assert!((snap.overtime - 2.0).abs() < EPS);

        clock.advance(Duration::from_secs(3));
        let later = reg.snapshot("s0-main:2").expect("entry exists");
        assert!((later.overtime - 5.0).abs() < EPS);
    }

    #[test]
    fn test_final_ticks_are_edge_triggered() {
        let (clock, mut reg) = registry();
        reg.get_or_create("s0-main:3", 12);
        reg.start("s0-main:3");

        // 11.5 left: outside the window, no tick.
        clock.advance(Duration::from_millis(500));
        assert!(reg.sample().is_empty());

        // 9.9 left: first boundary inside the window.
        clock.advance(Duration::from_millis(1_600));
        let events = reg.sample();
        assert_eq!(
            events,
            vec![TimerEvent::FinalTick {
                key: "s0-main:3".to_string(),
                seconds_left: 10
            }]
        );

        // Same whole second: no duplicate.
        clock.advance(Duration::from_millis(100));
        assert!(reg.sample().is_empty());

        // 8.8 left: next boundary.
        clock.advance(Duration::from_millis(1_000));
        let events = reg.sample();
        assert_eq!(
            events,
            vec![TimerEvent::FinalTick {
                key: "s0-main:3".to_string(),
                seconds_left: 9
            }]
        );
    }

    #[test]
    fn test_force_complete_freezes_at_zero() {
        let (clock, mut reg) = registry();
        reg.get_or_create("s0-sauce:1", 600);
        reg.start("s0-sauce:1");
        clock.advance(Duration::from_secs(10));

        reg.force_complete("s0-sauce:1");
        clock.advance(Duration::from_secs(60));

        let snap = reg.snapshot("s0-sauce:1").expect("entry exists");
        assert!(snap.done);
        assert!((snap.time_left).abs() < EPS);
        assert!((snap.overtime).abs() < EPS);

        // No finished event for a skip.
        assert!(reg.sample().is_empty());
    }

    #[test]
    fn test_lifecycle_ops_are_idempotent() {
        let (clock, mut reg) = registry();
        reg.get_or_create("s0-main:0", 30);

        // Pause before start: nothing happens.
        reg.pause("s0-main:0");
        assert!(reg.snapshot("s0-main:0").expect("entry exists").not_started);

        reg.start("s0-main:0");
        clock.advance(Duration::from_secs(5));
        // Double start: must not reset the running baseline.
        reg.start("s0-main:0");
        clock.advance(Duration::from_secs(5));

        let snap = reg.snapshot("s0-main:0").expect("entry exists");
        assert!((snap.time_left - 20.0).abs() < EPS);

        reg.force_complete("s0-main:0");
        reg.force_complete("s0-main:0");
        reg.start("s0-main:0");
        let done = reg.snapshot("s0-main:0").expect("entry exists");
        assert!(done.done);
        assert!(!done.running);
    }

    #[test]
    fn test_unknown_key_ops_are_noops() {
        let (_clock, mut reg) = registry();
        reg.start("nope:0");
        reg.pause("nope:0");
        reg.force_complete("nope:0");
        assert!(reg.is_empty());
        assert!(reg.snapshot("nope:0").is_none());
    }

    #[test]
    fn test_any_running_reflects_active_entries() {
        let (clock, mut reg) = registry();
        assert!(!reg.any_running());

        reg.get_or_create("s0-main:1", 2);
        assert!(!reg.any_running());

        reg.start("s0-main:1");
        assert!(reg.any_running());

        clock.advance(Duration::from_secs(3));
        reg.sample();
        assert!(!reg.any_running());
    }

    #[test]
    fn test_snapshot_all_uses_one_now() {
        let (clock, mut reg) = registry();
        reg.get_or_create("s0-a:0", 50);
        reg.get_or_create("s0-b:0", 50);
        reg.start("s0-a:0");
        reg.start("s0-b:0");
        clock.advance(Duration::from_millis(12_345));

        let all = reg.snapshot_all();
        assert_eq!(all.len(), 2);
        assert!((all[0].1.time_left - all[1].1.time_left).abs() < EPS);
    }
}
