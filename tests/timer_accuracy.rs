//! Integration tests for countdown accuracy under simulated time.

use std::sync::Arc;
use std::time::Duration;

use sous::session::events::TimerEvent;
use sous::session::timers::{ManualClock, TimerRegistry};

const EPS: f64 = 1e-6;

fn registry() -> (Arc<ManualClock>, TimerRegistry) {
    let clock = Arc::new(ManualClock::new());
    let registry = TimerRegistry::with_clock(clock.clone());
    (clock, registry)
}

#[test]
fn test_remaining_time_is_independent_of_sampling_cadence() {
    let (clock, mut reg) = registry();
    reg.get_or_create("s0-main:3", 540);
    reg.start("s0-main:3");

    // Wildly irregular sampling: bursts, gaps, and a long stall, the way
    // a throttled or sleeping display would drive it.
    let gaps_ms = [16, 16, 16, 5_000, 250, 250, 120_000, 40, 3, 60_000, 412];
    let mut elapsed_ms: u64 = 0;
    for gap in gaps_ms {
        clock.advance(Duration::from_millis(gap));
        elapsed_ms += gap;
        reg.sample();
    }

    let snap = reg.snapshot("s0-main:3").expect("Timer should exist");
    let expected = 540.0 - (elapsed_ms as f64 / 1000.0);
    assert!((snap.time_left - expected).abs() < EPS);
}

#[test]
fn test_pause_resume_additivity_across_idle_time() {
    let (clock, mut reg) = registry();
    reg.get_or_create("s0-main:0", 300);
    reg.start("s0-main:0");

    clock.advance(Duration::from_millis(61_500));
    reg.pause("s0-main:0");

    // However long the pause lasts, it contributes nothing.
    clock.advance(Duration::from_secs(3_600));
    reg.resume("s0-main:0");
    clock.advance(Duration::from_millis(8_250));

    let snap = reg.snapshot("s0-main:0").expect("Timer should exist");
    assert!((snap.time_left - (300.0 - 61.5 - 8.25)).abs() < EPS);
    assert!(snap.running);
    assert!(!snap.done);
}

#[test]
fn test_sixty_second_timer_boundary() {
    let (clock, mut reg) = registry();
    reg.get_or_create("s0-main:1", 60);
    reg.start("s0-main:1");

    clock.advance(Duration::from_secs(59));
    let events = reg.sample();
    assert!(!events
        .iter()
        .any(|e| matches!(e, TimerEvent::Finished { .. })));
    let snap = reg.snapshot("s0-main:1").expect("Timer should exist");
    assert!((snap.time_left - 1.0).abs() < EPS);
    assert!(!snap.done);

    clock.advance(Duration::from_secs(1));
    let events = reg.sample();
    let finished: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, TimerEvent::Finished { .. }))
        .collect();
    assert_eq!(finished.len(), 1);

    let snap = reg.snapshot("s0-main:1").expect("Timer should exist");
    assert!(snap.time_left.abs() < EPS);
    assert!(snap.done);

    // No second notification, ever.
    clock.advance(Duration::from_secs(30));
    assert!(reg.sample().is_empty());
}

#[test]
fn test_final_ten_seconds_tick_once_per_boundary() {
    let (clock, mut reg) = registry();
    reg.get_or_create("s0-main:2", 15);
    reg.start("s0-main:2");

    let mut ticks = Vec::new();
    let mut finished = 0;
    // Sample at 250 ms for the whole countdown.
    for _ in 0..60 {
        clock.advance(Duration::from_millis(250));
        for event in reg.sample() {
            match event {
                TimerEvent::FinalTick { seconds_left, .. } => ticks.push(seconds_left),
                TimerEvent::Finished { .. } => finished += 1,
            }
        }
    }

    assert_eq!(ticks, vec![10, 9, 8, 7, 6, 5, 4, 3, 2, 1]);
    assert_eq!(finished, 1);
}

#[test]
fn test_overtime_grows_when_reexamined() {
    let (clock, mut reg) = registry();
    reg.get_or_create("s0-sauce:1", 10);
    reg.start("s0-sauce:1");

    clock.advance(Duration::from_secs(10));
    reg.sample();

    // The user wanders off and comes back twice; overtime keeps counting.
    clock.advance(Duration::from_secs(90));
    let first = reg.snapshot("s0-sauce:1").expect("Timer should exist");
    assert!(first.done);
    assert!((first.overtime - 90.0).abs() < EPS);
    assert!(first.time_left.abs() < EPS);

    clock.advance(Duration::from_secs(30));
    let second = reg.snapshot("s0-sauce:1").expect("Timer should exist");
    assert!((second.overtime - 120.0).abs() < EPS);
}

#[test]
fn test_entries_share_one_now_per_sample() {
    let (clock, mut reg) = registry();
    for key in ["s0-a:0", "s0-b:0", "s0-c:0"] {
        reg.get_or_create(key, 100);
        reg.start(key);
    }
    clock.advance(Duration::from_millis(33_333));

    let all = reg.snapshot_all();
    assert_eq!(all.len(), 3);
    let first = all[0].1.time_left;
    for (_, snap) in &all {
        assert!((snap.time_left - first).abs() < EPS);
    }
}
