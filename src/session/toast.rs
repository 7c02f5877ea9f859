//! Toast aggregation: which countdowns deserve side-channel display.
//!
//! Derived on every render from the registry and the view state, never
//! stored. A timer earns a toast when it is running or finished but not
//! the step centered in the main view: timers on other tracks always
//! surface, and the canonical step's own timer surfaces the moment the
//! user browses away from it.

use crate::session::timers::TimerSnapshot;
use crate::session::CookingSession;

/// One side-channel timer line.
#[derive(Debug, Clone, PartialEq)]
pub struct Toast {
    pub key: String,
    pub track_id: String,
    pub step_index: usize,
    pub timer: TimerSnapshot,
}

/// Timers to surface beside the main view, in stable key order.
pub fn toast_timers(session: &CookingSession) -> Vec<Toast> {
    let centered = session.view_timer_key();

    session
        .timers()
        .snapshot_all()
        .into_iter()
        .filter_map(|(key, timer)| {
            if !(timer.running || timer.done) {
                return None;
            }
            if centered.as_deref() == Some(key.as_str()) {
                return None;
            }
            let (track_id, step_index) = split_key(&key)?;
            // A finished timer whose step the cursor has already passed
            // was consumed in the foreground; nothing left to surface.
            if timer.done && step_index < session.cursor(track_id) {
                return None;
            }
            Some(Toast {
                key: key.clone(),
                track_id: track_id.to_string(),
                step_index,
                timer,
            })
        })
        .collect()
}

fn split_key(key: &str) -> Option<(&str, usize)> {
    let (track_id, step) = key.rsplit_once(':')?;
    step.parse().ok().map(|index| (track_id, index))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::hydrate;
    use crate::session::timers::ManualClock;
    use crate::session::CookingSession;

    fn session() -> (Arc<ManualClock>, CookingSession) {
        let recipe = hydrate::from_yaml_str(
            r#"
title: Toast Test
servings: 2
total_time: 20 min
stages:
  - type: cooking
    label: Cook
    tracks:
      - label: Main
        steps:
          - instruction: Start things
            on_complete:
              start_track: Sauce
          - instruction: Simmer
            timer_duration: 300
          - instruction: Plate up
      - label: Sauce
        parallel: true
        steps:
          - instruction: Reduce
            timer_duration: 120
          - instruction: Season
"#,
        )
        .expect("test recipe hydrates");

        let clock = Arc::new(ManualClock::new());
        let mut session = CookingSession::with_clock(recipe, clock.clone());
        session.start_session();
        session.continue_to_stage();
        (clock, session)
    }

    #[test]
    fn test_no_toasts_without_running_timers() {
        let (_clock, mut session) = session();
        session.advance_step("s0-main");
        // The current step's timer exists but has not been started.
        session.timers_mut().get_or_create("s0-main:1", 300);
        assert!(toast_timers(&session).is_empty());
    }

    #[test]
    fn test_other_track_timer_is_toasted() {
        let (_clock, mut session) = session();
        session.advance_step("s0-main");

        // Sauce timer runs while focus is on Main.
        session.timers_mut().get_or_create("s0-sauce:0", 120);
        session.timers_mut().start("s0-sauce:0");

        let toasts = toast_timers(&session);
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].track_id, "s0-sauce");
        assert_eq!(toasts[0].step_index, 0);
        assert!(toasts[0].timer.running);
    }

    #[test]
    fn test_centered_timer_is_not_toasted() {
        let (_clock, mut session) = session();
        session.advance_step("s0-main");

        // The timer of the step in view stays out of the tray.
        session.timers_mut().get_or_create("s0-main:1", 300);
        session.timers_mut().start("s0-main:1");
        assert!(toast_timers(&session).is_empty());
    }

    #[test]
    fn test_canonical_timer_toasts_while_reviewing() {
        let (_clock, mut session) = session();
        session.advance_step("s0-main");
        session.timers_mut().get_or_create("s0-main:1", 300);
        session.timers_mut().start("s0-main:1");

        // Scrolling back to read an earlier instruction must keep the
        // running timer visible.
        session.step_back();
        let toasts = toast_timers(&session);
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].key, "s0-main:1");

        session.return_to_current();
        assert!(toast_timers(&session).is_empty());
    }

    #[test]
    fn test_finished_unconsumed_timer_is_toasted() {
        let (clock, mut session) = session();
        session.advance_step("s0-main");
        session.switch_active_track("s0-sauce");
        session.timers_mut().get_or_create("s0-sauce:0", 120);
        session.timers_mut().start("s0-sauce:0");
        session.switch_active_track("s0-main");

        clock.advance(Duration::from_secs(121));
        session.sample();

        // Done but still the sauce track's current step: surfaced.
        let toasts = toast_timers(&session);
        assert_eq!(toasts.len(), 1);
        assert!(toasts[0].timer.done);

        // Consuming the step in the foreground retires the toast.
        session.switch_active_track("s0-sauce");
        session.advance_step("s0-sauce");
        session.switch_active_track("s0-main");
        assert!(toast_timers(&session).is_empty());
    }
}
