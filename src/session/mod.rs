//! Cooking session engine.
//!
//! The session owns canonical progress: which phase the user is in, how
//! many steps each track has completed, which track holds focus, and
//! which parallel track is waiting to be picked up. Countdown state lives
//! in the [`timers::TimerRegistry`]; browsing state in
//! [`review::ReviewCursor`]. Mutation flows exclusively through the
//! operations here; everything else is a read-only projection.

pub mod events;
pub mod review;
pub mod timers;
pub mod toast;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::constants::DEFAULT_SAMPLE_INTERVAL;
use crate::models::Recipe;
use events::TimerEvent;
use review::{ReviewCursor, ViewMode, ViewPosition};
use timers::{Clock, TimerRegistry};

/// Where the user is in the session lifecycle.
///
/// `Intro → StageTransition ⇄ Cooking`, terminating at `Done` after the
/// last stage's last track completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Intro,
    StageTransition,
    Cooking,
    Done,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Intro => write!(f, "Intro"),
            Phase::StageTransition => write!(f, "StageTransition"),
            Phase::Cooking => write!(f, "Cooking"),
            Phase::Done => write!(f, "Done"),
        }
    }
}

/// Driver-facing knobs. The engine has no background loop of its own;
/// the host samples the registry at `sample_interval` while timers run.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub sample_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

/// A guided run through one recipe.
pub struct CookingSession {
    id: String,
    recipe: Recipe,
    phase: Phase,
    current_stage: usize,
    transition_target: usize,
    /// Steps completed per track; also the index of the current step.
    track_steps: BTreeMap<String, usize>,
    /// Tracks explicitly reached: primaries at stage init, parallel
    /// tracks once triggered. A parallel track at cursor 0 outside this
    /// set is pending, not begun.
    started_tracks: BTreeSet<String>,
    active_track: Option<String>,
    /// At most one triggered parallel track awaiting user focus.
    pending_track_start: Option<String>,
    timers: TimerRegistry,
    review: ReviewCursor,
    created_at: DateTime<Utc>,
}

impl CookingSession {
    pub fn new(recipe: Recipe) -> Self {
        Self::with_registry(recipe, TimerRegistry::new())
    }

    /// Build against an injected clock; tests drive simulated time.
    pub fn with_clock(recipe: Recipe, clock: Arc<dyn Clock>) -> Self {
        Self::with_registry(recipe, TimerRegistry::with_clock(clock))
    }

    fn with_registry(recipe: Recipe, timers: TimerRegistry) -> Self {
        Self {
            id: Self::generate_id(),
            recipe,
            phase: Phase::Intro,
            current_stage: 0,
            transition_target: 0,
            track_steps: BTreeMap::new(),
            started_tracks: BTreeSet::new(),
            active_track: None,
            pending_track_start: None,
            timers,
            review: ReviewCursor::new(),
            created_at: Utc::now(),
        }
    }

    fn generate_id() -> String {
        let timestamp = Utc::now().timestamp();
        let uuid_short = uuid::Uuid::new_v4()
            .to_string()
            .split('-')
            .next()
            .unwrap_or("")
            .to_string();
        format!("cook-{uuid_short}-{timestamp}")
    }

    /* ── Projections ─────────────────────────────────────────────────── */

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_stage_index(&self) -> usize {
        self.current_stage
    }

    /// Stage the next `continue_to_stage` call will enter.
    pub fn transition_target(&self) -> usize {
        self.transition_target
    }

    pub fn track_steps(&self) -> &BTreeMap<String, usize> {
        &self.track_steps
    }

    /// Steps completed in a track; 0 for tracks not yet initialized.
    pub fn cursor(&self, track_id: &str) -> usize {
        self.track_steps.get(track_id).copied().unwrap_or(0)
    }

    pub fn active_track(&self) -> Option<&str> {
        self.active_track.as_deref()
    }

    pub fn started_tracks(&self) -> &BTreeSet<String> {
        &self.started_tracks
    }

    pub fn pending_track_start(&self) -> Option<&str> {
        self.pending_track_start.as_deref()
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut TimerRegistry {
        &mut self.timers
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /* ── Lifecycle operations ────────────────────────────────────────── */

    /// Leave the intro for the first stage-transition screen.
    pub fn start_session(&mut self) {
        if self.phase != Phase::Intro {
            return;
        }
        self.transition_target = 0;
        self.phase = Phase::StageTransition;
        debug!(session = %self.id, "session started");
    }

    /// Enter the stage the transition screen points at: cursors to zero,
    /// primaries marked started, focus on the primary track.
    pub fn continue_to_stage(&mut self) {
        if self.phase != Phase::StageTransition {
            return;
        }
        let target = self.transition_target;
        let Some(stage) = self.recipe.stage(target) else {
            return;
        };

        let track_ids: Vec<(String, bool)> = stage
            .tracks
            .iter()
            .map(|t| (t.id.clone(), t.parallel))
            .collect();
        let primary = stage.primary_track().map(|t| t.id.clone());

        for (id, parallel) in &track_ids {
            self.track_steps.insert(id.clone(), 0);
            self.started_tracks.remove(id);
            if !*parallel {
                self.started_tracks.insert(id.clone());
            }
        }
        if let Some(primary) = &primary {
            // Covers the degenerate all-parallel stage: the focused
            // fallback track counts as begun.
            self.started_tracks.insert(primary.clone());
        }

        self.active_track = primary;
        self.pending_track_start = None;
        self.current_stage = target;
        self.phase = Phase::Cooking;
        self.review.clear();
        debug!(session = %self.id, stage = target, "stage entered");
    }

    /// Complete the current step of a track. The core transition: fires
    /// the step's parallel-track trigger, advances the cursor, finishes
    /// tracks and stages, and auto-starts background timer steps.
    pub fn advance_step(&mut self, track_id: &str) {
        if self.phase != Phase::Cooking {
            return;
        }

        let cursor = self.cursor(track_id);
        let Some((starts_track, track_len, next_background)) = ({
            let stage = self.recipe.stage(self.current_stage);
            stage.and_then(|s| s.track(track_id)).and_then(|track| {
                track.step(cursor).map(|step| {
                    let next_bg = track
                        .step(cursor + 1)
                        .filter(|s| s.is_background_timer())
                        .and_then(|s| s.timer_duration);
                    (step.starts_track.clone(), track.len(), next_bg)
                })
            })
        }) else {
            // Unknown track, track from another stage, or no current
            // step: stale UI state, decline to change anything.
            return;
        };

        // Trigger the parallel track first, before any completion
        // consequences of this advance are evaluated.
        if let Some(target) = starts_track {
            self.started_tracks.insert(target.clone());
            self.pending_track_start = Some(target.clone());
            debug!(session = %self.id, track = %target, "parallel track triggered");
        }

        let mut new_cursor = cursor + 1;
        self.track_steps.insert(track_id.to_string(), new_cursor);
        debug!(session = %self.id, track = %track_id, cursor = new_cursor, "step advanced");

        if new_cursor >= track_len {
            self.evaluate_stage_completion();
        } else if let Some(duration) = next_background {
            // The new current step runs unattended: start its countdown,
            // pass the cursor over it, and hand focus back to the
            // primary line of work.
            let key = TimerRegistry::key(track_id, new_cursor);
            self.timers.get_or_create(&key, duration);
            self.timers.start(&key);
            debug!(session = %self.id, key = %key, "background timer auto-started");

            new_cursor += 1;
            self.track_steps.insert(track_id.to_string(), new_cursor);

            if new_cursor >= track_len {
                self.evaluate_stage_completion();
            } else {
                self.refocus_primary(track_id);
            }
        }

        self.review.on_canonical_change(self.current_stage);
    }

    /// Give focus to a track in the current stage; clears the pending
    /// trigger when the user follows it.
    pub fn switch_active_track(&mut self, track_id: &str) {
        if self.phase != Phase::Cooking {
            return;
        }
        let known = self
            .recipe
            .stage(self.current_stage)
            .is_some_and(|s| s.track(track_id).is_some());
        if !known {
            return;
        }
        self.active_track = Some(track_id.to_string());
        if self.pending_track_start.as_deref() == Some(track_id) {
            self.pending_track_start = None;
        }
        self.review.on_canonical_change(self.current_stage);
        debug!(session = %self.id, track = %track_id, "active track switched");
    }

    /// Back to the intro, discarding all progress and timers.
    pub fn restart(&mut self) {
        self.phase = Phase::Intro;
        self.current_stage = 0;
        self.transition_target = 0;
        self.track_steps.clear();
        self.started_tracks.clear();
        self.active_track = None;
        self.pending_track_start = None;
        self.timers.reset();
        self.review.clear();
        debug!(session = %self.id, "session restarted");
    }

    /// Sample the registry: recompute running countdowns and surface
    /// their events.
    pub fn sample(&mut self) -> Vec<TimerEvent> {
        self.timers.sample()
    }

    /* ── Navigation (view cursor) ────────────────────────────────────── */

    /// The canonical step position, clamped to the last step for a
    /// finished track. `None` outside cooking.
    pub fn canonical_position(&self) -> Option<ViewPosition> {
        if self.phase != Phase::Cooking {
            return None;
        }
        let track_id = self.active_track.clone()?;
        let (stage_index, track) = self.recipe.find_track(&track_id)?;
        if track.is_empty() {
            return None;
        }
        Some(ViewPosition {
            stage: stage_index,
            track_id,
            step: self.cursor(&track.id).min(track.len() - 1),
        })
    }

    /// Step the user is looking at: the review position while browsing,
    /// canonical otherwise.
    pub fn view_position(&self) -> Option<ViewPosition> {
        self.review
            .position()
            .cloned()
            .or_else(|| self.canonical_position())
    }

    pub fn view_mode(&self) -> ViewMode {
        let Some(position) = self.review.position() else {
            return ViewMode::Current;
        };
        review::derive_mode(
            position,
            self.canonical_position().as_ref(),
            self.cursor(&position.track_id),
            self.current_stage,
        )
    }

    /// Timer address of the step centered in the view, if that step is a
    /// real step.
    pub fn view_timer_key(&self) -> Option<String> {
        let position = self.view_position()?;
        Some(TimerRegistry::key(&position.track_id, position.step))
    }

    pub fn is_reviewing(&self) -> bool {
        self.review.is_reviewing()
    }

    /// Browse one step backward, crossing stage boundaries.
    pub fn step_back(&mut self) {
        if self.phase != Phase::Cooking {
            return;
        }
        let Some(from) = self.view_position() else {
            return;
        };
        if let Some(position) = review::step_back(&self.recipe, &from) {
            self.review.set(position, self.canonical_position().as_ref());
        }
    }

    /// Browse one step forward, crossing stage boundaries.
    pub fn step_forward(&mut self) {
        if self.phase != Phase::Cooking {
            return;
        }
        let Some(from) = self.view_position() else {
            return;
        };
        if let Some(position) = review::step_forward(&self.recipe, &from) {
            self.review.set(position, self.canonical_position().as_ref());
        }
    }

    /// Redirect the view to another stage's primary track.
    pub fn enter_stage_review(&mut self, stage_index: usize, at_step: Option<usize>) {
        if self.phase != Phase::Cooking {
            return;
        }
        if stage_index == self.current_stage && at_step.is_none() {
            self.review.clear();
            return;
        }
        if let Some(position) =
            review::stage_entry(&self.recipe, stage_index, self.current_stage, at_step)
        {
            self.review.set(position, self.canonical_position().as_ref());
        }
    }

    /// Snap the view back to the canonical step.
    pub fn return_to_current(&mut self) {
        self.review.clear();
    }

    /* ── Internals ───────────────────────────────────────────────────── */

    /// A track just finished (or was auto-passed to its end): either the
    /// whole stage is done and we transition, or focus moves to the
    /// first unfinished track in stage order.
    fn evaluate_stage_completion(&mut self) {
        let (all_done, next_unfinished) = {
            let Some(stage) = self.recipe.stage(self.current_stage) else {
                return;
            };
            let all_done = stage
                .tracks
                .iter()
                .all(|t| t.is_finished(self.cursor(&t.id)));
            let next = stage
                .tracks
                .iter()
                .find(|t| !t.is_finished(self.cursor(&t.id)))
                .map(|t| t.id.clone());
            (all_done, next)
        };

        if all_done {
            self.transition_to_next_stage();
        } else if let Some(next) = next_unfinished {
            debug!(session = %self.id, track = %next, "focus moved to unfinished track");
            self.active_track = Some(next);
        }
    }

    fn transition_to_next_stage(&mut self) {
        let next = self.current_stage + 1;
        if next >= self.recipe.stages.len() {
            self.phase = Phase::Done;
            debug!(session = %self.id, "session done");
        } else {
            self.transition_target = next;
            self.phase = Phase::StageTransition;
            debug!(session = %self.id, stage = next, "stage complete");
        }
        self.review.clear();
    }

    /// After a background auto-start on a side track, attention returns
    /// to the stage's primary track if it still has work.
    fn refocus_primary(&mut self, advanced_track: &str) {
        let primary = {
            let Some(stage) = self.recipe.stage(self.current_stage) else {
                return;
            };
            stage
                .primary_track()
                .filter(|t| t.id != advanced_track && !t.is_finished(self.cursor(&t.id)))
                .map(|t| t.id.clone())
        };
        if let Some(primary) = primary {
            self.active_track = Some(primary);
        }
    }
}
