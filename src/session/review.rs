//! Review navigation: an ephemeral view cursor over the canonical cursors.
//!
//! Browsing past or future steps must never disturb completion logic, so
//! the view is a separate, resettable position that only ever reads the
//! recipe graph. While the user is not reviewing, the view mirrors the
//! canonical position; canonical movement snaps it back unless the user
//! has parked on a different stage.

use crate::models::Recipe;

/// A position the user is looking at, independent of canonical progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewPosition {
    pub stage: usize,
    pub track_id: String,
    pub step: usize,
}

/// Where the view sits relative to canonical progress. Derived, never
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    /// View equals the canonical current step.
    Current,
    /// Looking at an already-completed step or a past stage.
    Review,
    /// Looking ahead at a step or stage not yet reached.
    Preview,
}

/// The stored half of the navigation layer: `None` means "mirror the
/// canonical position".
#[derive(Debug, Default)]
pub struct ReviewCursor {
    position: Option<ViewPosition>,
}

impl ReviewCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Option<&ViewPosition> {
        self.position.as_ref()
    }

    pub fn is_reviewing(&self) -> bool {
        self.position.is_some()
    }

    /// Park the view somewhere. A position equal to canonical collapses
    /// back to mirroring, so stepping back and forward again leaves no
    /// review state behind.
    pub fn set(&mut self, position: ViewPosition, canonical: Option<&ViewPosition>) {
        if canonical == Some(&position) {
            self.position = None;
        } else {
            self.position = Some(position);
        }
    }

    pub fn clear(&mut self) {
        self.position = None;
    }

    /// Canonical position moved. Snap back unless the user is reviewing
    /// a different stage.
    pub fn on_canonical_change(&mut self, current_stage: usize) {
        if let Some(pos) = &self.position {
            if pos.stage == current_stage {
                self.position = None;
            }
        }
    }
}

/// One step backward from `from`, crossing into the previous stage's
/// primary track (at its last step) at a boundary. `None` when already at
/// the first reviewable step.
pub fn step_back(recipe: &Recipe, from: &ViewPosition) -> Option<ViewPosition> {
    if from.step > 0 {
        return Some(ViewPosition {
            stage: from.stage,
            track_id: from.track_id.clone(),
            step: from.step - 1,
        });
    }
    let prev_index = from.stage.checked_sub(1)?;
    let track = recipe.stage(prev_index)?.primary_track()?;
    if track.is_empty() {
        return None;
    }
    Some(ViewPosition {
        stage: prev_index,
        track_id: track.id.clone(),
        step: track.len() - 1,
    })
}

/// One step forward from `from`, crossing into the next stage's primary
/// track (at its first step) at a boundary. `None` at the recipe's end.
pub fn step_forward(recipe: &Recipe, from: &ViewPosition) -> Option<ViewPosition> {
    let track = recipe.stage(from.stage)?.track(&from.track_id)?;
    if from.step + 1 < track.len() {
        return Some(ViewPosition {
            stage: from.stage,
            track_id: from.track_id.clone(),
            step: from.step + 1,
        });
    }
    let next_index = from.stage + 1;
    let next = recipe.stage(next_index)?.primary_track()?;
    if next.is_empty() {
        return None;
    }
    Some(ViewPosition {
        stage: next_index,
        track_id: next.id.clone(),
        step: 0,
    })
}

/// Landing position for reviewing a whole other stage: the last step of
/// a past stage's primary track, the first step of a future one, with an
/// explicit `at_step` clamped into range when given.
pub fn stage_entry(
    recipe: &Recipe,
    stage_index: usize,
    current_stage: usize,
    at_step: Option<usize>,
) -> Option<ViewPosition> {
    let track = recipe.stage(stage_index)?.primary_track()?;
    if track.is_empty() {
        return None;
    }
    let step = match at_step {
        Some(s) => s.min(track.len() - 1),
        None if stage_index < current_stage => track.len() - 1,
        None => 0,
    };
    Some(ViewPosition {
        stage: stage_index,
        track_id: track.id.clone(),
        step,
    })
}

/// Classify a view position against canonical progress.
pub fn derive_mode(
    position: &ViewPosition,
    canonical: Option<&ViewPosition>,
    viewed_track_cursor: usize,
    current_stage: usize,
) -> ViewMode {
    if canonical == Some(position) {
        return ViewMode::Current;
    }
    if position.stage < current_stage {
        return ViewMode::Review;
    }
    if position.stage > current_stage {
        return ViewMode::Preview;
    }
    if position.step < viewed_track_cursor {
        ViewMode::Review
    } else {
        ViewMode::Preview
    }
}
