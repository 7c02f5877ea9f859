use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A short explanation attached to a term used in a step instruction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlossaryEntry {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual: Option<String>,
    pub text: String,
}

pub type Glossary = BTreeMap<String, GlossaryEntry>;

/// What the user must do to mark a step as done.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompletionType {
    /// User confirms the step themselves.
    Manual,
    /// A countdown must finish (or be skipped) before the step completes.
    Timer,
    /// Last step of the recipe; completing it ends the session.
    Final,
}

/// One instruction within a track, fully resolved by hydration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    pub instruction: String,
    pub completion: CompletionType,
    /// Timer duration in seconds. Only meaningful when `completion` is `Timer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// A background timer step counts down unattended while focus returns
    /// to the stage's primary track.
    #[serde(default)]
    pub background: bool,
    /// Resolved id of a parallel track that completing this step triggers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_track: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub glossary: Glossary,
}

impl Step {
    /// True for steps whose countdown runs unattended after being reached.
    pub fn is_background_timer(&self) -> bool {
        self.background && self.completion == CompletionType::Timer && self.timer_duration.is_some()
    }
}

/// An ordered run of steps within a stage. Identity is stable and unique
/// across the whole recipe, so timer keys never collide between stages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub label: String,
    pub color: String,
    /// Parallel tracks are not started at stage init; another step's
    /// `starts_track` triggers them.
    #[serde(default)]
    pub parallel: bool,
    pub steps: Vec<Step>,
}

impl Track {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&Step> {
        self.steps.get(index)
    }

    /// A track is finished once its cursor has passed every step.
    pub fn is_finished(&self, cursor: usize) -> bool {
        cursor >= self.steps.len()
    }
}

/// Classification of a stage. Display-only; the engine treats all stages
/// identically.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StageType {
    Preparation,
    Cooking,
}

impl std::fmt::Display for StageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageType::Preparation => write!(f, "Prep"),
            StageType::Cooking => write!(f, "Cook"),
        }
    }
}

/// A top-level phase of the recipe, holding one primary track and any
/// number of parallel tracks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stage {
    pub id: String,
    #[serde(rename = "type")]
    pub stage_type: StageType,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub tracks: Vec<Track>,
}

impl Stage {
    pub fn track(&self, track_id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    /// The stage's main line of work: the first non-parallel track, or the
    /// first track at all when every track is parallel.
    pub fn primary_track(&self) -> Option<&Track> {
        self.tracks
            .iter()
            .find(|t| !t.parallel)
            .or_else(|| self.tracks.first())
    }
}

/// An ingredient or piece of equipment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeItem {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A fully resolved recipe graph. Immutable for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipe {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub servings: u32,
    pub total_time: String,
    #[serde(default)]
    pub ingredients: Vec<RecipeItem>,
    #[serde(default)]
    pub equipment: Vec<RecipeItem>,
    pub stages: Vec<Stage>,
}

impl Recipe {
    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    /// Locate a track anywhere in the recipe, returning its stage index.
    pub fn find_track(&self, track_id: &str) -> Option<(usize, &Track)> {
        self.stages
            .iter()
            .enumerate()
            .find_map(|(i, s)| s.track(track_id).map(|t| (i, t)))
    }

    pub fn step_count(&self) -> usize {
        self.stages
            .iter()
            .flat_map(|s| &s.tracks)
            .map(|t| t.steps.len())
            .sum()
    }

    pub fn timer_count(&self) -> usize {
        self.stages
            .iter()
            .flat_map(|s| &s.tracks)
            .flat_map(|t| &t.steps)
            .filter(|s| s.completion == CompletionType::Timer)
            .count()
    }
}
