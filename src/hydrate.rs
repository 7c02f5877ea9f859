//! Recipe hydration: authored input → fully resolved recipe graph.
//!
//! Authored recipes carry no ids, may omit completion types and track
//! colors, and reference parallel tracks by label. Hydration generates
//! stable addresses, fills the gaps, and rejects dangling references so
//! the session engine can assume a valid graph.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

use crate::models::constants::TRACK_COLOR_PALETTE;
use crate::models::{
    CompletionType, Glossary, Recipe, RecipeItem, Stage, StageType, Step, Track,
};

/// Errors raised while turning an authored recipe into a resolved graph.
/// These are configuration errors: they fire before a session exists.
#[derive(Debug, Error)]
pub enum HydrateError {
    #[error("failed to parse recipe: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("recipe has no stages")]
    NoStages,

    #[error("stage {stage:?} has no tracks")]
    EmptyStage { stage: String },

    #[error("track {track:?} in stage {stage:?} has no steps")]
    EmptyTrack { track: String, stage: String },

    #[error("duplicate track label {label:?} in stage {stage:?}")]
    DuplicateTrackLabel { label: String, stage: String },

    #[error("start_track {target:?} does not match any track label in stage {stage:?}")]
    UnknownStartTrack { target: String, stage: String },

    #[error("timer step {step} of track {track:?} has no timer_duration")]
    MissingTimerDuration { track: String, step: usize },
}

/* ── Authored (input) shapes ─────────────────────────────────────────── */

#[derive(Debug, Clone, Deserialize)]
pub struct RecipeDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub servings: u32,
    pub total_time: String,
    #[serde(default)]
    pub ingredients: Vec<ItemDraft>,
    #[serde(default)]
    pub equipment: Vec<ItemDraft>,
    pub stages: Vec<StageDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemDraft {
    pub name: String,
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageDraft {
    #[serde(rename = "type")]
    pub stage_type: StageType,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub tracks: Vec<TrackDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackDraft {
    pub label: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub parallel: bool,
    pub steps: Vec<StepDraft>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepDraft {
    pub instruction: String,
    /// Optional; inferred from `timer_duration` when absent.
    #[serde(default)]
    pub completion: Option<CompletionType>,
    #[serde(default)]
    pub timer_duration: Option<u32>,
    #[serde(default)]
    pub timer_label: Option<String>,
    #[serde(default)]
    pub action_label: Option<String>,
    #[serde(default)]
    pub completion_hint: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub background: bool,
    #[serde(default)]
    pub on_complete: Option<OnCompleteDraft>,
    #[serde(default)]
    pub glossary: Glossary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnCompleteDraft {
    #[serde(default)]
    pub start_track: Option<String>,
}

/* ── Hydration ───────────────────────────────────────────────────────── */

/// Parse and hydrate a recipe from its authored YAML form.
pub fn from_yaml_str(source: &str) -> Result<Recipe, HydrateError> {
    let draft: RecipeDraft = serde_yaml::from_str(source)?;
    hydrate(draft)
}

/// Load and hydrate an authored recipe file.
pub fn load(path: &Path) -> Result<Recipe> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read recipe file: {}", path.display()))?;
    from_yaml_str(&source)
        .with_context(|| format!("Invalid recipe: {}", path.display()))
}

/// The bundled sample recipe, used as the CLI default.
pub fn builtin() -> Result<Recipe, HydrateError> {
    from_yaml_str(include_str!("../recipes/weeknight-pasta.yaml"))
}

/// Resolve an authored recipe into the immutable graph the engine runs.
pub fn hydrate(draft: RecipeDraft) -> Result<Recipe, HydrateError> {
    if draft.stages.is_empty() {
        return Err(HydrateError::NoStages);
    }

    let ingredients = hydrate_items(draft.ingredients, "ingredient");
    let equipment = hydrate_items(draft.equipment, "equipment");

    let mut color_cursor = 0usize;
    let mut stages = Vec::with_capacity(draft.stages.len());

    for (stage_index, stage) in draft.stages.into_iter().enumerate() {
        if stage.tracks.is_empty() {
            return Err(HydrateError::EmptyStage { stage: stage.label });
        }

        // Track ids carry the stage ordinal so a label reused by a later
        // stage can never produce a colliding timer address.
        let mut ids_by_label: Vec<(String, String)> = Vec::new();
        for track in &stage.tracks {
            if track.steps.is_empty() {
                return Err(HydrateError::EmptyTrack {
                    track: track.label.clone(),
                    stage: stage.label.clone(),
                });
            }
            let id = format!("s{stage_index}-{}", slug(&track.label));
            if ids_by_label
                .iter()
                .any(|(label, existing)| *label == track.label || *existing == id)
            {
                return Err(HydrateError::DuplicateTrackLabel {
                    label: track.label.clone(),
                    stage: stage.label.clone(),
                });
            }
            ids_by_label.push((track.label.clone(), id));
        }

        let mut tracks = Vec::with_capacity(stage.tracks.len());
        for track in stage.tracks {
            let id = ids_by_label
                .iter()
                .find(|(label, _)| *label == track.label)
                .map(|(_, id)| id.clone())
                .unwrap_or_default();

            let color = track.color.unwrap_or_else(|| {
                let c = TRACK_COLOR_PALETTE[color_cursor % TRACK_COLOR_PALETTE.len()];
                color_cursor += 1;
                c.to_string()
            });

            let mut steps = Vec::with_capacity(track.steps.len());
            for (step_index, step) in track.steps.into_iter().enumerate() {
                let completion = step.completion.unwrap_or(if step.timer_duration.is_some() {
                    CompletionType::Timer
                } else {
                    CompletionType::Manual
                });

                if completion == CompletionType::Timer && step.timer_duration.is_none() {
                    return Err(HydrateError::MissingTimerDuration {
                        track: track.label,
                        step: step_index,
                    });
                }

                let starts_track = match step.on_complete.and_then(|oc| oc.start_track) {
                    Some(target) => {
                        let resolved = ids_by_label
                            .iter()
                            .find(|(label, _)| *label == target)
                            .map(|(_, id)| id.clone());
                        match resolved {
                            Some(id) => Some(id),
                            None => {
                                return Err(HydrateError::UnknownStartTrack {
                                    target,
                                    stage: stage.label.clone(),
                                })
                            }
                        }
                    }
                    None => None,
                };

                steps.push(Step {
                    instruction: step.instruction,
                    completion,
                    timer_duration: step.timer_duration,
                    timer_label: step.timer_label,
                    action_label: step.action_label,
                    completion_hint: step.completion_hint,
                    hint: step.hint,
                    background: step.background,
                    starts_track,
                    glossary: step.glossary,
                });
            }

            tracks.push(Track {
                id,
                label: track.label,
                color,
                parallel: track.parallel,
                steps,
            });
        }

        stages.push(Stage {
            id: format!("stage-{stage_index}"),
            stage_type: stage.stage_type,
            label: stage.label,
            description: stage.description,
            tracks,
        });
    }

    Ok(Recipe {
        title: draft.title,
        description: draft.description,
        servings: draft.servings,
        total_time: draft.total_time,
        ingredients,
        equipment,
        stages,
    })
}

fn hydrate_items(items: Vec<ItemDraft>, prefix: &str) -> Vec<RecipeItem> {
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| RecipeItem {
            id: format!("{prefix}-{i}"),
            name: item.name,
            amount: item.amount,
            note: item.note,
        })
        .collect()
}

/// Lowercase a label and squeeze non-alphanumeric runs to single dashes.
fn slug(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut dash_pending = false;
    for ch in label.chars() {
        if ch.is_alphanumeric() {
            if dash_pending && !out.is_empty() {
                out.push('-');
            }
            dash_pending = false;
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        } else {
            dash_pending = true;
        }
    }
    out
}
