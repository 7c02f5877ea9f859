//! Validate an authored recipe file.
//! Usage: sous validate <recipe.yaml> [--json]

use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;

use crate::hydrate;

/// Hydrate the recipe and report the resolved graph. Configuration
/// errors (dangling start_track labels, timer steps without durations)
/// surface here, before any session exists.
pub fn execute(path: PathBuf, json: bool) -> Result<()> {
    let recipe = hydrate::load(&path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
        return Ok(());
    }

    println!(
        "{} {} is a valid recipe",
        "✓".green(),
        path.display().to_string().bold()
    );
    println!(
        "  {} stages · {} steps · {} timers",
        recipe.stages.len(),
        recipe.step_count(),
        recipe.timer_count()
    );
    for stage in &recipe.stages {
        let tracks: Vec<String> = stage
            .tracks
            .iter()
            .map(|t| {
                if t.parallel {
                    format!("{} (parallel)", t.label)
                } else {
                    t.label.clone()
                }
            })
            .collect();
        println!("  {} — {}", stage.label, tracks.join(", "));
    }

    Ok(())
}
