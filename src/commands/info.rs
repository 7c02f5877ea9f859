//! Recipe overview.
//! Usage: sous info [recipe.yaml] [--json]

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::hydrate;
use crate::models::Recipe;
use crate::utils::format_clock;

pub fn execute(path: Option<PathBuf>, json: bool) -> Result<()> {
    let recipe = load(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
        return Ok(());
    }

    println!("{}", recipe.title.bold());
    if !recipe.description.is_empty() {
        println!("{}", recipe.description);
    }
    println!(
        "Serves {} · {} · {} steps",
        recipe.servings,
        recipe.total_time,
        recipe.step_count()
    );

    if !recipe.ingredients.is_empty() {
        println!();
        println!("{}", "Ingredients".bold());
        for item in &recipe.ingredients {
            let amount = item.amount.as_deref().unwrap_or("");
            let note = item
                .note
                .as_deref()
                .map(|n| format!(" ({n})"))
                .unwrap_or_default();
            println!("  {:<12} {}{}", amount, item.name, note);
        }
    }

    if !recipe.equipment.is_empty() {
        println!();
        println!("{}", "Equipment".bold());
        for item in &recipe.equipment {
            println!("  {}", item.name);
        }
    }

    println!();
    println!("{}", "Stages".bold());
    for (i, stage) in recipe.stages.iter().enumerate() {
        println!("  {}. {} [{}]", i + 1, stage.label, stage.stage_type);
        for track in &stage.tracks {
            let timers: u32 = track
                .steps
                .iter()
                .filter_map(|s| s.timer_duration)
                .sum();
            let timer_note = if timers > 0 {
                format!(" · {} of timers", format_clock(timers))
            } else {
                String::new()
            };
            let parallel = if track.parallel { " (parallel)" } else { "" };
            println!(
                "     {}{} — {} steps{}",
                track.label,
                parallel,
                track.len(),
                timer_note
            );
        }
    }

    Ok(())
}

fn load(path: Option<PathBuf>) -> Result<Recipe> {
    match path {
        Some(path) => hydrate::load(&path),
        None => hydrate::builtin().context("bundled recipe failed to hydrate"),
    }
}
