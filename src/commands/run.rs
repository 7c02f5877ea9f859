//! Interactive cooking session in the terminal.
//! Usage: sous run [recipe.yaml] [--plain]
//!
//! The run loop is the presentation driver: it renders the engine's
//! projections, feeds user commands into its operations, and samples the
//! timer registry. Countdowns are timestamp-based, so a prompt blocked on
//! input never skews remaining time; it only delays the bell.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::hydrate;
use crate::models::{CompletionType, Recipe, Step, Track};
use crate::session::events::TimerEvent;
use crate::session::review::ViewMode;
use crate::session::timers::TimerRegistry;
use crate::session::toast::{toast_timers, Toast};
use crate::session::{CookingSession, Phase, SessionConfig};
use crate::utils::{format_clock, truncate};

pub fn execute(path: Option<PathBuf>, plain: bool) -> Result<()> {
    if plain {
        colored::control::set_override(false);
    }

    let recipe = match path {
        Some(path) => hydrate::load(&path)?,
        None => hydrate::builtin().context("bundled recipe failed to hydrate")?,
    };

    let config = SessionConfig::default();
    let mut session = CookingSession::new(recipe);
    let stdin = io::stdin();
    let mut input = stdin.lock();

    println!("{}", crate::LOGO);

    loop {
        report_events(&mut session);

        match session.phase() {
            Phase::Intro => {
                render_intro(session.recipe());
                match read_command(&mut input)? {
                    None => break,
                    Some(cmd) if cmd == "q" => break,
                    Some(_) => session.start_session(),
                }
            }
            Phase::StageTransition => {
                render_transition(&session);
                match read_command(&mut input)? {
                    None => break,
                    Some(cmd) if cmd == "q" => break,
                    Some(_) => session.continue_to_stage(),
                }
            }
            Phase::Cooking => {
                render_cooking(&session);
                match read_command(&mut input)? {
                    None => break,
                    Some(cmd) => {
                        if !handle_cooking_command(&mut session, &mut input, &config, &cmd)? {
                            break;
                        }
                    }
                }
            }
            Phase::Done => {
                render_done(session.recipe());
                break;
            }
        }
    }

    Ok(())
}

/* ── Input ───────────────────────────────────────────────────────────── */

fn read_command(input: &mut impl BufRead) -> Result<Option<String>> {
    print!("{} ", ">".dimmed());
    io::stdout().flush()?;

    let mut line = String::new();
    let read = input.read_line(&mut line)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_lowercase()))
}

/// Returns false when the user quits.
fn handle_cooking_command(
    session: &mut CookingSession,
    input: &mut impl BufRead,
    config: &SessionConfig,
    command: &str,
) -> Result<bool> {
    let mut parts = command.split_whitespace();
    match parts.next() {
        None => primary_action(session),
        Some("n") | Some("next") => advance_current(session),
        Some("p") | Some("pause") => with_current_timer(session, |timers, key| timers.pause(key)),
        Some("r") | Some("resume") => with_current_timer(session, |timers, key| timers.resume(key)),
        Some("k") | Some("skip") => skip_current(session, input)?,
        Some("t") | Some("track") => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
            Some(n) => switch_track_by_number(session, n),
            None => list_tracks(session),
        },
        Some("b") | Some("back") => session.step_back(),
        Some("f") | Some("fwd") | Some("forward") => session.step_forward(),
        Some("v") | Some("view") => match parts.next().and_then(|n| n.parse::<usize>().ok()) {
            Some(n) if n >= 1 => session.enter_stage_review(n - 1, None),
            _ => println!("Usage: v <stage number>"),
        },
        Some("c") | Some("current") => session.return_to_current(),
        Some("w") | Some("watch") => watch(session, config),
        Some("q") | Some("quit") | Some("exit") => return Ok(false),
        Some("h") | Some("help") | Some("?") => print_help(),
        Some(other) => println!("Unknown command {other:?} — 'h' for help"),
    }
    Ok(true)
}

/// Enter: leave review if browsing, otherwise drive the current step.
fn primary_action(session: &mut CookingSession) {
    if session.is_reviewing() {
        session.return_to_current();
        return;
    }
    let Some((track_id, cursor, step, len)) = current_step(session) else {
        return;
    };
    if cursor >= len {
        println!("This track is complete — switch to another track ('t').");
        return;
    }

    match step.completion {
        CompletionType::Timer => {
            let Some(duration) = step.timer_duration else {
                session.advance_step(&track_id);
                return;
            };
            let key = TimerRegistry::key(&track_id, cursor);
            let snap = session.timers_mut().get_or_create(&key, duration);
            if snap.not_started {
                session.timers_mut().start(&key);
                println!("Timer started — 'w' to watch it, 'p' to pause.");
            } else if snap.running {
                println!(
                    "{} left — 'w' to watch, 'k' to skip.",
                    format_clock(snap.seconds_left())
                );
            } else {
                // Paused or done: done advances, paused nudges.
                if snap.done {
                    session.advance_step(&track_id);
                } else {
                    println!("Timer paused — 'r' to resume.");
                }
            }
        }
        CompletionType::Manual | CompletionType::Final => session.advance_step(&track_id),
    }
}

fn advance_current(session: &mut CookingSession) {
    if session.is_reviewing() {
        session.return_to_current();
        return;
    }
    if let Some(track_id) = session.active_track().map(String::from) {
        session.advance_step(&track_id);
    }
}

/// Run a registry action against the canonical current step's timer.
fn with_current_timer(
    session: &mut CookingSession,
    action: impl FnOnce(&mut TimerRegistry, &str),
) {
    let Some((track_id, cursor, step, len)) = current_step(session) else {
        return;
    };
    if cursor >= len || step.completion != CompletionType::Timer {
        println!("The current step has no timer.");
        return;
    }
    let key = TimerRegistry::key(&track_id, cursor);
    if let Some(duration) = step.timer_duration {
        session.timers_mut().get_or_create(&key, duration);
    }
    action(session.timers_mut(), &key);
}

/// User-confirmed skip: force-complete the countdown, then advance.
fn skip_current(session: &mut CookingSession, input: &mut impl BufRead) -> Result<()> {
    let Some((track_id, cursor, step, len)) = current_step(session) else {
        return Ok(());
    };
    if cursor >= len || step.completion != CompletionType::Timer {
        println!("The current step has no timer to skip.");
        return Ok(());
    }
    let key = TimerRegistry::key(&track_id, cursor);
    let Some(snap) = session.timers().snapshot(&key) else {
        println!("The timer hasn't been started.");
        return Ok(());
    };
    if snap.done {
        session.advance_step(&track_id);
        return Ok(());
    }

    let label = step.timer_label.as_deref().unwrap_or("this timer");
    print!(
        "Skip {} with {} left? (y/N) ",
        label.bold(),
        format_clock(snap.seconds_left())
    );
    io::stdout().flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    if line.trim().eq_ignore_ascii_case("y") {
        session.timers_mut().force_complete(&key);
        session.advance_step(&track_id);
    }
    Ok(())
}

fn switch_track_by_number(session: &mut CookingSession, number: usize) {
    let ids = visible_track_ids(session);
    match number.checked_sub(1).and_then(|i| ids.get(i)) {
        Some(id) => {
            let id = id.clone();
            session.switch_active_track(&id);
        }
        None => println!("No such track — 't' lists them."),
    }
}

fn list_tracks(session: &CookingSession) {
    let Some(stage) = session.recipe().stage(session.current_stage_index()) else {
        return;
    };
    for (i, track) in visible_tracks(session, stage).iter().enumerate() {
        let cursor = session.cursor(&track.id);
        let marker = if session.active_track() == Some(track.id.as_str()) {
            "▶"
        } else {
            " "
        };
        let check = if track.is_finished(cursor) { " ✓" } else { "" };
        println!(
            " {} {}. {} [{}/{}]{}",
            marker,
            i + 1,
            track.label,
            cursor.min(track.len()),
            track.len(),
            check
        );
    }
}

/// Block until the next running timer finishes, sampling on the way and
/// repainting a countdown line. Countdown accuracy does not depend on
/// this loop; it only exists so the bell rings on time.
fn watch(session: &mut CookingSession, config: &SessionConfig) {
    if !session.timers().any_running() {
        println!("No timers running.");
        return;
    }
    println!("{}", "Watching — returns when the next timer finishes.".dimmed());

    loop {
        let events = session.sample();
        let mut finished = false;
        for event in &events {
            match event {
                TimerEvent::Finished { key } => {
                    println!("\r\x07⏰ {} finished!", describe_key(session.recipe(), key));
                    finished = true;
                }
                TimerEvent::FinalTick { .. } => {
                    print!("\x07");
                }
            }
        }
        if finished || !session.timers().any_running() {
            break;
        }

        let soonest = session
            .timers()
            .snapshot_all()
            .into_iter()
            .filter(|(_, snap)| snap.running)
            .min_by(|a, b| {
                a.1.time_left
                    .partial_cmp(&b.1.time_left)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        if let Some((key, snap)) = soonest {
            print!(
                "\r  {} — {} left   ",
                describe_key(session.recipe(), &key),
                format_clock(snap.seconds_left())
            );
            let _ = io::stdout().flush();
        }

        thread::sleep(config.sample_interval);
    }
    println!();
}

/// Sample and report anything that fired since the last prompt.
fn report_events(session: &mut CookingSession) {
    let events = session.sample();
    for event in events {
        if let TimerEvent::Finished { key } = event {
            println!("\x07⏰ {} finished!", describe_key(session.recipe(), &key));
        }
    }
}

/* ── Rendering ───────────────────────────────────────────────────────── */

fn render_intro(recipe: &Recipe) {
    println!();
    println!("{}", recipe.title.bold());
    if !recipe.description.is_empty() {
        println!("{}", recipe.description.dimmed());
    }
    println!("Serves {} · {}", recipe.servings, recipe.total_time);

    if !recipe.ingredients.is_empty() {
        println!();
        println!("{}", "Ingredients".bold());
        for item in &recipe.ingredients {
            println!(
                "  {:<12} {}",
                item.amount.as_deref().unwrap_or(""),
                item.name
            );
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
    println!("Press Enter to start cooking, 'q' to quit.");
}

fn render_transition(session: &CookingSession) {
    let recipe = session.recipe();
    let target = session.transition_target();
    let Some(stage) = recipe.stage(target) else {
        return;
    };
    println!();
    println!(
        "{} {} of {}: {}",
        "Stage".dimmed(),
        target + 1,
        recipe.stages.len(),
        stage.label.bold()
    );
    if !stage.description.is_empty() {
        println!("{}", stage.description);
    }
    println!();
    println!("Press Enter to begin this stage.");
}

fn render_cooking(session: &CookingSession) {
    let recipe = session.recipe();
    let Some(stage) = recipe.stage(session.current_stage_index()) else {
        return;
    };

    println!();
    println!("{} · {}", recipe.title.dimmed(), stage.label.bold());

    let visible = visible_tracks(session, stage);
    if visible.len() > 1 {
        list_tracks(session);
    }

    for toast in toast_timers(session) {
        println!("  {}", describe_toast(recipe, &toast));
    }

    if let Some(pending) = session.pending_track_start() {
        if session.active_track() != Some(pending) {
            if let Some((_, track)) = recipe.find_track(pending) {
                println!(
                    "  {} {} is ready to start — switch with 't'",
                    "⚡".yellow(),
                    track.label.bold()
                );
            }
        }
    }

    render_step_card(session);
}

fn render_step_card(session: &CookingSession) {
    let recipe = session.recipe();
    let Some(position) = session.view_position() else {
        return;
    };
    let Some(track) = recipe
        .stage(position.stage)
        .and_then(|s| s.track(&position.track_id))
    else {
        return;
    };

    // Canonical view of a finished track: completion panel, no step.
    let cursor = session.cursor(&track.id);
    if session.view_mode() == ViewMode::Current && track.is_finished(cursor) {
        println!();
        println!("  ✅ {} — complete", track.label.bold());
        if session.timers().any_running() {
            println!("  Waiting for timers to finish.");
        } else {
            println!("  Switch to an unfinished track with 't'.");
        }
        return;
    }

    let Some(step) = track.step(position.step) else {
        return;
    };

    println!();
    match session.view_mode() {
        ViewMode::Review => println!("  {}", "[reviewing a completed step — Enter returns]".dimmed()),
        ViewMode::Preview => println!("  {}", "[previewing an upcoming step — Enter returns]".dimmed()),
        ViewMode::Current => {}
    }
    println!(
        "  {} {}",
        format!("Step {} of {}", position.step + 1, track.len()).bold(),
        format!("· {}", track.label).dimmed()
    );
    println!("  {}", step.instruction);
    if let Some(hint) = &step.hint {
        println!("  💡 {}", hint.dimmed());
    }

    if step.completion == CompletionType::Timer {
        render_timer_line(session, &position.track_id, position.step, step);
    }
    if session.view_mode() == ViewMode::Current {
        if let Some(hint) = &step.completion_hint {
            println!("  {}", hint.dimmed());
        }
    }
}

fn render_timer_line(session: &CookingSession, track_id: &str, step_index: usize, step: &Step) {
    let Some(duration) = step.timer_duration else {
        return;
    };
    let key = TimerRegistry::key(track_id, step_index);
    let label = step.timer_label.as_deref().unwrap_or("Timer");

    match session.timers().snapshot(&key) {
        None => println!("  ⏲ {} {} — Enter starts it", label, format_clock(duration)),
        Some(snap) if snap.not_started => {
            println!("  ⏲ {} {} — Enter starts it", label, format_clock(duration))
        }
        Some(snap) if snap.running => println!(
            "  ⏲ {} — {} left",
            label,
            format_clock(snap.seconds_left()).bold()
        ),
        Some(snap) if snap.paused => println!(
            "  ⏲ {} — paused at {} ('r' resumes)",
            label,
            format_clock(snap.seconds_left())
        ),
        Some(snap) => {
            let over = snap.overtime_seconds();
            if over > 0 {
                println!(
                    "  ⏲ {} — done ({} over)",
                    label,
                    format!("+{}", format_clock(over)).red()
                );
            } else {
                println!("  ⏲ {} — {}", label, "done".green());
            }
        }
    }
}

fn render_done(recipe: &Recipe) {
    println!();
    println!("🎉 {} — {}", recipe.title.bold(), "all stages complete".green());
    println!("Enjoy!");
}

fn print_help() {
    println!("Commands:");
    println!("  Enter      start the step's timer / complete the step / leave review");
    println!("  n          complete the current step");
    println!("  p / r      pause / resume the step's timer");
    println!("  k          skip the step's timer (asks first)");
    println!("  w          watch until the next timer finishes");
    println!("  t [n]      list tracks / switch to track n");
    println!("  b / f      review one step back / forward");
    println!("  v <n>      review stage n");
    println!("  c          jump back to the current step");
    println!("  q          quit");
}

/* ── Helpers ─────────────────────────────────────────────────────────── */

/// Canonical current step of the active track, cloned out so callers can
/// mutate the session afterwards.
fn current_step(session: &CookingSession) -> Option<(String, usize, Step, usize)> {
    let track_id = session.active_track()?.to_string();
    let (_, track) = session.recipe().find_track(&track_id)?;
    let cursor = session.cursor(&track_id);
    let len = track.len();
    let step = track.step(cursor.min(len.saturating_sub(1)))?.clone();
    Some((track_id, cursor, step, len))
}

fn visible_tracks<'a>(
    session: &CookingSession,
    stage: &'a crate::models::Stage,
) -> Vec<&'a Track> {
    stage
        .tracks
        .iter()
        .filter(|t| !t.parallel || session.started_tracks().contains(&t.id))
        .collect()
}

fn visible_track_ids(session: &CookingSession) -> Vec<String> {
    session
        .recipe()
        .stage(session.current_stage_index())
        .map(|stage| {
            visible_tracks(session, stage)
                .iter()
                .map(|t| t.id.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn describe_key(recipe: &Recipe, key: &str) -> String {
    let Some((track_id, step_index)) = key
        .rsplit_once(':')
        .and_then(|(t, s)| s.parse::<usize>().ok().map(|i| (t, i)))
    else {
        return key.to_string();
    };
    let Some((_, track)) = recipe.find_track(track_id) else {
        return key.to_string();
    };
    let name = track
        .step(step_index)
        .map(|step| {
            step.timer_label
                .clone()
                .unwrap_or_else(|| truncate(&step.instruction, 40))
        })
        .unwrap_or_else(|| key.to_string());
    format!("{} · {}", track.label, name)
}

fn describe_toast(recipe: &Recipe, toast: &Toast) -> String {
    let what = describe_key(recipe, &toast.key);
    if toast.timer.done {
        format!("⏰ {} — {}", what, "done".green())
    } else {
        format!(
            "⏲ {} — {} left",
            what,
            format_clock(toast.timer.seconds_left())
        )
    }
}
