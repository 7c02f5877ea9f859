use std::time::Duration;

/// Window (in seconds of remaining time) during which a running timer
/// emits one tick event per whole-second boundary it crosses.
pub const FINAL_TICK_WINDOW_SECS: u32 = 10;

/// Default interval at which a driver should sample the timer registry.
/// Sampling cadence only affects event latency, never countdown accuracy.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

/// Colors assigned to tracks that the recipe author left uncolored,
/// cycled in track order across the whole recipe.
pub const TRACK_COLOR_PALETTE: [&str; 6] = [
    "#e07a5f", "#3d405b", "#81b29a", "#f2cc8f", "#6d597a", "#b56576",
];
