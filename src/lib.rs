//! SnowMotion - catch falling parts in order to build snowmen
//!
//! Core modules:
//! - `sim`: Session state machine, spawn heuristic and loop driver
//! - `tuning`: Per-difficulty balance tables
//! - `renderer`: Terminal rendering
//! - `persistence`: JSON files in the platform data directory
//! - `settings`: Player preferences
//! - `leaderboard`: Ranked score table
//! - `submit`: Final score submission with local fallback

pub mod leaderboard;
pub mod persistence;
pub mod renderer;
pub mod settings;
pub mod sim;
pub mod submit;
pub mod tuning;

pub use leaderboard::Leaderboard;
pub use settings::Settings;
pub use tuning::{Difficulty, DifficultyProfile};

/// Game configuration constants
pub mod consts {
    /// Physics tick interval (ms, ~60 Hz)
    pub const PHYSICS_TICK_MS: u64 = 16;
    /// Countdown tick interval (ms)
    pub const COUNTDOWN_TICK_MS: u64 = 1000;
    /// How long the penalty flash stays up (ms)
    pub const PENALTY_FLASH_MS: u64 = 1000;

    /// Session defaults
    pub const INITIAL_LIVES: u32 = 5;
    pub const TIMER_DURATION_SECS: u32 = 30;
    /// Seconds added when a snowman is completed
    pub const COMPLETION_BONUS_SECS: u32 = 15;
    /// Seconds removed by a wrong item (time penalty policy)
    pub const WRONG_ITEM_PENALTY_SECS: u32 = 10;

    /// Spawn caps
    pub const MAX_ITEMS_ON_SCREEN: usize = 15;
    /// Below this many items the next spawn comes sooner
    pub const MIN_ITEMS_ON_SCREEN: usize = 3;
    pub const LOW_ITEM_INTERVAL_SCALE: f64 = 0.3;

    /// Playfield geometry, in percent of the screen
    pub const SPAWN_Y: f32 = -10.0;
    pub const SPAWN_X_MIN: f32 = 10.0;
    pub const SPAWN_X_MAX: f32 = 90.0;
    pub const AUTO_COLLECT_TOP: f32 = 85.0;
    pub const AUTO_COLLECT_BOTTOM: f32 = 95.0;
    /// Items past this line are gone
    pub const DESPAWN_Y: f32 = 100.0;
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
