//! Game settings and preferences
//!
//! Persisted as JSON in the data directory; command-line flags override
//! individual fields for one run.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::persistence;
use crate::sim::PenaltyPolicy;
use crate::tuning::Difficulty;

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Difficulty preselected in the menu
    pub difficulty: Difficulty,
    /// What a wrong item costs
    pub penalty: PenaltyPolicy,
    /// Name recorded with submitted scores
    pub player: String,

    /// Fixed RNG seed; random per session when unset
    pub seed: Option<u64>,

    // === Display ===
    /// Frames per second for the terminal renderer
    pub fps_cap: u32,
    /// Colored output
    pub color: bool,
    /// Show the next needed part in the HUD
    pub show_next_hint: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            penalty: PenaltyPolicy::TimePenalty,
            player: "player".to_string(),

            seed: None,

            // Display
            fps_cap: 30,
            color: true,
            show_next_hint: true,
        }
    }
}

impl Settings {
    /// Frame budget in milliseconds (fps clamped to 5..=120)
    pub fn frame_ms(&self) -> u64 {
        1000 / u64::from(self.fps_cap.clamp(5, 120))
    }

    /// The configured seed, or a fresh random one
    pub fn session_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }

    /// Load settings from the data directory
    pub fn load() -> Self {
        match persistence::data_file(persistence::SETTINGS_FILE) {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                log::warn!("{:#} - using default settings", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        persistence::load_or_default(path)
    }

    /// Save settings to the data directory
    pub fn save(&self) -> Result<()> {
        self.save_to(&persistence::data_file(persistence::SETTINGS_FILE)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        persistence::save_json(path, self)?;
        log::info!("Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_ms_clamps() {
        let mut settings = Settings::default();
        assert_eq!(settings.frame_ms(), 33);
        settings.fps_cap = 0;
        assert_eq!(settings.frame_ms(), 200);
        settings.fps_cap = 1000;
        assert_eq!(settings.frame_ms(), 8);
    }

    #[test]
    fn test_fixed_seed_is_used() {
        let settings = Settings {
            seed: Some(77),
            ..Settings::default()
        };
        assert_eq!(settings.session_seed(), 77);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "difficulty": "hard", "penalty": "lose-life" }"#).unwrap();
        assert_eq!(settings.difficulty, Difficulty::Hard);
        assert_eq!(settings.penalty, PenaltyPolicy::LoseLife);
        assert_eq!(settings.player, "player");
        assert_eq!(settings.fps_cap, 30);
    }

    #[test]
    fn test_save_and_reload() {
        let path = persistence::scratch_path("settings.json");
        let settings = Settings {
            difficulty: Difficulty::Easy,
            player: "frosty".into(),
            seed: Some(5),
            ..Settings::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }
}
