//! Data-driven game balance
//!
//! One immutable profile per difficulty. Nothing here changes at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Difficulty tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Numeric tag used in submitted records (0 = easy, 1 = medium, 2 = hard)
    pub fn index(&self) -> u8 {
        match self {
            Difficulty::Easy => 0,
            Difficulty::Medium => 1,
            Difficulty::Hard => 2,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn profile(&self) -> &'static DifficultyProfile {
        match self {
            Difficulty::Easy => &EASY,
            Difficulty::Medium => &MEDIUM,
            Difficulty::Hard => &HARD,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.profile().label)
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" | "e" => Ok(Difficulty::Easy),
            "medium" | "med" | "m" => Ok(Difficulty::Medium),
            "hard" | "h" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}' (expected easy, medium or hard)")),
        }
    }
}

/// Relative odds of spawning the needed part, a scarf, or a wrong part
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnWeights {
    pub needed: f64,
    pub bonus: f64,
    pub wrong: f64,
}

/// Static tuning for one difficulty
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifficultyProfile {
    pub label: &'static str,
    /// Per-tick fall increment range (percent of screen height)
    pub fall_speed_min: f32,
    pub fall_speed_max: f32,
    /// Delay between spawns (ms)
    pub spawn_interval_min: u64,
    pub spawn_interval_max: u64,
    /// Base spawn weights before adaptive adjustments
    pub base_weights: SpawnWeights,
    /// Leaderboard normalization factor for cross-difficulty ranking
    pub score_multiplier: f64,
    pub description: &'static str,
}

static EASY: DifficultyProfile = DifficultyProfile {
    label: "Easy",
    fall_speed_min: 0.1,
    fall_speed_max: 0.3,
    spawn_interval_min: 1500,
    spawn_interval_max: 2500,
    base_weights: SpawnWeights {
        needed: 0.7,
        bonus: 0.15,
        wrong: 0.15,
    },
    score_multiplier: 1.0,
    description: "Slow falling items, plenty of time to build",
};

static MEDIUM: DifficultyProfile = DifficultyProfile {
    label: "Medium",
    fall_speed_min: 0.2,
    fall_speed_max: 0.5,
    spawn_interval_min: 1000,
    spawn_interval_max: 2000,
    base_weights: SpawnWeights {
        needed: 0.6,
        bonus: 0.2,
        wrong: 0.2,
    },
    score_multiplier: 1.5,
    description: "Balanced speed and spawn rate",
};

static HARD: DifficultyProfile = DifficultyProfile {
    label: "Hard",
    fall_speed_min: 0.4,
    fall_speed_max: 0.8,
    spawn_interval_min: 800,
    spawn_interval_max: 1500,
    base_weights: SpawnWeights {
        needed: 0.5,
        bonus: 0.25,
        wrong: 0.25,
    },
    score_multiplier: 2.0,
    description: "Fast items, less time to think",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_difficulty() {
        assert_eq!("easy".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert_eq!("MED".parse::<Difficulty>(), Ok(Difficulty::Medium));
        assert_eq!("Hard".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_index_round_trip() {
        for d in Difficulty::ALL {
            assert_eq!(Difficulty::from_index(d.index()), Some(d));
        }
        assert_eq!(Difficulty::from_index(3), None);
    }

    #[test]
    fn test_profiles_are_sane() {
        for d in Difficulty::ALL {
            let p = d.profile();
            assert!(p.fall_speed_min < p.fall_speed_max);
            assert!(p.spawn_interval_min < p.spawn_interval_max);
            let w = p.base_weights;
            assert!((w.needed + w.bonus + w.wrong - 1.0).abs() < 1e-9);
        }
        // Harder tiers fall faster and spawn more often
        assert!(Difficulty::Hard.profile().fall_speed_max > Difficulty::Easy.profile().fall_speed_max);
        assert!(
            Difficulty::Hard.profile().spawn_interval_min < Difficulty::Easy.profile().spawn_interval_min
        );
    }
}
