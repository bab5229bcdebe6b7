//! Score leaderboard
//!
//! Persisted as JSON. Ranking across difficulties uses each tier's
//! multiplier; ranking within one tier uses the raw score.

use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::persistence;
use crate::sim::FinalScore;
use crate::tuning::Difficulty;

/// Maximum number of entries to keep
pub const MAX_ENTRIES: usize = 100;

/// A single submitted score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub player: String,
    pub score: u64,
    pub difficulty: Difficulty,
    /// Unix timestamp (ms) when submitted
    pub timestamp: u64,
}

impl LeaderboardEntry {
    pub fn new(player: &str, result: FinalScore, timestamp: u64) -> Self {
        Self {
            player: player.to_string(),
            score: result.score,
            difficulty: result.difficulty,
            timestamp,
        }
    }

    /// Score scaled by the difficulty multiplier, for cross-tier ranking
    pub fn normalized_score(&self) -> u64 {
        (self.score as f64 * self.difficulty.profile().score_multiplier).round() as u64
    }
}

/// Which entries to rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaderboardFilter {
    /// Every tier, by normalized score
    #[default]
    All,
    /// One tier, by raw score
    Only(Difficulty),
}

impl LeaderboardFilter {
    /// Cycle All -> Easy -> Medium -> Hard -> All
    pub fn next(self) -> Self {
        match self {
            LeaderboardFilter::All => LeaderboardFilter::Only(Difficulty::Easy),
            LeaderboardFilter::Only(Difficulty::Easy) => LeaderboardFilter::Only(Difficulty::Medium),
            LeaderboardFilter::Only(Difficulty::Medium) => LeaderboardFilter::Only(Difficulty::Hard),
            LeaderboardFilter::Only(Difficulty::Hard) => LeaderboardFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LeaderboardFilter::All => "All",
            LeaderboardFilter::Only(d) => d.profile().label,
        }
    }
}

/// One row of a ranked view
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry<'a> {
    /// 1-indexed
    pub rank: usize,
    /// The value the row was ranked by
    pub ranking_score: u64,
    pub entry: &'a LeaderboardEntry,
}

/// Score leaderboard
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    /// Create empty leaderboard
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an entry. Returns its overall rank, or None if it fell off the end.
    pub fn add(&mut self, entry: LeaderboardEntry) -> Option<usize> {
        let (score, timestamp) = (entry.normalized_score(), entry.timestamp);
        // Entries tied on both keys keep insertion order
        let pos = self.entries.partition_point(|e| {
            let other = e.normalized_score();
            other > score || (other == score && e.timestamp <= timestamp)
        });
        self.entries.insert(pos, entry);
        self.entries.truncate(MAX_ENTRIES);
        (pos < MAX_ENTRIES).then_some(pos + 1)
    }

    fn sort(&mut self) {
        // Highest normalized score first; earlier submissions win ties
        self.entries.sort_by(|a, b| {
            b.normalized_score()
                .cmp(&a.normalized_score())
                .then(a.timestamp.cmp(&b.timestamp))
        });
    }

    /// Ranked view for a filter
    pub fn ranked(&self, filter: LeaderboardFilter) -> Vec<RankedEntry<'_>> {
        let mut rows: Vec<(u64, &LeaderboardEntry)> = match filter {
            LeaderboardFilter::All => self
                .entries
                .iter()
                .map(|e| (e.normalized_score(), e))
                .collect(),
            LeaderboardFilter::Only(difficulty) => self
                .entries
                .iter()
                .filter(|e| e.difficulty == difficulty)
                .map(|e| (e.score, e))
                .collect(),
        };
        rows.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.timestamp.cmp(&b.1.timestamp)));
        rows.into_iter()
            .enumerate()
            .map(|(i, (ranking_score, entry))| RankedEntry {
                rank: i + 1,
                ranking_score,
                entry,
            })
            .collect()
    }

    /// Best raw score for a tier
    pub fn top_score(&self, difficulty: Difficulty) -> Option<u64> {
        self.entries
            .iter()
            .filter(|e| e.difficulty == difficulty)
            .map(|e| e.score)
            .max()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load the leaderboard from the data directory
    pub fn load() -> Self {
        match persistence::data_file(persistence::LEADERBOARD_FILE) {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                log::warn!("{:#} - empty leaderboard", e);
                Self::new()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        let mut board: Self = persistence::load_or_default(path);
        board.sort();
        log::info!("Leaderboard has {} entries", board.entries.len());
        board
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&persistence::data_file(persistence::LEADERBOARD_FILE)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        persistence::save_json(path, self)?;
        log::info!("Leaderboard saved ({} entries)", self.entries.len());
        Ok(())
    }
}

/// Shorten long player names to `abcdef...wxyz`
pub fn format_player(player: &str) -> String {
    let chars: Vec<char> = player.chars().collect();
    if chars.len() <= 12 {
        return player.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Format a timestamp as a relative date string
pub fn format_date(timestamp: u64, now: u64) -> String {
    let diff_secs = now.saturating_sub(timestamp) / 1000;
    let diff_mins = diff_secs / 60;
    let diff_hours = diff_mins / 60;
    let diff_days = diff_hours / 24;

    if diff_days >= 1 {
        match diff_days {
            1 => "Yesterday".to_string(),
            2..=6 => format!("{} days ago", diff_days),
            7..=13 => "1 week ago".to_string(),
            _ => format!("{} weeks ago", diff_days / 7),
        }
    } else if diff_hours >= 1 {
        if diff_hours == 1 {
            "1 hour ago".to_string()
        } else {
            format!("{} hours ago", diff_hours)
        }
    } else if diff_mins >= 1 {
        if diff_mins == 1 {
            "1 min ago".to_string()
        } else {
            format!("{} mins ago", diff_mins)
        }
    } else {
        "Just now".to_string()
    }
}
