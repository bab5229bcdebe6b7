//! Game state and core simulation types
//!
//! Everything a session owns lives here. Mutation happens through the
//! functions in `tick` and the driver; the types here only keep their own
//! invariants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::tuning::Difficulty;

/// Falling item types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Snowball,
    Coal,
    Carrot,
    Hat,
    /// Bonus part, never part of the build order
    Scarf,
}

impl ItemKind {
    /// Build order of a snowman
    pub const ORDERED: [ItemKind; 4] = [
        ItemKind::Snowball,
        ItemKind::Coal,
        ItemKind::Carrot,
        ItemKind::Hat,
    ];
    pub const BONUS: ItemKind = ItemKind::Scarf;
    pub const ALL: [ItemKind; 5] = [
        ItemKind::Snowball,
        ItemKind::Coal,
        ItemKind::Carrot,
        ItemKind::Hat,
        ItemKind::Scarf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Snowball => "snowball",
            ItemKind::Coal => "coal",
            ItemKind::Carrot => "carrot",
            ItemKind::Hat => "hat",
            ItemKind::Scarf => "scarf",
        }
    }

    fn slot(&self) -> usize {
        match self {
            ItemKind::Snowball => 0,
            ItemKind::Coal => 1,
            ItemKind::Carrot => 2,
            ItemKind::Hat => 3,
            ItemKind::Scarf => 4,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type ItemId = u32;

/// A falling item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    /// Horizontal position (percent), fixed at spawn
    pub x: f32,
    /// Vertical position (percent), grows every physics tick
    pub y: f32,
    /// Per-tick fall increment
    pub speed: f32,
}

impl Item {
    pub fn in_collect_band(&self) -> bool {
        self.y >= AUTO_COLLECT_TOP && self.y <= AUTO_COLLECT_BOTTOM
    }

    pub fn is_gone(&self) -> bool {
        self.y > DESPAWN_Y
    }
}

/// Parts collected for the snowman under construction.
///
/// Ordered parts can only be set in build order; the scarf is independent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnowmanProgress {
    ordered: [bool; 4],
    scarf: bool,
}

impl SnowmanProgress {
    pub fn has(&self, kind: ItemKind) -> bool {
        match kind {
            ItemKind::Scarf => self.scarf,
            _ => self.ordered[kind.slot()],
        }
    }

    pub fn has_scarf(&self) -> bool {
        self.scarf
    }

    /// First ordered part not yet collected
    pub fn next_needed(&self) -> Option<ItemKind> {
        ItemKind::ORDERED
            .iter()
            .zip(self.ordered.iter())
            .find(|(_, done)| !**done)
            .map(|(kind, _)| *kind)
    }

    /// Set a part if the build order allows it. Returns whether anything changed.
    pub fn mark(&mut self, kind: ItemKind) -> bool {
        if kind == ItemKind::BONUS {
            let changed = !self.scarf;
            self.scarf = true;
            return changed;
        }
        if self.next_needed() != Some(kind) {
            return false;
        }
        self.ordered[kind.slot()] = true;
        true
    }

    pub fn is_complete(&self) -> bool {
        self.ordered.iter().all(|done| *done)
    }

    /// Number of ordered parts in place
    pub fn parts_built(&self) -> usize {
        self.ordered.iter().filter(|done| **done).count()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// No later part is set while an earlier one is missing
    pub fn is_ordered(&self) -> bool {
        self.ordered.windows(2).all(|w| w[0] || !w[1])
    }
}

/// On-screen count per item kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemCounts([u32; 5]);

impl ItemCounts {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a Item>) -> Self {
        let mut counts = Self::default();
        for item in items {
            counts.add(item.kind);
        }
        counts
    }

    pub fn add(&mut self, kind: ItemKind) {
        self.0[kind.slot()] += 1;
    }

    pub fn get(&self, kind: ItemKind) -> u32 {
        self.0[kind.slot()]
    }

    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }
}

/// Current phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Not started yet
    Idle,
    /// Timer running, items falling
    Playing,
    /// Out of lives; waits for restart
    GameOver,
}

/// What a wrong item costs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PenaltyPolicy {
    /// Subtract seconds from the timer (floored at zero)
    #[default]
    TimePenalty,
    /// Lose a life; zero lives ends the game
    LoseLife,
}

impl PenaltyPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyPolicy::TimePenalty => "time",
            PenaltyPolicy::LoseLife => "life",
        }
    }
}

impl FromStr for PenaltyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "time" | "time-penalty" => Ok(PenaltyPolicy::TimePenalty),
            "life" | "lives" | "lose-life" => Ok(PenaltyPolicy::LoseLife),
            other => Err(format!("unknown penalty policy '{other}' (expected time or life)")),
        }
    }
}

/// Things that happened during a step, drained by the driver and UI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    Spawned { id: ItemId, kind: ItemKind },
    PartCollected { kind: ItemKind },
    BonusCollected,
    SnowmanCompleted { points: u64, combo: u32 },
    WrongItem { kind: ItemKind },
    ItemMissed { id: ItemId, kind: ItemKind },
    LifeLost { lives_left: u32 },
    GameOver { score: u64 },
}

/// The pair handed to score submission once a session ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    pub score: u64,
    pub difficulty: Difficulty,
}

/// Complete session state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub difficulty: Difficulty,
    pub penalty: PenaltyPolicy,
    pub phase: GamePhase,
    pub score: u64,
    pub lives: u32,
    /// Snowmen completed in a row without a wrong item
    pub combo: u32,
    /// Seconds left on the countdown
    pub timer_secs: u32,
    pub snowman: SnowmanProgress,
    /// Live items, in spawn order
    pub items: Vec<Item>,
    /// Penalty visual, cleared by the driver after a fixed delay
    pub penalty_flash: bool,
    /// Bumped every time the flash is raised
    pub flash_serial: u32,
    /// Snowmen completed this session
    pub snowmen_built: u32,
    #[serde(skip)]
    pub events: Vec<GameEvent>,
    next_id: ItemId,
}

impl GameState {
    /// Create an idle session
    pub fn new(difficulty: Difficulty, penalty: PenaltyPolicy) -> Self {
        Self {
            difficulty,
            penalty,
            phase: GamePhase::Idle,
            score: 0,
            lives: INITIAL_LIVES,
            combo: 0,
            timer_secs: TIMER_DURATION_SECS,
            snowman: SnowmanProgress::default(),
            items: Vec::new(),
            penalty_flash: false,
            flash_serial: 0,
            snowmen_built: 0,
            events: Vec::new(),
            next_id: 0,
        }
    }

    /// Reset every counter and enter `Playing`. Also used for restart.
    pub fn start(&mut self) {
        *self = Self {
            phase: GamePhase::Playing,
            ..Self::new(self.difficulty, self.penalty)
        };
        log::info!(
            "Session started ({}, {} penalty)",
            self.difficulty.as_str(),
            self.penalty.as_str()
        );
    }

    pub fn is_playing(&self) -> bool {
        self.phase == GamePhase::Playing
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    /// Allocate a new item ID
    pub fn next_item_id(&mut self) -> ItemId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Add a falling item at the top of the screen
    pub fn spawn_item(&mut self, kind: ItemKind, x: f32, speed: f32) -> ItemId {
        let id = self.next_item_id();
        self.items.push(Item {
            id,
            kind,
            x,
            y: SPAWN_Y,
            speed,
        });
        self.events.push(GameEvent::Spawned { id, kind });
        id
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Remove a live item, returning it if it was there
    pub fn take_item(&mut self, id: ItemId) -> Option<Item> {
        let index = self.items.iter().position(|item| item.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn next_needed(&self) -> Option<ItemKind> {
        self.snowman.next_needed()
    }

    pub fn item_counts(&self) -> ItemCounts {
        ItemCounts::from_items(&self.items)
    }

    pub fn raise_flash(&mut self) {
        self.penalty_flash = true;
        self.flash_serial = self.flash_serial.wrapping_add(1);
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// The result to hand to score submission, once the session is over
    pub fn final_score(&self) -> Option<FinalScore> {
        self.is_game_over().then_some(FinalScore {
            score: self.score,
            difficulty: self.difficulty,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_enforces_order() {
        let mut progress = SnowmanProgress::default();
        assert_eq!(progress.next_needed(), Some(ItemKind::Snowball));
        assert!(!progress.mark(ItemKind::Carrot));
        assert!(progress.mark(ItemKind::Snowball));
        assert!(!progress.mark(ItemKind::Snowball));
        assert_eq!(progress.next_needed(), Some(ItemKind::Coal));
        assert!(progress.is_ordered());
        assert_eq!(progress.parts_built(), 1);
    }

    #[test]
    fn test_progress_scarf_is_independent() {
        let mut progress = SnowmanProgress::default();
        assert!(progress.mark(ItemKind::Scarf));
        assert!(!progress.mark(ItemKind::Scarf));
        assert!(progress.has_scarf());
        assert_eq!(progress.next_needed(), Some(ItemKind::Snowball));
    }

    #[test]
    fn test_progress_complete() {
        let mut progress = SnowmanProgress::default();
        for kind in ItemKind::ORDERED {
            assert!(progress.mark(kind));
        }
        assert!(progress.is_complete());
        assert_eq!(progress.next_needed(), None);
        progress.reset();
        assert_eq!(progress, SnowmanProgress::default());
    }

    #[test]
    fn test_spawn_ids_are_unique() {
        let mut state = GameState::new(Difficulty::Easy, PenaltyPolicy::default());
        state.start();
        let a = state.spawn_item(ItemKind::Coal, 50.0, 0.2);
        let b = state.spawn_item(ItemKind::Coal, 50.0, 0.2);
        assert_ne!(a, b);
        assert_eq!(state.item_counts().get(ItemKind::Coal), 2);
        assert_eq!(state.item(a).map(|i| i.y), Some(SPAWN_Y));
    }

    #[test]
    fn test_start_resets_session() {
        let mut state = GameState::new(Difficulty::Hard, PenaltyPolicy::LoseLife);
        state.start();
        state.score = 9;
        state.lives = 1;
        state.spawn_item(ItemKind::Hat, 20.0, 0.5);
        state.phase = GamePhase::GameOver;
        assert_eq!(state.final_score().map(|f| f.score), Some(9));

        state.start();
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.score, 0);
        assert_eq!(state.lives, INITIAL_LIVES);
        assert!(state.items.is_empty());
        assert_eq!(state.difficulty, Difficulty::Hard);
        assert_eq!(state.penalty, PenaltyPolicy::LoseLife);
        assert_eq!(state.final_score(), None);
    }

    #[test]
    fn test_parse_penalty() {
        assert_eq!("time".parse::<PenaltyPolicy>(), Ok(PenaltyPolicy::TimePenalty));
        assert_eq!("LIFE".parse::<PenaltyPolicy>(), Ok(PenaltyPolicy::LoseLife));
        assert!("none".parse::<PenaltyPolicy>().is_err());
    }
}
