//! Session simulation module
//!
//! All gameplay logic lives here. This module stays free of I/O:
//! - Time only advances through the scheduler's virtual clock
//! - Seeded RNG only
//! - Items are kept in spawn order
//! - No rendering or platform dependencies

pub mod driver;
pub mod scheduler;
pub mod spawn;
pub mod state;
pub mod tick;

pub use driver::{FrameInput, GameLoop, spawn_delay};
pub use scheduler::{Scheduler, TimerHandle, Trigger};
pub use spawn::{SpawnContext, choose_spawn_kind};
pub use state::{
    FinalScore, GameEvent, GamePhase, GameState, Item, ItemCounts, ItemId, ItemKind,
    PenaltyPolicy, SnowmanProgress,
};
pub use tick::{CollectOutcome, collect, countdown, tick};
