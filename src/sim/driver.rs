//! Game loop driver
//!
//! Turns elapsed wall-clock time into physics ticks, spawns and countdown
//! seconds. Every periodic trigger is a scheduler handle owned here, and all
//! of them are cancelled the moment the session stops playing.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::scheduler::{Scheduler, TimerHandle, Trigger};
use super::spawn::{SpawnContext, choose_spawn_kind};
use super::state::{GameEvent, GamePhase, GameState, ItemId, ItemKind, PenaltyPolicy};
use super::tick::{CollectOutcome, collect, countdown, tick};
use crate::consts::*;
use crate::tuning::{Difficulty, DifficultyProfile};

/// Input gathered during one frame
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    /// Items the player clicked, in click order
    pub taps: Vec<ItemId>,
    /// Demo mode - the loop picks items itself
    pub autopilot: bool,
}

/// Delay until the next spawn. Sparse screens get items sooner.
pub fn spawn_delay(profile: &DifficultyProfile, on_screen: usize, rng: &mut impl Rng) -> u64 {
    let delay = rng.random_range(profile.spawn_interval_min..=profile.spawn_interval_max);
    if on_screen < MIN_ITEMS_ON_SCREEN {
        (delay as f64 * LOW_ITEM_INTERVAL_SCALE) as u64
    } else {
        delay
    }
}

/// Owns a session and everything scheduled against it
#[derive(Debug, Clone)]
pub struct GameLoop {
    state: GameState,
    scheduler: Scheduler,
    rng: Pcg32,
    seed: u64,
    physics: Option<TimerHandle>,
    countdown: Option<TimerHandle>,
    spawn: Option<TimerHandle>,
    flash_clear: Option<TimerHandle>,
    seen_flash: u32,
}

impl GameLoop {
    /// Create an idle loop. The seed makes spawns reproducible.
    pub fn new(difficulty: Difficulty, penalty: PenaltyPolicy, seed: u64) -> Self {
        Self {
            state: GameState::new(difficulty, penalty),
            scheduler: Scheduler::new(),
            rng: Pcg32::seed_from_u64(seed),
            seed,
            physics: None,
            countdown: None,
            spawn: None,
            flash_clear: None,
            seen_flash: 0,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Virtual time since the loop was created (ms)
    pub fn clock_ms(&self) -> u64 {
        self.scheduler.now()
    }

    /// Whether the periodic triggers are armed
    pub fn is_running(&self) -> bool {
        [self.physics, self.countdown]
            .into_iter()
            .all(|h| h.is_some_and(|h| self.scheduler.is_pending(h)))
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending_count()
    }

    /// Begin a session: reset state, arm the timers, spawn the first item
    pub fn start(&mut self) {
        self.teardown();
        self.state.start();
        self.seen_flash = self.state.flash_serial;
        self.physics = Some(self.scheduler.every(Trigger::Physics, PHYSICS_TICK_MS));
        self.countdown = Some(self.scheduler.every(Trigger::Countdown, COUNTDOWN_TICK_MS));
        self.spawn_next();
    }

    /// Start over with the same difficulty and penalty policy
    pub fn restart(&mut self) {
        log::info!("Restarting after score {}", self.state.score);
        self.start();
    }

    /// Leave play without finishing (menu, quit)
    pub fn stop(&mut self) {
        self.teardown();
        if self.state.is_playing() {
            self.state.phase = GamePhase::Idle;
        }
    }

    /// Change difficulty for the next session. Ignored mid-game.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        if !self.state.is_playing() {
            self.state.difficulty = difficulty;
        }
    }

    pub fn set_penalty(&mut self, penalty: PenaltyPolicy) {
        if !self.state.is_playing() {
            self.state.penalty = penalty;
        }
    }

    /// Collect an item the player clicked
    pub fn tap(&mut self, id: ItemId) -> CollectOutcome {
        let Some(kind) = self.state.item(id).map(|item| item.kind) else {
            return CollectOutcome::Ignored;
        };
        let outcome = collect(&mut self.state, id, kind);
        self.after_step();
        outcome
    }

    /// Item the demo player would click: the lowest visible copy of the
    /// needed part, else a scarf if the snowman has none yet
    pub fn autopilot_target(&self) -> Option<ItemId> {
        let lowest = |kind: ItemKind| {
            self.state
                .items
                .iter()
                .filter(|item| item.kind == kind && item.y >= 0.0)
                .max_by(|a, b| a.y.total_cmp(&b.y))
                .map(|item| item.id)
        };
        self.state
            .next_needed()
            .and_then(lowest)
            .or_else(|| {
                (!self.state.snowman.has_scarf())
                    .then(|| lowest(ItemKind::BONUS))
                    .flatten()
            })
    }

    /// Advance the clock by `elapsed_ms`, applying input first
    pub fn update(&mut self, elapsed_ms: u64, input: &FrameInput) {
        if !self.state.is_playing() {
            return;
        }

        for id in &input.taps {
            self.tap(*id);
        }
        if input.autopilot {
            if let Some(id) = self.autopilot_target() {
                self.tap(id);
            }
        }

        let target = self.scheduler.now() + elapsed_ms;
        while self.state.is_playing() {
            let Some((handle, trigger)) = self.scheduler.pop_due(target) else {
                break;
            };
            self.fire(handle, trigger);
        }
        self.scheduler.advance_to(target);
        self.after_step();
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.state.drain_events()
    }

    fn fire(&mut self, handle: TimerHandle, trigger: Trigger) {
        match trigger {
            Trigger::Physics => tick(&mut self.state),
            Trigger::Countdown => countdown(&mut self.state),
            Trigger::Spawn => {
                if self.spawn == Some(handle) {
                    self.spawn = None;
                }
                self.spawn_next();
            }
            Trigger::ClearFlash => {
                self.state.penalty_flash = false;
                self.flash_clear = None;
            }
        }
        self.after_step();
    }

    /// Spawn one item unless the screen is full, then re-arm the spawn timer
    fn spawn_next(&mut self) {
        let profile = self.state.difficulty.profile();
        if self.state.items.len() < MAX_ITEMS_ON_SCREEN {
            let ctx = SpawnContext::from_state(&self.state);
            let kind = choose_spawn_kind(&ctx, &mut self.rng);
            let x = self.rng.random_range(SPAWN_X_MIN..SPAWN_X_MAX);
            let speed = self
                .rng
                .random_range(profile.fall_speed_min..profile.fall_speed_max);
            let id = self.state.spawn_item(kind, x, speed);
            log::debug!("Spawned {} #{} at x={:.1} speed={:.2}", kind, id, x, speed);
        }

        let delay = spawn_delay(profile, self.state.items.len(), &mut self.rng);
        self.spawn = Some(self.scheduler.after(Trigger::Spawn, delay));
    }

    /// Keep the flash timer in step with the state and stop everything once
    /// the session has left play
    fn after_step(&mut self) {
        if !self.state.is_playing() {
            self.teardown();
            return;
        }
        if self.state.flash_serial != self.seen_flash {
            self.seen_flash = self.state.flash_serial;
            if let Some(old) = self.flash_clear.take() {
                self.scheduler.cancel(old);
            }
            self.flash_clear = Some(self.scheduler.after(Trigger::ClearFlash, PENALTY_FLASH_MS));
        }
    }

    fn teardown(&mut self) {
        self.scheduler.cancel_all();
        self.physics = None;
        self.countdown = None;
        self.spawn = None;
        self.flash_clear = None;
        self.state.penalty_flash = false;
    }
}
