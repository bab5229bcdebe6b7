//! Session transitions
//!
//! Physics step, item collection and the countdown. Each function mutates
//! the state in place and records what happened in `state.events`.

use super::state::{GameEvent, GamePhase, GameState, ItemId, ItemKind, PenaltyPolicy};
use crate::consts::*;

/// Result of a collect event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// The item was not live (already collected or gone)
    Ignored,
    /// Next ordered part placed
    Placed,
    /// Scarf picked up
    Bonus,
    /// Last ordered part placed; snowman scored
    Completed { points: u64 },
    /// Out-of-order part; penalty applied
    Wrong,
    /// Nothing was expected; item dropped
    Discarded,
}

/// Collect a live item. Repeated calls with the same id do nothing.
pub fn collect(state: &mut GameState, id: ItemId, kind: ItemKind) -> CollectOutcome {
    if !state.is_playing() || state.take_item(id).is_none() {
        return CollectOutcome::Ignored;
    }

    let Some(expected) = state.next_needed() else {
        return CollectOutcome::Discarded;
    };

    if kind == expected {
        state.snowman.mark(kind);
        state.events.push(GameEvent::PartCollected { kind });
        if !state.snowman.is_complete() {
            return CollectOutcome::Placed;
        }

        let points = if state.snowman.has_scarf() { 2 } else { 1 };
        state.score += points;
        state.combo += 1;
        state.snowmen_built += 1;
        state.timer_secs += COMPLETION_BONUS_SECS;
        state.snowman.reset();
        state.events.push(GameEvent::SnowmanCompleted {
            points,
            combo: state.combo,
        });
        log::debug!(
            "Snowman complete: +{} (score {}, combo {})",
            points,
            state.score,
            state.combo
        );
        CollectOutcome::Completed { points }
    } else if kind == ItemKind::BONUS {
        state.snowman.mark(kind);
        state.events.push(GameEvent::BonusCollected);
        CollectOutcome::Bonus
    } else {
        apply_wrong_item(state, kind);
        CollectOutcome::Wrong
    }
}

fn apply_wrong_item(state: &mut GameState, kind: ItemKind) {
    state.snowman.reset();
    state.combo = 0;
    state.events.push(GameEvent::WrongItem { kind });

    match state.penalty {
        PenaltyPolicy::TimePenalty => {
            state.timer_secs = state.timer_secs.saturating_sub(WRONG_ITEM_PENALTY_SECS);
        }
        PenaltyPolicy::LoseLife => lose_life(state),
    }

    state.raise_flash();
    log::debug!("Wrong item {} (timer {}s, lives {})", kind, state.timer_secs, state.lives);
}

fn lose_life(state: &mut GameState) {
    state.lives = state.lives.saturating_sub(1);
    state.events.push(GameEvent::LifeLost {
        lives_left: state.lives,
    });
    if state.lives == 0 {
        state.phase = GamePhase::GameOver;
        state.events.push(GameEvent::GameOver { score: state.score });
        log::info!("Game over - final score {}", state.score);
    }
}

/// Advance one physics step: fall, auto-collect, despawn
pub fn tick(state: &mut GameState) {
    if !state.is_playing() {
        return;
    }

    for item in &mut state.items {
        item.y += item.speed;
    }

    // Snapshot first; collecting removes items
    let in_band: Vec<(ItemId, ItemKind)> = state
        .items
        .iter()
        .filter(|item| item.in_collect_band())
        .map(|item| (item.id, item.kind))
        .collect();
    for (id, kind) in in_band {
        collect(state, id, kind);
    }

    let (gone, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.items)
        .into_iter()
        .partition(|item| item.is_gone());
    state.items = kept;
    for item in gone {
        state.events.push(GameEvent::ItemMissed {
            id: item.id,
            kind: item.kind,
        });
    }
}

/// One second off the clock. Running out costs a life and refills the timer.
pub fn countdown(state: &mut GameState) {
    if !state.is_playing() {
        return;
    }

    state.timer_secs = state.timer_secs.saturating_sub(1);
    if state.timer_secs > 0 {
        return;
    }

    state.raise_flash();
    lose_life(state);
    log::info!("Time's up - {} lives left", state.lives);
    if state.is_playing() {
        state.timer_secs = TIMER_DURATION_SECS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::SnowmanProgress;
    use crate::tuning::Difficulty;
    use proptest::prelude::*;

    fn playing(penalty: PenaltyPolicy) -> GameState {
        let mut state = GameState::new(Difficulty::Easy, penalty);
        state.start();
        state
    }

    fn give(state: &mut GameState, kind: ItemKind) -> CollectOutcome {
        let id = state.spawn_item(kind, 50.0, 0.2);
        collect(state, id, kind)
    }

    #[test]
    fn test_full_snowman_in_order() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        assert_eq!(state.score, 0);
        assert_eq!(state.lives, 5);
        assert_eq!(state.timer_secs, 30);

        assert_eq!(give(&mut state, ItemKind::Snowball), CollectOutcome::Placed);
        assert_eq!(give(&mut state, ItemKind::Coal), CollectOutcome::Placed);
        assert_eq!(give(&mut state, ItemKind::Carrot), CollectOutcome::Placed);
        assert_eq!(
            give(&mut state, ItemKind::Hat),
            CollectOutcome::Completed { points: 1 }
        );

        assert_eq!(state.score, 1);
        assert_eq!(state.timer_secs, 45);
        assert_eq!(state.combo, 1);
        assert_eq!(state.snowman, SnowmanProgress::default());
        assert!(state.items.is_empty());
    }

    #[test]
    fn test_scarf_doubles_completion() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        give(&mut state, ItemKind::Snowball);
        assert_eq!(give(&mut state, ItemKind::Scarf), CollectOutcome::Bonus);
        assert_eq!(give(&mut state, ItemKind::Scarf), CollectOutcome::Bonus);
        assert_eq!(state.score, 0);
        give(&mut state, ItemKind::Coal);
        give(&mut state, ItemKind::Carrot);
        assert_eq!(
            give(&mut state, ItemKind::Hat),
            CollectOutcome::Completed { points: 2 }
        );
        assert_eq!(state.score, 2);
        assert!(!state.snowman.has_scarf());
    }

    #[test]
    fn test_wrong_item_time_penalty() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        state.combo = 4;
        assert_eq!(give(&mut state, ItemKind::Carrot), CollectOutcome::Wrong);
        assert_eq!(state.combo, 0);
        assert_eq!(state.timer_secs, 20);
        assert_eq!(state.lives, 5);
        assert_eq!(state.snowman, SnowmanProgress::default());
        assert!(state.penalty_flash);
    }

    #[test]
    fn test_time_penalty_floors_at_zero() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        state.timer_secs = 5;
        give(&mut state, ItemKind::Hat);
        assert_eq!(state.timer_secs, 0);
    }

    #[test]
    fn test_wrong_item_lose_life() {
        let mut state = playing(PenaltyPolicy::LoseLife);
        give(&mut state, ItemKind::Snowball);
        assert_eq!(give(&mut state, ItemKind::Carrot), CollectOutcome::Wrong);
        assert_eq!(state.lives, 4);
        assert_eq!(state.timer_secs, 30);
        assert_eq!(state.combo, 0);
        assert_eq!(state.snowman.parts_built(), 0);
    }

    #[test]
    fn test_lose_life_policy_ends_game() {
        let mut state = playing(PenaltyPolicy::LoseLife);
        state.lives = 1;
        give(&mut state, ItemKind::Hat);
        assert_eq!(state.lives, 0);
        assert_eq!(state.phase, GamePhase::GameOver);
        assert!(state.events.contains(&GameEvent::GameOver { score: 0 }));
    }

    #[test]
    fn test_wrong_item_resets_scarf_too() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        give(&mut state, ItemKind::Scarf);
        give(&mut state, ItemKind::Snowball);
        give(&mut state, ItemKind::Snowball);
        assert_eq!(state.snowman, SnowmanProgress::default());
    }

    #[test]
    fn test_double_collect_is_ignored() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        let id = state.spawn_item(ItemKind::Carrot, 40.0, 0.3);
        assert_eq!(collect(&mut state, id, ItemKind::Carrot), CollectOutcome::Wrong);
        let (score, combo, timer) = (state.score, state.combo, state.timer_secs);
        assert_eq!(collect(&mut state, id, ItemKind::Carrot), CollectOutcome::Ignored);
        assert_eq!((state.score, state.combo, state.timer_secs), (score, combo, timer));
        assert!(state.item(id).is_none());
    }

    #[test]
    fn test_collect_outside_play_is_ignored() {
        let mut state = GameState::new(Difficulty::Easy, PenaltyPolicy::TimePenalty);
        let id = state.spawn_item(ItemKind::Snowball, 40.0, 0.3);
        assert_eq!(collect(&mut state, id, ItemKind::Snowball), CollectOutcome::Ignored);
        assert_eq!(state.snowman.parts_built(), 0);
    }

    #[test]
    fn test_tick_moves_items() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        let id = state.spawn_item(ItemKind::Snowball, 40.0, 0.5);
        tick(&mut state);
        tick(&mut state);
        let y = state.item(id).map(|i| i.y);
        assert_eq!(y, Some(SPAWN_Y + 1.0));
    }

    #[test]
    fn test_tick_auto_collects_in_band() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        let id = state.spawn_item(ItemKind::Snowball, 40.0, 1.0);
        state.items[0].y = AUTO_COLLECT_TOP - 0.5;
        tick(&mut state);
        assert!(state.item(id).is_none());
        assert!(state.snowman.has(ItemKind::Snowball));
    }

    #[test]
    fn test_tick_auto_collect_snapshot_in_spawn_order() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        for kind in ItemKind::ORDERED {
            state.spawn_item(kind, 40.0, 1.0);
        }
        for item in &mut state.items {
            item.y = AUTO_COLLECT_TOP;
        }
        tick(&mut state);
        assert!(state.items.is_empty());
        assert_eq!(state.score, 1);
        assert_eq!(state.combo, 1);
    }

    #[test]
    fn test_tick_despawns_below_screen() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        let id = state.spawn_item(ItemKind::Hat, 40.0, 12.0);
        state.items[0].y = 90.0;
        state.drain_events();
        tick(&mut state);
        assert!(state.item(id).is_none());
        assert_eq!(state.timer_secs, 30);
        assert_eq!(state.combo, 0);
        assert_eq!(
            state.drain_events(),
            vec![GameEvent::ItemMissed {
                id,
                kind: ItemKind::Hat
            }]
        );
    }

    #[test]
    fn test_countdown_expiry_costs_a_life() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        state.timer_secs = 2;
        countdown(&mut state);
        assert_eq!(state.timer_secs, 1);
        assert_eq!(state.lives, 5);
        countdown(&mut state);
        assert_eq!(state.lives, 4);
        assert_eq!(state.timer_secs, TIMER_DURATION_SECS);
        assert!(state.is_playing());
        assert!(state.penalty_flash);
    }

    #[test]
    fn test_countdown_last_life_ends_game() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        state.lives = 1;
        state.timer_secs = 1;
        state.score = 3;
        countdown(&mut state);
        assert_eq!(state.phase, GamePhase::GameOver);
        assert_eq!(state.lives, 0);
        assert_eq!(state.timer_secs, 0);
        // Frozen afterwards
        countdown(&mut state);
        tick(&mut state);
        assert_eq!(state.timer_secs, 0);
        assert_eq!(state.lives, 0);
        assert_eq!(state.final_score().map(|f| f.score), Some(3));
    }

    #[test]
    fn test_zero_timer_after_penalty_expires_next_second() {
        let mut state = playing(PenaltyPolicy::TimePenalty);
        state.timer_secs = 4;
        give(&mut state, ItemKind::Coal);
        assert_eq!(state.timer_secs, 0);
        countdown(&mut state);
        assert_eq!(state.lives, 4);
        assert_eq!(state.timer_secs, TIMER_DURATION_SECS);
    }

    fn kind_strategy() -> impl Strategy<Value = ItemKind> {
        prop::sample::select(ItemKind::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_progress_stays_ordered(kinds in prop::collection::vec(kind_strategy(), 0..60)) {
            let mut state = playing(PenaltyPolicy::TimePenalty);
            for kind in kinds {
                give(&mut state, kind);
                prop_assert!(state.snowman.is_ordered());
            }
        }

        #[test]
        fn prop_score_tracks_completions(
            cycles in prop::collection::vec(any::<bool>(), 1..10)
        ) {
            let mut state = playing(PenaltyPolicy::TimePenalty);
            let mut expected = 0;
            for (n, with_scarf) in cycles.iter().enumerate() {
                if *with_scarf {
                    give(&mut state, ItemKind::Scarf);
                }
                for kind in ItemKind::ORDERED {
                    give(&mut state, kind);
                }
                expected += if *with_scarf { 2 } else { 1 };
                prop_assert_eq!(state.score, expected);
                prop_assert_eq!(state.combo as usize, n + 1);
            }
        }

        #[test]
        fn prop_second_collect_changes_nothing(kind in kind_strategy(), lead in 0usize..4) {
            let mut state = playing(PenaltyPolicy::LoseLife);
            for part in ItemKind::ORDERED.iter().take(lead) {
                give(&mut state, *part);
            }
            let id = state.spawn_item(kind, 50.0, 0.2);
            collect(&mut state, id, kind);
            let before = (state.score, state.combo, state.timer_secs, state.lives, state.snowman);
            prop_assert_eq!(collect(&mut state, id, kind), CollectOutcome::Ignored);
            let after = (state.score, state.combo, state.timer_secs, state.lives, state.snowman);
            prop_assert_eq!(before, after);
        }
    }
}
