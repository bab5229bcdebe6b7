//! Adaptive spawn weighting
//!
//! Biases spawns toward the part the player needs next, then nudges the odds
//! with timer pressure, remaining lives, combo streak and what is already on
//! screen. All randomness comes through the caller's RNG.

use rand::Rng;

use super::state::{GameState, ItemCounts, ItemKind};
use crate::tuning::{Difficulty, SpawnWeights};

/// Chance of boosting the scarf weight when none is on screen
pub const SCARF_BOOST_CHANCE: f64 = 0.3;
/// Copies on screen at which a kind counts as saturated
pub const SATURATION: u32 = 2;

/// Inputs to the spawn decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnContext {
    pub next_needed: Option<ItemKind>,
    pub counts: ItemCounts,
    pub seconds_remaining: u32,
    pub combo: u32,
    pub lives: u32,
    pub difficulty: Difficulty,
}

impl SpawnContext {
    pub fn from_state(state: &GameState) -> Self {
        Self {
            next_needed: state.next_needed(),
            counts: state.item_counts(),
            seconds_remaining: state.timer_secs,
            combo: state.combo,
            lives: state.lives,
            difficulty: state.difficulty,
        }
    }
}

impl SpawnWeights {
    /// Adjusted, clamped and normalized weights for a context.
    ///
    /// `scarf_boost` is the outcome of the random scarf roll; it only applies
    /// when no scarf is on screen.
    pub fn for_context(ctx: &SpawnContext, scarf_boost: bool) -> Self {
        let mut w = ctx.difficulty.profile().base_weights;

        // Low on time: help out
        if ctx.seconds_remaining <= 10 {
            w.needed += 0.2;
            w.wrong -= 0.1;
            w.bonus -= 0.1;
        }

        // Low on lives: help out more
        if ctx.lives <= 2 {
            w.needed += 0.15;
            w.wrong -= 0.15;
        }

        // On a streak: push back
        if ctx.combo >= 3 {
            w.needed -= 0.1;
            w.wrong += 0.05;
            w.bonus += 0.05;
        }

        // Don't flood the screen with the needed part
        if let Some(needed) = ctx.next_needed {
            if ctx.counts.get(needed) >= SATURATION {
                w.needed -= 0.2;
                w.wrong += 0.1;
                w.bonus += 0.1;
            }
        }

        if scarf_boost && ctx.counts.get(ItemKind::BONUS) == 0 {
            w.bonus += 0.1;
            w.needed -= 0.05;
            w.wrong -= 0.05;
        }

        if ctx.next_needed.is_none() {
            w.needed = 0.0;
        }

        w.normalized()
    }

    /// Clamp negatives to zero and scale to a sum of one
    pub fn normalized(self) -> Self {
        let needed = self.needed.max(0.0);
        let bonus = self.bonus.max(0.0);
        let wrong = self.wrong.max(0.0);
        let total = needed + bonus + wrong;
        if total <= f64::EPSILON {
            return Self {
                needed: 0.0,
                bonus: 0.0,
                wrong: 1.0,
            };
        }
        Self {
            needed: needed / total,
            bonus: bonus / total,
            wrong: wrong / total,
        }
    }
}

/// Pick the kind of the next spawned item
pub fn choose_spawn_kind(ctx: &SpawnContext, rng: &mut impl Rng) -> ItemKind {
    let scarf_boost =
        ctx.counts.get(ItemKind::BONUS) == 0 && rng.random_bool(SCARF_BOOST_CHANCE);
    let weights = SpawnWeights::for_context(ctx, scarf_boost);
    let draw: f64 = rng.random();
    pick_kind(ctx, &weights, draw, rng)
}

/// Map a uniform draw in [0, 1) onto the weight bands
pub fn pick_kind(
    ctx: &SpawnContext,
    weights: &SpawnWeights,
    draw: f64,
    rng: &mut impl Rng,
) -> ItemKind {
    if let Some(needed) = ctx.next_needed {
        if draw < weights.needed {
            return needed;
        }
    }
    if draw < weights.needed + weights.bonus {
        return ItemKind::BONUS;
    }
    wrong_kind(ctx, rng)
}

/// An ordered part other than the needed one, preferring unsaturated kinds
pub fn wrong_kind(ctx: &SpawnContext, rng: &mut impl Rng) -> ItemKind {
    let candidates: Vec<ItemKind> = ItemKind::ORDERED
        .into_iter()
        .filter(|kind| Some(*kind) != ctx.next_needed)
        .collect();
    let fresh: Vec<ItemKind> = candidates
        .iter()
        .copied()
        .filter(|kind| ctx.counts.get(*kind) < SATURATION)
        .collect();
    let pool = if fresh.is_empty() { &candidates } else { &fresh };
    pool[rng.random_range(0..pool.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn calm_context(difficulty: Difficulty) -> SpawnContext {
        let mut counts = ItemCounts::default();
        // A scarf on screen keeps the random scarf roll out of play
        counts.add(ItemKind::Scarf);
        SpawnContext {
            next_needed: Some(ItemKind::Snowball),
            counts,
            seconds_remaining: 30,
            combo: 0,
            lives: 5,
            difficulty,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_base_weights_without_adjustments() {
        let w = SpawnWeights::for_context(&calm_context(Difficulty::Easy), false);
        assert!(approx(w.needed, 0.7));
        assert!(approx(w.bonus, 0.15));
        assert!(approx(w.wrong, 0.15));
    }

    #[test]
    fn test_timer_pressure() {
        let ctx = SpawnContext {
            seconds_remaining: 10,
            ..calm_context(Difficulty::Easy)
        };
        let w = SpawnWeights::for_context(&ctx, false);
        assert!(approx(w.needed, 0.9));
        assert!(approx(w.bonus, 0.05));
        assert!(approx(w.wrong, 0.05));
    }

    #[test]
    fn test_negative_weights_clamp_before_normalizing() {
        // easy: needed .7+.2+.15, bonus .15-.1, wrong .15-.1-.15 -> clamped to 0
        let ctx = SpawnContext {
            seconds_remaining: 5,
            lives: 2,
            ..calm_context(Difficulty::Easy)
        };
        let w = SpawnWeights::for_context(&ctx, false);
        assert_eq!(w.wrong, 0.0);
        assert!(approx(w.needed, 1.05 / 1.1));
        assert!(approx(w.bonus, 0.05 / 1.1));
    }

    #[test]
    fn test_saturated_needed_part() {
        let mut ctx = calm_context(Difficulty::Medium);
        ctx.counts.add(ItemKind::Snowball);
        ctx.counts.add(ItemKind::Snowball);
        let w = SpawnWeights::for_context(&ctx, false);
        assert!(approx(w.needed, 0.4));
        assert!(approx(w.bonus, 0.3));
        assert!(approx(w.wrong, 0.3));
    }

    #[test]
    fn test_combo_and_scarf_boost() {
        let ctx = SpawnContext {
            combo: 3,
            counts: ItemCounts::default(),
            ..calm_context(Difficulty::Hard)
        };
        let w = SpawnWeights::for_context(&ctx, true);
        // .5-.1-.05, .25+.05+.1, .25+.05-.05
        assert!(approx(w.needed, 0.35));
        assert!(approx(w.bonus, 0.4));
        assert!(approx(w.wrong, 0.25));
    }

    #[test]
    fn test_no_needed_part_renormalizes_over_bonus_and_wrong() {
        let ctx = SpawnContext {
            next_needed: None,
            ..calm_context(Difficulty::Easy)
        };
        let w = SpawnWeights::for_context(&ctx, false);
        assert_eq!(w.needed, 0.0);
        assert!(approx(w.bonus, 0.5));
        assert!(approx(w.wrong, 0.5));
    }

    #[test]
    fn test_pick_kind_bands() {
        let ctx = calm_context(Difficulty::Easy);
        let w = SpawnWeights::for_context(&ctx, false);
        let mut rng = Pcg32::seed_from_u64(1);
        assert_eq!(pick_kind(&ctx, &w, 0.0, &mut rng), ItemKind::Snowball);
        assert_eq!(pick_kind(&ctx, &w, 0.69, &mut rng), ItemKind::Snowball);
        assert_eq!(pick_kind(&ctx, &w, 0.75, &mut rng), ItemKind::Scarf);
        let wrong = pick_kind(&ctx, &w, 0.9, &mut rng);
        assert_ne!(wrong, ItemKind::Snowball);
        assert_ne!(wrong, ItemKind::Scarf);
    }

    #[test]
    fn test_wrong_kind_avoids_saturated_parts() {
        let mut ctx = calm_context(Difficulty::Easy);
        for _ in 0..2 {
            ctx.counts.add(ItemKind::Coal);
            ctx.counts.add(ItemKind::Carrot);
        }
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(wrong_kind(&ctx, &mut rng), ItemKind::Hat);
        }
    }

    #[test]
    fn test_wrong_kind_falls_back_when_all_saturated() {
        let mut ctx = calm_context(Difficulty::Easy);
        for kind in ItemKind::ORDERED {
            ctx.counts.add(kind);
            ctx.counts.add(kind);
        }
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..100 {
            let kind = wrong_kind(&ctx, &mut rng);
            assert!(matches!(kind, ItemKind::Coal | ItemKind::Carrot | ItemKind::Hat));
        }
    }

    #[test]
    fn test_needed_frequency_matches_weight() {
        let ctx = calm_context(Difficulty::Easy);
        let mut rng = Pcg32::seed_from_u64(42);
        let trials = 20_000;
        let hits = (0..trials)
            .filter(|_| choose_spawn_kind(&ctx, &mut rng) == ItemKind::Snowball)
            .count();
        let freq = hits as f64 / trials as f64;
        assert!((freq - 0.7).abs() < 0.02, "needed frequency {freq}");
    }

    proptest! {
        #[test]
        fn prop_weights_form_a_distribution(
            seconds in 0u32..60,
            combo in 0u32..10,
            lives in 0u32..6,
            needed_on_screen in 0u32..4,
            scarf_boost in any::<bool>(),
            has_needed in any::<bool>(),
            tier in 0u8..3,
        ) {
            let mut counts = ItemCounts::default();
            for _ in 0..needed_on_screen {
                counts.add(ItemKind::Coal);
            }
            let ctx = SpawnContext {
                next_needed: has_needed.then_some(ItemKind::Coal),
                counts,
                seconds_remaining: seconds,
                combo,
                lives,
                difficulty: Difficulty::from_index(tier).unwrap_or_default(),
            };
            let w = SpawnWeights::for_context(&ctx, scarf_boost);
            prop_assert!(w.needed >= 0.0 && w.bonus >= 0.0 && w.wrong >= 0.0);
            prop_assert!((w.needed + w.bonus + w.wrong - 1.0).abs() < 1e-9);
            if !has_needed {
                prop_assert_eq!(w.needed, 0.0);
            }
        }
    }
}
