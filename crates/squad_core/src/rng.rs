//! Counter-based deterministic random source.
//!
//! Every draw is a pure function of `(seed, index)`: the seed and the draw
//! index are mixed into a 64-bit state, then a PCG-XSH-RR output permutation
//! turns that state into 32 random bits. The generator therefore has no
//! hidden state beyond [`RandomState`], and restoring `(seed, call_count)`
//! makes the next draw identical to the uninterrupted stream without
//! replaying history.
//!
//! This is the only source of nondeterminism the resolver may consult.

use serde::{Deserialize, Serialize};

const PCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;
const PCG_INCREMENT: u64 = 1_442_695_040_888_963_407;

/// Persisted cursor of a [`DeterministicRng`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RandomState {
    /// Seed the stream was created with.
    pub seed: u64,
    /// Number of draws taken so far.
    pub call_count: u64,
}

/// Seeded random source exposing percentile and dice draws.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    seed: u64,
    call_count: u64,
}

impl DeterministicRng {
    /// Create a generator at the start of the stream for `seed`.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            call_count: 0,
        }
    }

    /// Rebuild a generator from a persisted cursor.
    #[must_use]
    pub const fn from_state(state: RandomState) -> Self {
        Self {
            seed: state.seed,
            call_count: state.call_count,
        }
    }

    /// Current cursor.
    #[must_use]
    pub const fn state(&self) -> RandomState {
        RandomState {
            seed: self.seed,
            call_count: self.call_count,
        }
    }

    /// Move the cursor. The next draw is draw number `state.call_count`.
    pub fn set_state(&mut self, state: RandomState) {
        self.seed = state.seed;
        self.call_count = state.call_count;
    }

    /// Seed the stream was created with.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Number of draws taken so far.
    #[must_use]
    pub const fn call_count(&self) -> u64 {
        self.call_count
    }

    /// Raw 32-bit draw. Advances the cursor by one.
    pub fn next_u32(&mut self) -> u32 {
        let value = value_at(self.seed, self.call_count);
        self.call_count = self.call_count.wrapping_add(1);
        value
    }

    /// Uniform integer in `[1, sides]`. `sides` below 1 is treated as 1.
    pub fn roll(&mut self, sides: u32) -> u32 {
        let sides = sides.max(1);
        (self.next_u32() % sides) + 1
    }

    /// Integer in `[1, 100]`.
    pub fn percentile(&mut self) -> u32 {
        self.roll(100)
    }

    /// Sum of `count` uniform draws in `[1, sides]`, plus `bonus`.
    ///
    /// Draws exactly `count` values from the stream.
    pub fn dice(&mut self, count: u32, sides: u32, bonus: i32) -> i32 {
        let mut total = bonus;
        for _ in 0..count {
            total = total.saturating_add(i32::try_from(self.roll(sides)).unwrap_or(i32::MAX));
        }
        total
    }
}

/// The `index`-th value of the stream for `seed`.
#[must_use]
pub fn value_at(seed: u64, index: u64) -> u32 {
    pcg_output(
        mix(seed, index)
            .wrapping_mul(PCG_MULTIPLIER)
            .wrapping_add(PCG_INCREMENT),
    )
}

/// Avalanche `(seed, index)` into a single 64-bit state.
#[inline]
fn mix(seed: u64, index: u64) -> u64 {
    let mut hash = seed ^ index.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51_afd7_ed55_8ccd);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    hash ^= hash >> 33;
    hash
}

/// PCG-XSH-RR output permutation.
#[inline]
fn pcg_output(state: u64) -> u32 {
    let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
    let rot = (state >> 59) as u32;
    xorshifted.rotate_right(rot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_in_range() {
        let mut rng = DeterministicRng::new(42);
        for _ in 0..10_000 {
            let roll = rng.percentile();
            assert!((1..=100).contains(&roll));
        }
        assert_eq!(rng.call_count(), 10_000);
    }

    #[test]
    fn test_percentile_covers_extremes() {
        let mut rng = DeterministicRng::new(7);
        let rolls: Vec<u32> = (0..20_000).map(|_| rng.percentile()).collect();
        assert!(rolls.contains(&1));
        assert!(rolls.contains(&100));
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = DeterministicRng::new(1234);
        let mut b = DeterministicRng::new(1234);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = DeterministicRng::new(1);
        let mut b = DeterministicRng::new(2);
        let sa: Vec<u32> = (0..16).map(|_| a.next_u32()).collect();
        let sb: Vec<u32> = (0..16).map(|_| b.next_u32()).collect();
        assert_ne!(sa, sb);
    }

    #[test]
    fn test_restore_continues_stream() {
        let mut uninterrupted = DeterministicRng::new(99);
        let mut paused = DeterministicRng::new(99);

        for _ in 0..37 {
            uninterrupted.percentile();
            paused.percentile();
        }
        let saved = paused.state();

        let mut restored = DeterministicRng::new(0);
        restored.set_state(saved);
        for _ in 0..50 {
            assert_eq!(restored.dice(2, 6, 1), uninterrupted.dice(2, 6, 1));
        }
    }

    #[test]
    fn test_dice_bounds_and_draw_count() {
        let mut rng = DeterministicRng::new(5);
        for _ in 0..1000 {
            let total = rng.dice(3, 6, 2);
            assert!((5..=20).contains(&total));
        }
        assert_eq!(rng.call_count(), 3000);
    }

    #[test]
    fn test_dice_zero_count_is_bonus() {
        let mut rng = DeterministicRng::new(5);
        assert_eq!(rng.dice(0, 6, 4), 4);
        assert_eq!(rng.call_count(), 0);
    }

    #[test]
    fn test_wide_dice_saturate() {
        let mut rng = DeterministicRng::new(5);
        for _ in 0..100 {
            assert!(rng.dice(4, u32::MAX, 0) >= 4);
        }
        assert_eq!(rng.dice(2, u32::MAX, i32::MAX), i32::MAX);
    }

    #[test]
    fn test_zero_sided_die() {
        let mut rng = DeterministicRng::new(5);
        assert_eq!(rng.roll(0), 1);
    }

    #[test]
    fn test_value_at_is_pure() {
        assert_eq!(value_at(3, 10), value_at(3, 10));
        let mut rng = DeterministicRng::from_state(RandomState {
            seed: 3,
            call_count: 10,
        });
        assert_eq!(rng.next_u32(), value_at(3, 10));
    }
}
