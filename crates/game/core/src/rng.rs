//! Deterministic random number generation for turn replay.
//!
//! Every random decision inside a turn (DSL `rand()`, weighted `random`
//! effects, random event sampling) draws from a single [`TurnRng`] stream.
//! The stream is derived from the session's base seed and the turn number,
//! so replaying the same action sequence against the same seed reproduces
//! every roll.

use std::cell::Cell;

/// PCG-XSH-RR output function over 64-bit LCG state.
///
/// Single multiply + xorshift + rotate; small state, good statistical
/// quality, and trivially reproducible across platforms.
#[derive(Clone, Copy, Debug, Default)]
struct Pcg;

impl Pcg {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    #[inline]
    fn step(state: u64) -> u64 {
        state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT)
    }

    #[inline]
    fn output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

/// Mix the session seed with the turn number into a per-turn stream seed.
///
/// Constants are SplitMix64/FxHash multipliers; the avalanche step keeps
/// consecutive turns from producing correlated streams.
pub fn turn_seed(base_seed: u64, turn: u64) -> u64 {
    let mut hash = base_seed;
    hash ^= turn.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51afd7ed558ccd);
    hash ^= hash >> 33;
    hash
}

/// Per-turn deterministic RNG.
///
/// Interior mutability lets the expression evaluator and the effect
/// resolver share one stream through `&TurnRng` without threading `&mut`
/// borrows across the whole turn context.
#[derive(Debug)]
pub struct TurnRng {
    seed: u64,
    counter: Cell<u64>,
}

impl TurnRng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            counter: Cell::new(0),
        }
    }

    /// Derive the turn stream from a session seed and turn number.
    pub fn for_turn(base_seed: u64, turn: u64) -> Self {
        Self::new(turn_seed(base_seed, turn))
    }

    /// Number of draws taken so far (diagnostic only).
    pub fn draws(&self) -> u64 {
        self.counter.get()
    }

    fn next_u32(&self) -> u32 {
        let n = self.counter.get();
        self.counter.set(n + 1);
        let state = Pcg::step(self.seed ^ n.wrapping_mul(0x517cc1b727220a95));
        Pcg::output(Pcg::step(state))
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f64(&self) -> f64 {
        f64::from(self.next_u32()) / f64::from(u32::MAX) * (1.0 - f64::EPSILON)
    }

    /// Bernoulli sample with probability `p` (clamped to `[0, 1]`).
    pub fn chance(&self, p: f64) -> bool {
        self.next_f64() < p.clamp(0.0, 1.0)
    }

    /// Pick an index from a slice of non-negative weights.
    ///
    /// Returns `None` when the weights are empty or sum to zero.
    pub fn weighted_index(&self, weights: &[f64]) -> Option<usize> {
        let total: f64 = weights.iter().filter(|w| **w > 0.0).sum();
        if total <= 0.0 {
            return None;
        }
        let mut roll = self.next_f64() * total;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            if roll < *w {
                return Some(i);
            }
            roll -= *w;
        }
        // Floating-point edge: fall back to the last positive weight.
        weights.iter().rposition(|w| *w > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let a = TurnRng::for_turn(42, 7);
        let b = TurnRng::for_turn(42, 7);
        for _ in 0..32 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn different_turns_diverge() {
        let a = TurnRng::for_turn(42, 1);
        let b = TurnRng::for_turn(42, 2);
        let same = (0..16).filter(|_| a.next_u32() == b.next_u32()).count();
        assert!(same < 4);
    }

    #[test]
    fn next_f64_in_unit_interval() {
        let rng = TurnRng::new(1);
        for _ in 0..1000 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn weighted_index_respects_zero_weights() {
        let rng = TurnRng::new(9);
        for _ in 0..100 {
            let idx = rng.weighted_index(&[0.0, 3.0, 0.0]).unwrap();
            assert_eq!(idx, 1);
        }
        assert_eq!(rng.weighted_index(&[]), None);
        assert_eq!(rng.weighted_index(&[0.0, 0.0]), None);
    }

    #[test]
    fn chance_extremes() {
        let rng = TurnRng::new(3);
        assert!(!rng.chance(0.0));
        assert!(rng.chance(1.0));
    }
}
