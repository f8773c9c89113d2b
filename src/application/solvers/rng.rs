//! Per-solver randomness
//!
//! Every solver run owns exactly one RNG, seeded explicitly; operators and
//! samplers receive it by reference. Child seeds (multi-start runs, batch
//! candidates, playback samples) derive deterministically from the parent
//! seed, so a whole solve tree replays from a single number.

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// RNG type used throughout the solvers
pub type SolverRng = SmallRng;

/// Creates the RNG for a solver run
pub fn rng_from_seed(seed: u64) -> SolverRng {
    SmallRng::seed_from_u64(seed)
}

/// Derives a child seed from a parent seed and an index
///
/// SplitMix64 finaliser over the combined value; cheap, stable across
/// platforms, and well-distributed even for consecutive indices.
pub fn derive_seed(parent: u64, index: u64) -> u64 {
    let mut z = parent
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(index.wrapping_mul(0xbf58_476d_1ce4_e5b9));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = rng_from_seed(42);
        let mut b = rng_from_seed(42);
        for _ in 0..32 {
            assert_eq!(a.gen::<u64>(), b.gen::<u64>());
        }
    }

    #[test]
    fn test_derived_seeds_distinct() {
        let parent = 7;
        let children: Vec<u64> = (0..16).map(|i| derive_seed(parent, i)).collect();
        for (i, a) in children.iter().enumerate() {
            for b in &children[i + 1..] {
                assert_ne!(a, b);
            }
        }
        // Deterministic
        assert_eq!(derive_seed(7, 3), derive_seed(7, 3));
    }
}
