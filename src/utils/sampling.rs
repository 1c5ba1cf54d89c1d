// src/utils/sampling.rs

use rand::Rng;
use rand::seq::SliceRandom;

/// Draws `n` distinct ids from `pool` via a uniform Fisher-Yates shuffle.
///
/// Sampling happens in application code rather than with a storage engine's
/// random ordering, so the semantics stay portable across backends and the
/// shuffle can be driven by a seeded RNG in tests.
///
/// Panics in debug builds if `n > pool.len()`; callers check pool size first.
pub fn sample_question_ids<R: Rng + ?Sized>(mut pool: Vec<i64>, n: usize, rng: &mut R) -> Vec<i64> {
    debug_assert!(n <= pool.len());
    pool.shuffle(rng);
    pool.truncate(n);
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn draws_exactly_n_distinct_ids_from_the_pool() {
        let pool: Vec<i64> = (1..=20).collect();
        let mut rng = StdRng::seed_from_u64(7);

        let drawn = sample_question_ids(pool.clone(), 5, &mut rng);

        assert_eq!(drawn.len(), 5);
        let distinct: HashSet<i64> = drawn.iter().copied().collect();
        assert_eq!(distinct.len(), 5);
        for id in &drawn {
            assert!(pool.contains(id));
        }
    }

    #[test]
    fn taking_the_whole_pool_is_a_permutation() {
        let pool: Vec<i64> = (1..=10).collect();
        let mut rng = StdRng::seed_from_u64(42);

        let mut drawn = sample_question_ids(pool.clone(), 10, &mut rng);
        drawn.sort_unstable();

        assert_eq!(drawn, pool);
    }

    #[test]
    fn same_seed_same_draw() {
        let pool: Vec<i64> = (1..=50).collect();

        let a = sample_question_ids(pool.clone(), 8, &mut StdRng::seed_from_u64(3));
        let b = sample_question_ids(pool, 8, &mut StdRng::seed_from_u64(3));

        assert_eq!(a, b);
    }
}
