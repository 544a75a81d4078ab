#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Waste sampler that marks a random subset of produced units as rejected.

use oee_sim_core::{ProductionEvent, Ratio, WasteEvent, DEFAULT_WASTE_JITTER_MS};
use rand::Rng;
use tracing::debug;

/// Configuration parameters required to construct the waste sampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    jitter_ms: u32,
}

impl Config {
    /// Creates a configuration delaying each waste marker by up to `jitter_ms` (exclusive).
    ///
    /// A jitter of zero places every marker exactly on its production event.
    #[must_use]
    pub const fn new(jitter_ms: u32) -> Self {
        Self { jitter_ms }
    }

    /// Exclusive upper bound of the delay after the sampled production event.
    #[must_use]
    pub const fn jitter_ms(&self) -> u32 {
        self.jitter_ms
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_WASTE_JITTER_MS)
    }
}

/// Pure system that samples rejected units from a production stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct Waste {
    config: Config,
}

impl Waste {
    /// Creates a waste sampler using the supplied configuration.
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Marks `floor(total_production * (1 - quality))` distinct production events as waste.
    ///
    /// Markers follow the order in which events were drawn, not chronological
    /// order, and each lands uniformly within the configured jitter after the
    /// production event it was drawn from.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        production: &[ProductionEvent],
        quality: Ratio,
        rng: &mut R,
    ) -> Vec<WasteEvent> {
        let total: u64 = production
            .iter()
            .map(|event| u64::from(event.increase))
            .sum();
        let target = (total as f64 * quality.complement()).floor() as u64;
        let target = usize::try_from(target)
            .unwrap_or(usize::MAX)
            .min(production.len());

        let waste: Vec<WasteEvent> = sample_indices(production.len(), target, rng)
            .into_iter()
            .map(|index| {
                let delay = if self.config.jitter_ms == 0 {
                    0
                } else {
                    rng.gen_range(0..self.config.jitter_ms)
                };
                WasteEvent::new(production[index].t.saturating_add_millis(u64::from(delay)))
            })
            .collect();

        debug!(
            total_production = total,
            wasted = waste.len(),
            jitter_ms = self.config.jitter_ms,
            "sampled waste"
        );
        waste
    }
}

/// Draws `count` distinct indices from `0..len` in draw order.
///
/// The pool shrinks by swap-removal, so each draw costs O(1).
fn sample_indices<R: Rng + ?Sized>(len: usize, count: usize, rng: &mut R) -> Vec<usize> {
    let mut pool: Vec<usize> = (0..len).collect();
    let mut drawn = Vec::with_capacity(count.min(len));
    for _ in 0..count {
        if pool.is_empty() {
            break;
        }
        let slot = rng.gen_range(0..pool.len());
        drawn.push(pool.swap_remove(slot));
    }
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashSet;

    #[test]
    fn drawn_indices_are_distinct() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let drawn = sample_indices(1_000, 1_000, &mut rng);
        let unique: HashSet<usize> = drawn.iter().copied().collect();
        assert_eq!(drawn.len(), 1_000);
        assert_eq!(unique.len(), 1_000);
    }

    #[test]
    fn over_requesting_stops_at_pool_size() {
        let mut rng = ChaCha8Rng::seed_from_u64(19);
        assert_eq!(sample_indices(3, 10, &mut rng).len(), 3);
        assert!(sample_indices(0, 4, &mut rng).is_empty());
    }
}
