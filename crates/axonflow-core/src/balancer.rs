//! Weighted random provider selection.

use rand::Rng;

/// Picks a candidate with probability proportional to its weight.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedBalancer;

impl WeightedBalancer {
    pub fn new() -> Self {
        Self
    }

    /// Select from `(name, weight)` candidates using the thread RNG.
    pub fn select<'a>(&self, candidates: &[(&'a str, f64)]) -> Option<&'a str> {
        self.select_with(&mut rand::thread_rng(), candidates)
    }

    /// Select with an explicit RNG (deterministic in tests).
    pub fn select_with<'a, R: Rng>(
        &self,
        rng: &mut R,
        candidates: &[(&'a str, f64)],
    ) -> Option<&'a str> {
        if candidates.is_empty() {
            return None;
        }
        let total: f64 = candidates.iter().map(|(_, w)| w.max(0.0)).sum();
        if total <= 0.0 {
            // Degenerate weights: fall back to a uniform pick.
            let index = rng.gen_range(0..candidates.len());
            return candidates.get(index).map(|(name, _)| *name);
        }
        let mut roll = rng.gen_range(0.0..total);
        for &(name, weight) in candidates {
            let weight = weight.max(0.0);
            if roll < weight {
                return Some(name);
            }
            roll -= weight;
        }
        candidates.last().map(|(name, _)| *name)
    }
}
