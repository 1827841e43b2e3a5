//! Random-distribution policies shared by the generators.

use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};
use uuid::{Builder, Uuid};

use crate::errors::SeedError;

/// Default decay rate for recency-biased sampling.
pub const DEFAULT_RECENCY_LAMBDA: f64 = 2.0;

/// How far back in time a generated timestamp may fall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DayOffset {
    /// Every day in `[0, max_days]` is equally likely.
    Uniform,
    /// Recent days are sampled more densely than old ones.
    ///
    /// Draws `e = -ln(1 - u) / lambda` and maps it to `min(e * max_days / 3, max_days)`.
    Recency { lambda: f64 },
}

impl Default for DayOffset {
    fn default() -> Self {
        Self::Recency {
            lambda: DEFAULT_RECENCY_LAMBDA,
        }
    }
}

impl DayOffset {
    /// Samples a number of days in the past, never above `max_days`.
    pub fn sample(&self, max_days: u32, rng: &mut impl Rng) -> Result<u32, SeedError> {
        match *self {
            DayOffset::Uniform => Ok(rng.gen_range(0..=max_days)),
            DayOffset::Recency { lambda } => {
                let exp = Exp::new(lambda)
                    .ok()
                    .filter(|_| lambda > 0.0)
                    .ok_or_else(|| {
                        SeedError::precondition(format!(
                            "recency lambda must be positive, got {lambda}"
                        ))
                    })?;
                let e: f64 = exp.sample(rng);
                let scaled = (e * f64::from(max_days) / 3.0).min(f64::from(max_days));
                Ok(scaled as u32)
            }
        }
    }
}

/// Picks one element, failing when the reference set is empty.
pub fn pick<'a, T>(items: &'a [T], what: &str, rng: &mut impl Rng) -> Result<&'a T, SeedError> {
    items
        .choose(rng)
        .ok_or_else(|| SeedError::precondition(format!("cannot sample from empty {what}")))
}

/// Picks `amount` distinct elements (fewer when the set is smaller).
pub fn pick_many<'a, T>(items: &'a [T], amount: usize, rng: &mut impl Rng) -> Vec<&'a T> {
    items.choose_multiple(rng, amount).collect()
}

/// Draws a version-4 UUID from the run's RNG so seeded runs are reproducible.
pub fn uuid(rng: &mut impl Rng) -> Uuid {
    Builder::from_random_bytes(rng.r#gen()).into_uuid()
}

/// True with the given percentage chance.
pub fn percent(chance: u32, rng: &mut impl Rng) -> bool {
    rng.gen_range(1..=100) <= chance
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_recency_median_well_below_half() {
        let mut rng = StdRng::seed_from_u64(7);
        let policy = DayOffset::default();
        let mut samples: Vec<u32> = (0..20_000)
            .map(|_| policy.sample(365, &mut rng).unwrap())
            .collect();
        samples.sort_unstable();
        let median = samples[samples.len() / 2];

        // Analytic median: ln(2) / 2 * 365 / 3 ≈ 42 days
        assert!(median < 365 / 4, "median {median} not biased towards recent days");
        assert!(samples.iter().all(|&d| d <= 365));
    }

    #[test]
    fn test_uniform_median_near_half() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut samples: Vec<u32> = (0..20_000)
            .map(|_| DayOffset::Uniform.sample(365, &mut rng).unwrap())
            .collect();
        samples.sort_unstable();
        let median = samples[samples.len() / 2];
        assert!((160..=205).contains(&median), "median {median}");
    }

    #[test]
    fn test_invalid_lambda_is_precondition() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = DayOffset::Recency { lambda: 0.0 }
            .sample(10, &mut rng)
            .unwrap_err();
        assert!(matches!(err, SeedError::Precondition(_)));
    }

    #[test]
    fn test_pick_empty_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let empty: Vec<u8> = Vec::new();
        assert!(matches!(
            pick(&empty, "financers", &mut rng),
            Err(SeedError::Precondition(_))
        ));
    }

    #[test]
    fn test_seeded_uuids_repeat() {
        let a = uuid(&mut StdRng::seed_from_u64(3));
        let b = uuid(&mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }
}
