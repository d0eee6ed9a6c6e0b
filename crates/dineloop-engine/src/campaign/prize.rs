//! Prize Selector - weighted random draws over prize wheel options

use dineloop_common::{Error, Result};
use dineloop_storage::models::PrizeOption;
use rand::rngs::OsRng;
use rand::Rng;
use std::sync::Arc;

/// Uniform random source behind prize draws.
///
/// Injectable so tests can pin the exact draw sequence.
pub trait RandomSource: Send + Sync {
    /// Uniformly distributed value in [0, 1)
    fn unit(&self) -> f64;
}

/// Operating-system entropy source
pub struct OsRandomSource;

impl RandomSource for OsRandomSource {
    fn unit(&self) -> f64 {
        OsRng.gen::<f64>()
    }
}

/// Draws one prize from a weighted option set
pub struct PrizeSelector {
    random: Arc<dyn RandomSource>,
}

impl PrizeSelector {
    pub fn new(random: Arc<dyn RandomSource>) -> Self {
        Self { random }
    }

    /// Draw one option, weighted by `weight`.
    ///
    /// The target point is `unit * total_weight`; the walk returns the first
    /// option whose cumulative weight strictly exceeds the target, so a
    /// target landing exactly on a boundary belongs to the later option.
    /// Misconfigured wheels (no options, negative weights, zero total) are
    /// surfaced to the caller, never corrected.
    pub fn draw<'a>(&self, options: &'a [PrizeOption]) -> Result<&'a PrizeOption> {
        if options.is_empty() {
            return Err(Error::Validation("Prize wheel has no options".to_string()));
        }
        if let Some(bad) = options
            .iter()
            .find(|o| !o.weight.is_finite() || o.weight < 0.0)
        {
            return Err(Error::Validation(format!(
                "Prize option '{}' has invalid weight {}",
                bad.label, bad.weight
            )));
        }

        let total: f64 = options.iter().map(|o| o.weight).sum();
        if total <= 0.0 {
            return Err(Error::Validation(
                "Prize option weights sum to zero".to_string(),
            ));
        }

        let target = self.random.unit() * total;
        let mut cumulative = 0.0;
        for option in options {
            cumulative += option.weight;
            if cumulative > target {
                return Ok(option);
            }
        }

        // Floating-point accumulation can leave a residual past the last
        // boundary; such a draw belongs to the tail option.
        Ok(&options[options.len() - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Replays a fixed value sequence, cycling when exhausted
    struct SequenceSource {
        values: Vec<f64>,
        next: AtomicUsize,
    }

    impl SequenceSource {
        fn new(values: Vec<f64>) -> Self {
            Self {
                values,
                next: AtomicUsize::new(0),
            }
        }
    }

    impl RandomSource for SequenceSource {
        fn unit(&self) -> f64 {
            let index = self.next.fetch_add(1, Ordering::SeqCst);
            self.values[index % self.values.len()]
        }
    }

    fn option(label: &str, weight: f64) -> PrizeOption {
        PrizeOption {
            id: Uuid::new_v4(),
            prize_wheel_id: Uuid::new_v4(),
            reward_definition_id: Uuid::new_v4(),
            label: label.to_string(),
            weight,
            created_at: Utc::now(),
        }
    }

    fn selector_with(values: Vec<f64>) -> PrizeSelector {
        PrizeSelector::new(Arc::new(SequenceSource::new(values)))
    }

    #[test]
    fn test_draw_distribution_follows_weights() {
        // sweep [0, 1) in thousandths; weights 1:1:2 partition the sweep
        // into exactly 250 / 250 / 500 draws
        let steps: Vec<f64> = (0..1000).map(|i| i as f64 / 1000.0).collect();
        let selector = selector_with(steps);
        let options = vec![option("espresso", 1.0), option("dessert", 1.0), option("dinner", 2.0)];

        let mut counts = [0usize; 3];
        for _ in 0..1000 {
            let drawn = selector.draw(&options).unwrap();
            let index = options.iter().position(|o| o.id == drawn.id).unwrap();
            counts[index] += 1;
        }

        assert_eq!(counts, [250, 250, 500]);
    }

    #[test]
    fn test_draw_boundary_belongs_to_later_option() {
        let options = vec![option("half", 50.0), option("other_half", 50.0)];

        // target exactly at the 50/50 boundary
        let selector = selector_with(vec![0.5]);
        assert_eq!(selector.draw(&options).unwrap().label, "other_half");

        // just below the boundary
        let selector = selector_with(vec![0.499_999]);
        assert_eq!(selector.draw(&options).unwrap().label, "half");
    }

    #[test]
    fn test_near_one_draw_falls_back_to_last_option() {
        // with total 2.0 the product rounds up to the full cumulative
        // weight, so the walk finds no strictly-greater boundary
        let largest_below_one = 1.0 - f64::EPSILON / 2.0;
        let selector = selector_with(vec![largest_below_one]);
        let options = vec![option("starter", 1.0), option("main", 1.0)];

        assert_eq!(selector.draw(&options).unwrap().label, "main");
    }

    #[test]
    fn test_zero_weight_option_is_never_drawn() {
        let steps: Vec<f64> = (0..100).map(|i| i as f64 / 100.0).collect();
        let selector = selector_with(steps);
        let options = vec![option("ghost", 0.0), option("real", 1.0)];

        for _ in 0..100 {
            assert_eq!(selector.draw(&options).unwrap().label, "real");
        }
    }

    #[test]
    fn test_misconfigured_wheels_are_rejected() {
        let selector = selector_with(vec![0.5]);

        assert!(selector.draw(&[]).is_err());
        assert!(selector
            .draw(&[option("negative", -1.0), option("ok", 1.0)])
            .is_err());
        assert!(selector
            .draw(&[option("empty_a", 0.0), option("empty_b", 0.0)])
            .is_err());
    }
}
