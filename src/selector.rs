//! Random scenario and severity selection.

use rand::Rng;

use crate::model::{Scenario, Severity};

/// Stateless random choice over scenarios (uniform) and severities (weighted).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSelector;

impl RandomSelector {
    pub fn new() -> Self {
        Self
    }

    /// Pick a scenario uniformly at random.
    pub fn pick_scenario(&self) -> Scenario {
        self.pick_scenario_with(&mut rand::thread_rng())
    }

    /// Pick a severity by weighted draw.
    pub fn pick_severity(&self) -> Severity {
        self.pick_severity_with(&mut rand::thread_rng())
    }

    pub fn pick_scenario_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Scenario {
        let scenarios = Scenario::all();
        scenarios[rng.gen_range(0..scenarios.len())]
    }

    /// Walks the cumulative weights in declaration order and returns the
    /// first severity whose cumulative weight covers the draw.
    pub fn pick_severity_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Severity {
        let draw: f64 = rng.gen();
        let mut cumulative = 0.0;
        for severity in Severity::all() {
            cumulative += severity.weight();
            if draw <= cumulative {
                return *severity;
            }
        }
        // Only reachable if rounding leaves the sum short of 1.0
        Severity::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn test_severity_distribution_matches_weights() {
        let selector = RandomSelector::new();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let n = 100_000;

        let mut counts: HashMap<Severity, usize> = HashMap::new();
        for _ in 0..n {
            *counts.entry(selector.pick_severity_with(&mut rng)).or_default() += 1;
        }

        for severity in Severity::all() {
            let observed = *counts.get(severity).unwrap_or(&0) as f64 / n as f64;
            assert!(
                (observed - severity.weight()).abs() <= 0.02,
                "{} observed {:.4}, expected {:.2}",
                severity,
                observed,
                severity.weight()
            );
        }
    }

    #[test]
    fn test_scenario_selection_covers_every_variant() {
        let selector = RandomSelector::new();
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen: HashMap<Scenario, usize> = HashMap::new();

        for _ in 0..10_000 {
            *seen.entry(selector.pick_scenario_with(&mut rng)).or_default() += 1;
        }

        assert_eq!(seen.len(), Scenario::all().len());
        for count in seen.values() {
            // uniform expectation is 1000 per scenario
            assert!(*count > 800 && *count < 1200, "count {}", count);
        }
    }

    #[test]
    fn test_thread_rng_selection() {
        let selector = RandomSelector::new();
        assert!(Scenario::all().contains(&selector.pick_scenario()));
        assert!(Severity::all().contains(&selector.pick_severity()));
    }
}
