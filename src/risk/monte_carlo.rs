//! Monte Carlo Portfolio Simulation
//!
//! Each service is a triangular distribution (low, mode, high) with the point
//! value clamped into [low, high] as the mode. Services are sampled
//! independently and summed per draw.
//!
//! Sampling order is fixed (services outer, draws inner) on one seeded RNG,
//! so identical inputs and seed give bit-identical results. Degenerate
//! services (low == high) consume no random numbers.

use crate::config::MonteCarloSettings;
use crate::error::RiskError;
use crate::models::EcosystemServiceEstimate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// One uncertain additive component of the portfolio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInput {
    pub name: String,
    pub value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

impl ServiceInput {
    pub fn new(name: impl Into<String>, value: f64, ci_low: f64, ci_high: f64) -> Self {
        Self {
            name: name.into(),
            value,
            ci_low,
            ci_high,
        }
    }

    /// Scale value and both bounds
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            name: self.name.clone(),
            value: self.value * factor,
            ci_low: self.ci_low * factor,
            ci_high: self.ci_high * factor,
        }
    }

    /// (left, mode, right) with bounds ordered and mode clamped
    pub fn triangle(&self) -> (f64, f64, f64) {
        let left = self.ci_low.min(self.ci_high);
        let right = self.ci_low.max(self.ci_high);
        (left, self.value.clamp(left, right), right)
    }

    fn check_finite(&self) -> Result<(), RiskError> {
        if self.value.is_finite() && self.ci_low.is_finite() && self.ci_high.is_finite() {
            Ok(())
        } else {
            Err(RiskError::NonFiniteInput {
                name: self.name.clone(),
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    pub n_simulations: usize,
    pub seed: u64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self::from(&MonteCarloSettings::default())
    }
}

impl From<&MonteCarloSettings> for MonteCarloConfig {
    fn from(settings: &MonteCarloSettings) -> Self {
        Self {
            n_simulations: settings.n_simulations,
            seed: settings.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub median: f64,
    pub mean: f64,
    pub p5: f64,
    pub p95: f64,
    pub std: f64,
    pub n_simulations: usize,
    /// Portfolio totals in draw order
    pub samples: Vec<f64>,
}

/// [`MonteCarloResult`] without the sample array
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub median: f64,
    pub mean: f64,
    pub p5: f64,
    pub p95: f64,
    pub std: f64,
    pub n_simulations: usize,
}

impl MonteCarloResult {
    pub fn summary(&self) -> MonteCarloSummary {
        MonteCarloSummary {
            median: self.median,
            mean: self.mean,
            p5: self.p5,
            p95: self.p95,
            std: self.std,
            n_simulations: self.n_simulations,
        }
    }
}

/// Inverse-CDF draw from a triangular distribution, `u` in [0, 1)
fn sample_triangular(left: f64, mode: f64, right: f64, u: f64) -> f64 {
    let width = right - left;
    let split = (mode - left) / width;
    if u < split {
        left + (u * width * (mode - left)).sqrt()
    } else {
        right - ((1.0 - u) * width * (right - mode)).sqrt()
    }
}

/// Linear-interpolated percentile of sorted data, `p` in [0, 100]
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Simulate the portfolio total of `services`.
///
/// # Errors
/// `NoSimulations` when `n_simulations == 0`; `NonFiniteInput` for NaN or
/// infinite values or bounds.
pub fn run_monte_carlo(
    services: &[ServiceInput],
    config: &MonteCarloConfig,
) -> Result<MonteCarloResult, RiskError> {
    if config.n_simulations == 0 {
        return Err(RiskError::NoSimulations);
    }
    for service in services {
        service.check_finite()?;
    }

    let n = config.n_simulations;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut samples = vec![0.0_f64; n];

    for service in services {
        let (left, mode, right) = service.triangle();
        if left == right {
            samples.iter_mut().for_each(|s| *s += left);
            continue;
        }
        for s in samples.iter_mut() {
            *s += sample_triangular(left, mode, right, rng.gen::<f64>());
        }
    }

    let mut sorted = samples.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));

    // Constant portfolio: report it exactly instead of via accumulated sums
    let (mean, std) = if sorted[0] == sorted[n - 1] {
        (sorted[0], 0.0)
    } else {
        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;
        (mean, var.sqrt())
    };

    Ok(MonteCarloResult {
        median: percentile(&sorted, 50.0),
        mean,
        p5: percentile(&sorted, 5.0),
        p95: percentile(&sorted, 95.0),
        std,
        n_simulations: n,
        samples,
    })
}

/// One [`ServiceInput`] per estimate, named `habitat/service_type/axiom`
pub fn service_inputs_from_estimates(estimates: &[EcosystemServiceEstimate]) -> Vec<ServiceInput> {
    estimates
        .iter()
        .map(|e| {
            let mut parts: Vec<&str> = Vec::with_capacity(3);
            if let Some(habitat) = &e.habitat {
                parts.push(habitat.id());
            }
            parts.push(&e.service_type);
            parts.extend(e.axioms_used.iter().map(String::as_str));
            ServiceInput::new(parts.join("/"), e.annual_value_usd, e.ci_low, e.ci_high)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HabitatType;
    use approx::assert_relative_eq;

    fn config(n: usize, seed: u64) -> MonteCarloConfig {
        MonteCarloConfig {
            n_simulations: n,
            seed,
        }
    }

    #[test]
    fn test_zero_simulations_rejected() {
        let err = run_monte_carlo(&[], &config(0, 1)).unwrap_err();
        assert_eq!(err, RiskError::NoSimulations);
    }

    #[test]
    fn test_non_finite_rejected() {
        let services = [ServiceInput::new("bad", f64::NAN, 0.0, 1.0)];
        assert!(matches!(
            run_monte_carlo(&services, &config(10, 1)),
            Err(RiskError::NonFiniteInput { .. })
        ));
    }

    #[test]
    fn test_triangle_clamps_and_orders() {
        assert_eq!(ServiceInput::new("a", 150.0, 80.0, 120.0).triangle(), (80.0, 120.0, 120.0));
        assert_eq!(ServiceInput::new("b", 10.0, 20.0, 5.0).triangle(), (5.0, 10.0, 20.0));
    }

    #[test]
    fn test_samples_stay_within_summed_bounds() {
        let services = [
            ServiceInput::new("a", 100.0, 80.0, 130.0),
            ServiceInput::new("b", 50.0, 10.0, 60.0),
        ];
        let result = run_monte_carlo(&services, &config(5_000, 9)).unwrap();
        assert_eq!(result.samples.len(), 5_000);
        assert!(result.samples.iter().all(|&s| (90.0..=190.0).contains(&s)));
        assert!(result.p5 <= result.median && result.median <= result.p95);
    }

    #[test]
    fn test_mean_matches_triangular_expectation() {
        // E[tri(a, c, b)] = (a + b + c) / 3
        let services = [ServiceInput::new("a", 100.0, 40.0, 220.0)];
        let result = run_monte_carlo(&services, &config(50_000, 3)).unwrap();
        assert_relative_eq!(result.mean, 120.0, max_relative = 0.01);
    }

    #[test]
    fn test_degenerate_is_exact() {
        let services = [ServiceInput::new("flat", 1234.5, 1234.5, 1234.5)];
        let result = run_monte_carlo(&services, &config(1_000, 7)).unwrap();
        assert_eq!(result.std, 0.0);
        assert_eq!(result.median, 1234.5);
        assert_eq!(result.p5, 1234.5);
        assert_eq!(result.mean, 1234.5);
    }

    #[test]
    fn test_summary_drops_samples() {
        let services = [ServiceInput::new("a", 1.0, 0.5, 2.0)];
        let result = run_monte_carlo(&services, &config(100, 1)).unwrap();
        let summary = result.summary();
        assert_eq!(summary.median, result.median);
        assert_eq!(summary.n_simulations, 100);
    }

    #[test]
    fn test_percentile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_relative_eq!(percentile(&sorted, 50.0), 3.0);
        assert_relative_eq!(percentile(&sorted, 5.0), 1.2, max_relative = 1e-12);
        assert_relative_eq!(percentile(&sorted, 95.0), 4.8, max_relative = 1e-12);
    }

    #[test]
    fn test_inputs_from_estimates() {
        let estimates = vec![EcosystemServiceEstimate {
            service_type: "tourism".into(),
            annual_value_usd: 10.0,
            valuation_method: "market_price".into(),
            axioms_used: vec!["BA-001".into()],
            ci_low: 5.0,
            ci_high: 20.0,
            habitat: Some(HabitatType::CoralReef),
            hectares: Some(1.0),
        }];
        let inputs = service_inputs_from_estimates(&estimates);
        assert_eq!(inputs[0].name, "coral_reef/tourism/BA-001");
        assert_eq!(inputs[0].ci_high, 20.0);
    }
}
