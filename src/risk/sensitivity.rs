//! One-At-a-Time Sensitivity
//!
//! For every service and perturbation level, re-run the Monte Carlo engine
//! twice with that service scaled to (1 - level) and (1 + level), holding all
//! others at baseline. Every run shares the seed.
//!
//! impact % = |median(high) - median(low)| / baseline median × 100
//!
//! Parameters are ranked by their largest impact across levels (ties by
//! name); rank 1 is the dominant parameter. Parameters are independent, so
//! they are evaluated in parallel with rayon.

use super::monte_carlo::{run_monte_carlo, MonteCarloConfig, ServiceInput};
use crate::config::SensitivitySettings;
use crate::error::RiskError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityConfig {
    /// Relative perturbations, each in (0, 1)
    pub perturbation_levels: Vec<f64>,
    pub monte_carlo: MonteCarloConfig,
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            perturbation_levels: SensitivitySettings::default().perturbation_levels,
            monte_carlo: MonteCarloConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelImpact {
    pub level: f64,
    pub median_low: f64,
    pub median_high: f64,
    pub impact_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterImpact {
    pub name: String,
    /// 1-based
    pub rank: usize,
    pub baseline_value: f64,
    pub max_impact_pct: f64,
    pub levels: Vec<LevelImpact>,
}

/// Tornado-chart row: portfolio median at the largest low/high perturbation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TornadoBar {
    pub name: String,
    pub low: f64,
    pub high: f64,
    pub base: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub baseline_median: f64,
    /// Sorted by rank
    pub parameters: Vec<ParameterImpact>,
    /// Same order as `parameters`
    pub tornado: Vec<TornadoBar>,
    pub dominant_parameter: Option<String>,
}

fn impact_pct(median_low: f64, median_high: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        return 0.0;
    }
    (median_high - median_low).abs() / baseline.abs() * 100.0
}

fn perturbed_median(
    services: &[ServiceInput],
    index: usize,
    factor: f64,
    config: &MonteCarloConfig,
) -> Result<f64, RiskError> {
    let mut inputs = services.to_vec();
    inputs[index] = services[index].scaled(factor);
    Ok(run_monte_carlo(&inputs, config)?.median)
}

fn evaluate_parameter(
    services: &[ServiceInput],
    index: usize,
    levels: &[f64],
    baseline: f64,
    config: &MonteCarloConfig,
) -> Result<ParameterImpact, RiskError> {
    let mut impacts = Vec::with_capacity(levels.len());
    for &level in levels {
        let median_low = perturbed_median(services, index, 1.0 - level, config)?;
        let median_high = perturbed_median(services, index, 1.0 + level, config)?;
        impacts.push(LevelImpact {
            level,
            median_low,
            median_high,
            impact_pct: impact_pct(median_low, median_high, baseline),
        });
    }

    Ok(ParameterImpact {
        name: services[index].name.clone(),
        rank: 0,
        baseline_value: services[index].value,
        max_impact_pct: impacts.iter().map(|l| l.impact_pct).fold(0.0, f64::max),
        levels: impacts,
    })
}

/// Rank every service by its effect on the portfolio median.
///
/// # Errors
/// `NoPerturbationLevels` for an empty level list, `InvalidPerturbation` for a
/// level outside (0, 1), plus any Monte Carlo input error.
pub fn run_sensitivity(
    services: &[ServiceInput],
    config: &SensitivityConfig,
) -> Result<SensitivityResult, RiskError> {
    if config.perturbation_levels.is_empty() {
        return Err(RiskError::NoPerturbationLevels);
    }
    if let Some(&bad) = config
        .perturbation_levels
        .iter()
        .find(|&&l| !(l > 0.0 && l < 1.0))
    {
        return Err(RiskError::InvalidPerturbation(bad));
    }

    let baseline_median = run_monte_carlo(services, &config.monte_carlo)?.median;

    let mut parameters: Vec<ParameterImpact> = (0..services.len())
        .into_par_iter()
        .map(|i| {
            evaluate_parameter(
                services,
                i,
                &config.perturbation_levels,
                baseline_median,
                &config.monte_carlo,
            )
        })
        .collect::<Result<_, _>>()?;

    parameters.sort_by(|a, b| {
        b.max_impact_pct
            .total_cmp(&a.max_impact_pct)
            .then_with(|| a.name.cmp(&b.name))
    });
    for (i, p) in parameters.iter_mut().enumerate() {
        p.rank = i + 1;
    }

    let tornado = parameters
        .iter()
        .map(|p| {
            // Row for the widest perturbation
            let widest = p.levels.iter().max_by(|a, b| a.level.total_cmp(&b.level));
            TornadoBar {
                name: p.name.clone(),
                low: widest.map_or(baseline_median, |l| l.median_low),
                high: widest.map_or(baseline_median, |l| l.median_high),
                base: baseline_median,
            }
        })
        .collect();

    Ok(SensitivityResult {
        baseline_median,
        dominant_parameter: parameters.first().map(|p| p.name.clone()),
        parameters,
        tornado,
    })
}
