//! Uncertainty quantification: Monte Carlo intervals and OAT sensitivity

pub mod monte_carlo;
pub mod sensitivity;

pub use monte_carlo::{
    run_monte_carlo, service_inputs_from_estimates, MonteCarloConfig, MonteCarloResult,
    MonteCarloSummary, ServiceInput,
};
pub use sensitivity::{
    run_sensitivity, LevelImpact, ParameterImpact, SensitivityConfig, SensitivityResult,
    TornadoBar,
};
