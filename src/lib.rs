//! MPA Site Characterization and Ecosystem-Service Valuation
//!
//! Turns a marine protected area name into a tiered, evidence-traceable
//! record with an uncertainty-quantified ecosystem service value (ESV).
//!
//! Module layout, leaves first:
//! - `clients/`: retrying HTTP primitive plus occurrence, taxonomy and gazetteer clients
//! - `habitat/`: static indicator tables and the habitat inference scorer
//! - `valuation/`: bridge-axiom registry, immutable index, ESV estimator
//! - `risk/`: Monte Carlo intervals and one-at-a-time sensitivity
//! - `characterizer`: Bronze → Silver → Gold pipeline
//! - `site_registry`: keyed persistence with tier validation
//!
//! The crate never installs a tracing subscriber; binaries do.

pub mod characterizer;
pub mod clients;
pub mod config;
pub mod error;
pub mod habitat;
pub mod models;
pub mod risk;
pub mod site_registry;
pub mod valuation;

// Re-export commonly used types
pub use characterizer::{SiteCharacterizer, SiteHints};
pub use config::ValuationConfig;
pub use error::{ClientError, RegistryError, RiskError, ValidationError};
pub use models::{
    CharacterizationTier, EcosystemServiceEstimate, HabitatInfo, HabitatType,
    SiteCharacterization, SpeciesRecord,
};
pub use risk::{
    run_monte_carlo, run_sensitivity, service_inputs_from_estimates, MonteCarloConfig,
    MonteCarloResult, SensitivityConfig, SensitivityResult, ServiceInput,
};
pub use site_registry::{normalize_site_key, validate_for_tier, SiteRegistry};
pub use valuation::{AxiomIndex, EsvEstimate, EsvEstimator};
