//! Ecosystem service valuation via bridge axioms

pub mod axioms;
pub mod estimator;

pub use axioms::{
    classify_coefficient_key, AxiomCatalog, AxiomEntry, AxiomIndex, BridgeAxiom, Coefficient,
    IndexStats, ValueBasis, ValueInterval,
};
pub use estimator::{km2_to_hectares, EsvEstimate, EsvEstimator, HECTARES_PER_KM2};
