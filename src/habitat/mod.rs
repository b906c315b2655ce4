//! Habitat inference from species evidence

pub mod scorer;
pub mod tables;

pub use scorer::{infer_habitats, score_habitats, HabitatScore};
pub use tables::{profile_for, HabitatProfile, HABITAT_PROFILES};
