//! Error types
//!
//! Typed errors for the parts of the pipeline that can fail loudly. Network
//! and payload problems are handled fail-open inside the clients and the
//! characterizer; only retry exhaustion surfaces as [`ClientError`], and the
//! characterizer swallows that per step.

/// Data-source client failure after all retry attempts were spent.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Endpoint could not be reached (transport error or non-success status on every attempt).
    #[error("ConnectionError: {endpoint} unreachable after {attempts} attempts ({last_error})")]
    Connection {
        endpoint: String,
        attempts: u32,
        last_error: String,
    },
}

/// Model construction failure. These indicate programming errors, not runtime conditions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("NEOLI score {0} outside [0, 5]")]
    NeoliScoreOutOfRange(u8),

    #[error("area must be > 0 km², got {0}")]
    NonPositiveArea(f64),

    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),

    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("habitat extent must be > 0 km², got {0}")]
    NonPositiveExtent(f64),

    #[error("site name must not be empty")]
    EmptyName,
}

/// Monte Carlo / sensitivity input errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskError {
    #[error("number of simulations must be > 0")]
    NoSimulations,

    #[error("perturbation level {0} outside (0, 1)")]
    InvalidPerturbation(f64),

    #[error("at least one perturbation level is required")]
    NoPerturbationLevels,

    #[error("service '{name}' has a non-finite value or bound")]
    NonFiniteInput { name: String },
}

/// Site Registry write-contract failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("site '{site}' does not meet {tier} requirements: {reason}")]
    TierRequirement {
        site: String,
        tier: String,
        reason: String,
    },

    #[error("invalid site record: {0}")]
    Invalid(#[from] ValidationError),

    #[error("registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("registry serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
