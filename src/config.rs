//! Valuation Configuration
//!
//! Policy constants (carbon price, default coefficient band), retry policy,
//! endpoint URLs and engine defaults.
//!
//! Layering: `Default` → optional JSON file ([`ValuationConfig::load`]) →
//! environment overrides ([`ValuationConfig::apply_env`]).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration for a characterization + valuation run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ValuationConfig {
    pub esv: EsvSettings,
    pub retry: RetrySettings,
    pub http: HttpSettings,
    pub endpoints: EndpointSettings,
    pub characterizer: CharacterizerSettings,
    pub monte_carlo: MonteCarloSettings,
    pub sensitivity: SensitivitySettings,

    /// Axiom catalog path. `None` uses the catalog bundled with the crate.
    pub axiom_registry_path: Option<PathBuf>,
}

/// ESV policy constants
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EsvSettings {
    /// USD per tonne CO2, applied to carbon-derived axioms
    pub carbon_price_usd_per_tonne: f64,
    /// Relative half-width of the CI assumed for scalar coefficients (0.30 = ±30%)
    pub default_ci_band: f64,
}

impl Default for EsvSettings {
    fn default() -> Self {
        Self {
            carbon_price_usd_per_tonne: 80.0,
            default_ci_band: 0.30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    /// Base backoff; attempt `n` sleeps `backoff_ms × n` before the next try
    pub backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1000,
        }
    }
}

impl RetrySettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("mpa_valuation/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Base URLs of the three upstream registries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    pub occurrence_base_url: String, // OBIS v3
    pub taxonomy_base_url: String,   // WoRMS REST
    pub gazetteer_base_url: String,  // Marine Regions REST
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            occurrence_base_url: "https://api.obis.org/v3".to_string(),
            taxonomy_base_url: "https://www.marinespecies.org/rest".to_string(),
            gazetteer_base_url: "https://www.marineregions.org/rest".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterizerSettings {
    /// Occurrence records requested per site
    pub occurrence_page_size: usize,
    /// Species beyond this count are kept but not enriched from the taxonomic registry
    pub max_species_enrichment: usize,
}

impl Default for CharacterizerSettings {
    fn default() -> Self {
        Self {
            occurrence_page_size: 500,
            max_species_enrichment: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MonteCarloSettings {
    pub n_simulations: usize,
    pub seed: u64,
}

impl Default for MonteCarloSettings {
    fn default() -> Self {
        Self {
            n_simulations: 10_000,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivitySettings {
    pub perturbation_levels: Vec<f64>,
}

impl Default for SensitivitySettings {
    fn default() -> Self {
        Self {
            perturbation_levels: vec![0.10, 0.20],
        }
    }
}

impl ValuationConfig {
    /// Load configuration from a JSON file (missing sections take defaults)
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config JSON: {:?}", path))
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply `MPA_*` overrides from a variable lookup.
    ///
    /// Takes the lookup as a closure so tests do not touch process env.
    /// Values that fail to parse are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Option<T> {
            let raw = raw?;
            match raw.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring unparseable {}={:?}", key, raw);
                    None
                }
            }
        }

        if let Some(v) = parsed("MPA_CARBON_PRICE", lookup("MPA_CARBON_PRICE")) {
            self.esv.carbon_price_usd_per_tonne = v;
        }
        if let Some(v) = parsed("MPA_CI_BAND", lookup("MPA_CI_BAND")) {
            self.esv.default_ci_band = v;
        }
        if let Some(v) = parsed("MPA_RETRY_ATTEMPTS", lookup("MPA_RETRY_ATTEMPTS")) {
            self.retry.max_attempts = v;
        }
        if let Some(v) = parsed("MPA_RETRY_BACKOFF_MS", lookup("MPA_RETRY_BACKOFF_MS")) {
            self.retry.backoff_ms = v;
        }
        if let Some(v) = parsed("MPA_HTTP_TIMEOUT_SECS", lookup("MPA_HTTP_TIMEOUT_SECS")) {
            self.http.timeout_secs = v;
        }
        if let Some(v) = parsed("MPA_N_SIMULATIONS", lookup("MPA_N_SIMULATIONS")) {
            self.monte_carlo.n_simulations = v;
        }
        if let Some(v) = parsed("MPA_SEED", lookup("MPA_SEED")) {
            self.monte_carlo.seed = v;
        }
        if let Some(path) = lookup("MPA_AXIOM_REGISTRY").filter(|p| !p.trim().is_empty()) {
            self.axiom_registry_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("MPA_OBIS_URL") {
            self.endpoints.occurrence_base_url = url;
        }
        if let Some(url) = lookup("MPA_WORMS_URL") {
            self.endpoints.taxonomy_base_url = url;
        }
        if let Some(url) = lookup("MPA_MARINE_REGIONS_URL") {
            self.endpoints.gazetteer_base_url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ValuationConfig::default();
        assert_relative_eq!(config.esv.default_ci_band, 0.30);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.monte_carlo.n_simulations, 10_000);
        assert_eq!(config.sensitivity.perturbation_levels, vec![0.10, 0.20]);
        assert!(config.axiom_registry_path.is_none());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let json = r#"{ "esv": { "carbon_price_usd_per_tonne": 120.0 }, "retry": { "max_attempts": 5 } }"#;
        let config: ValuationConfig = serde_json::from_str(json).unwrap();
        assert_relative_eq!(config.esv.carbon_price_usd_per_tonne, 120.0);
        assert_relative_eq!(config.esv.default_ci_band, 0.30);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff_ms, 1000);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("MPA_CARBON_PRICE", "51.5"),
            ("MPA_RETRY_ATTEMPTS", "not-a-number"),
            ("MPA_AXIOM_REGISTRY", "/tmp/axioms.json"),
            ("MPA_SEED", "7"),
        ]
        .into_iter()
        .collect();

        let mut config = ValuationConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_relative_eq!(config.esv.carbon_price_usd_per_tonne, 51.5);
        assert_eq!(config.retry.max_attempts, 3); // unparseable → unchanged
        assert_eq!(config.monte_carlo.seed, 7);
        assert_eq!(
            config.axiom_registry_path.as_deref(),
            Some(Path::new("/tmp/axioms.json"))
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "monte_carlo": { "seed": 99 } }"#).unwrap();

        let config = ValuationConfig::load(&path).unwrap();
        assert_eq!(config.monte_carlo.seed, 99);
        assert_eq!(config.monte_carlo.n_simulations, 10_000);

        assert!(ValuationConfig::load(&dir.path().join("missing.json")).is_err());
    }
}
