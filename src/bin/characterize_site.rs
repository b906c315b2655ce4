//! Characterize one marine protected area and print the record as JSON.
//!
//! Usage:
//!   characterize_site "Cabo Pulmo" silver --country Mexico --area-km2 71.1
//!
//! Gold runs additionally print Monte Carlo and sensitivity summaries.
//!
//! Environment variables:
//!   MPA_CONFIG   - JSON config file (defaults otherwise)
//!   MPA_REGISTRY - site registry file; the result is upserted when set
//!   MPA_*        - policy overrides, see `ValuationConfig::apply_env`

use anyhow::{Context, Result};
use clap::Parser;
use mpa_valuation::clients::{
    GazetteerClient, OccurrenceClient, ReqwestTransport, ResilientHttp, RetryPolicy, TaxonomyClient,
};
use mpa_valuation::{
    run_monte_carlo, run_sensitivity, service_inputs_from_estimates, validate_for_tier, AxiomIndex,
    CharacterizationTier, MonteCarloConfig, SensitivityConfig, SiteCharacterizer, SiteHints,
    SiteRegistry, ValuationConfig,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "characterize_site")]
#[command(about = "Characterize an MPA and estimate its ecosystem service value")]
#[command(version)]
struct Args {
    /// Site name as known to the gazetteer
    name: String,

    /// bronze, silver or gold
    #[arg(default_value = "silver")]
    tier: CharacterizationTier,

    #[arg(long)]
    country: Option<String>,

    #[arg(long, requires = "longitude", allow_hyphen_values = true)]
    latitude: Option<f64>,

    #[arg(long, requires = "latitude", allow_hyphen_values = true)]
    longitude: Option<f64>,

    #[arg(long)]
    area_km2: Option<f64>,

    #[arg(long)]
    designation_year: Option<i32>,

    /// WKT boundary used for the occurrence search instead of the name
    #[arg(long)]
    boundary_wkt: Option<String>,

    #[arg(long, env = "MPA_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "MPA_REGISTRY")]
    registry: Option<PathBuf>,
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mpa_valuation=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ValuationConfig::load(path)?,
        None => ValuationConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok());

    let transport = Arc::new(ReqwestTransport::new(&config.http)?);
    let http = ResilientHttp::new(transport, RetryPolicy::from(&config.retry));
    let endpoints = &config.endpoints;

    let index = AxiomIndex::global(config.axiom_registry_path.as_deref());
    let characterizer = SiteCharacterizer::new(
        Arc::new(OccurrenceClient::new(http.clone(), endpoints.occurrence_base_url.clone())),
        Arc::new(TaxonomyClient::new(http.clone(), endpoints.taxonomy_base_url.clone())),
        Arc::new(GazetteerClient::new(http, endpoints.gazetteer_base_url.clone())),
        index,
        &config,
    );

    let hints = SiteHints {
        country: args.country,
        coordinates: args.latitude.zip(args.longitude),
        area_km2: args.area_km2,
        designation_year: args.designation_year,
        boundary_wkt: args.boundary_wkt,
    };
    let record = characterizer
        .characterize(&args.name, args.tier, &hints)
        .with_context(|| format!("Invalid input for site '{}'", args.name))?;

    let mut output = json!({ "characterization": record });

    if record.tier == CharacterizationTier::Gold {
        let services = service_inputs_from_estimates(&record.ecosystem_services);
        if services.is_empty() {
            warn!("No ecosystem service estimates, skipping risk analysis");
        } else {
            let mc_config = MonteCarloConfig::from(&config.monte_carlo);
            let mc = run_monte_carlo(&services, &mc_config)?;
            let sensitivity = run_sensitivity(
                &services,
                &SensitivityConfig {
                    perturbation_levels: config.sensitivity.perturbation_levels.clone(),
                    monte_carlo: mc_config,
                },
            )?;
            info!(
                "Monte Carlo median {:.0} USD/yr [p5 {:.0}, p95 {:.0}], dominant: {:?}",
                mc.median, mc.p5, mc.p95, sensitivity.dominant_parameter
            );
            output["monte_carlo"] = json!(mc.summary());
            output["sensitivity"] = json!(sensitivity);
        }
    }

    if let Some(path) = &args.registry {
        match validate_for_tier(&record) {
            Ok(()) => {
                let mut registry = if path.exists() {
                    SiteRegistry::load(path)
                        .with_context(|| format!("Failed to load registry: {:?}", path))?
                } else {
                    SiteRegistry::new()
                };
                registry.upsert(record)?;
                registry
                    .save(path)
                    .with_context(|| format!("Failed to save registry: {:?}", path))?;
            }
            Err(e) => warn!("Not stored in registry: {}", e),
        }
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
