use anyhow::{Context, Result};
use renewable_yield_sim::{
    config::Config,
    market::SyntheticPriceSource,
    telemetry::init_tracing,
    weather::DirectoryWeatherProvider,
    SimulationEngine, SimulationRequest,
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let path = std::env::args()
        .nth(1)
        .context("usage: renewable-yield-sim <request.json>")?;

    let cfg = Config::load()?;
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("failed to read {path}"))?;
    let request: SimulationRequest =
        serde_json::from_str(&raw).with_context(|| format!("invalid request in {path}"))?;

    info!(data_dir = %cfg.weather.data_dir.display(), "starting simulation");
    let weather = Arc::new(DirectoryWeatherProvider::new(cfg.weather.data_dir.clone()));
    let prices = Arc::new(SyntheticPriceSource::new(cfg.market.clone())?);
    let engine = SimulationEngine::new(cfg, weather, prices);

    let result = engine.simulate(&request).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
