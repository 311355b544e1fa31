use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{path::{Path, PathBuf}, time::Duration};

use crate::market::MarketParams;
use crate::technology::{BatteryParams, BiomassParams, HydroParams, SolarParams, WindParams};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "RYS__";

/// Immutable run configuration, passed to components at construction.
///
/// Every section has compiled defaults; the TOML file and environment only
/// need to name what differs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub weather: WeatherConfig,
    pub solar: SolarParams,
    pub wind: WindParams,
    pub hydro: HydroParams,
    pub biomass: BiomassParams,
    pub battery: BatteryParams,
    pub market: MarketParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Most recent weather year used
    pub base_year: i32,
    pub years_to_simulate: usize,
    pub default_lifetime_years: u32,
    pub fetch_timeout_seconds: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_year: 2023,
            years_to_simulate: 3,
            default_lifetime_years: 25,
            fetch_timeout_seconds: 30,
        }
    }
}

impl SimulationConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Directory holding `<year>.json` weather files
    pub data_dir: PathBuf,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/weather"),
        }
    }
}

impl Config {
    /// Compiled defaults, then `config/default.toml`, then `RYS__*` variables
    /// (after loading `.env` if present).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::figment(path)
            .extract()
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }
}
