//! # Simulation Engine
//!
//! One call per technology: resolve parameters, gather weather (or prices),
//! run the model, reduce to a representative year and project it over the
//! plant lifetime. Every call builds fresh models and shares no mutable state
//! with other calls, so independent requests can run concurrently.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::aggregate::{
    run_per_year, summarize, AggregationWindow, AnnualSummary, LongTermProjector,
    MultiYearAggregator,
};
use crate::config::Config;
use crate::error::{Result, SimulationError};
use crate::market::PriceSource;
use crate::series::{self, HourlySeries, HOURS_PER_YEAR};
use crate::technology::{
    layer_overrides, solar, ArbitrageResult, BatteryStorage, BiomassOptimizer, DispatchSummary,
    HydroModel, SolarModel, Technology, TechnologyParams, WeibullDistribution, WindModel,
};
use crate::weather::{Location, PanelOrientation, WeatherProvider, WeatherSeries};

/// A request for one plant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub technology: Technology,
    pub location: Location,
    pub capacity_kw: f64,
    /// Parameter overrides layered over the configured defaults
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub orientation: Option<PanelOrientation>,
    #[serde(default)]
    pub lifetime_years: Option<u32>,
    /// Overrides the technology's annual degradation
    #[serde(default)]
    pub degradation_rate: Option<f64>,
}

/// Technology-specific figures reported next to the energy totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TechnologyDetails {
    Solar {
        peak_sun_hours: f64,
    },
    Wind {
        /// Fitted to hub-height speeds; absent for calm or constant wind
        hub_distribution: Option<WeibullDistribution>,
        expected_power_kw: Option<f64>,
    },
    Hydro {
        rated_power_kw: Option<f64>,
    },
    Biomass {
        marginal_cost_eur_mwh: f64,
        dispatch: DispatchSummary,
    },
}

/// Outcome of one generation simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub technology: Technology,
    pub capacity_kw: f64,
    pub total_annual_kwh: f64,
    pub capacity_factor: f64,
    /// Representative energy per calendar month (kWh), keyed 1..=12
    pub monthly_profile: BTreeMap<u32, f64>,
    /// Most recent year of hourly output (kW)
    pub hourly_sample: HourlySeries,
    /// `lifetime_years × 12` monthly values with degradation applied
    pub long_term_monthly: Vec<f64>,
    pub lifetime_years: u32,
    pub degradation_rate: f64,
    pub years_simulated: f64,
    pub insufficient_data: bool,
    pub details: TechnologyDetails,
}

/// A battery arbitrage request against one year of prices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageRequest {
    #[serde(default)]
    pub params: serde_json::Value,
    /// Price year; defaults to the configured base year
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageResult {
    pub year: i32,
    #[serde(flatten)]
    pub arbitrage: ArbitrageResult,
    pub revenue_eur: f64,
}

pub struct SimulationEngine {
    config: Config,
    weather: Arc<dyn WeatherProvider>,
    prices: Arc<dyn PriceSource>,
}

impl SimulationEngine {
    pub fn new(
        config: Config,
        weather: Arc<dyn WeatherProvider>,
        prices: Arc<dyn PriceSource>,
    ) -> Self {
        Self {
            config,
            weather,
            prices,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn window(&self) -> AggregationWindow {
        AggregationWindow {
            base_year: self.config.simulation.base_year,
            years: self.config.simulation.years_to_simulate,
            fetch_timeout: self.config.simulation.fetch_timeout(),
        }
    }

    /// Configured defaults for `technology` with `overrides` layered on top
    pub fn resolve_params(
        &self,
        technology: Technology,
        overrides: &serde_json::Value,
    ) -> Result<TechnologyParams> {
        let cfg = &self.config;
        Ok(match technology {
            Technology::Solar => {
                TechnologyParams::Solar(layer_overrides(technology, &cfg.solar, overrides)?)
            }
            Technology::Wind => {
                TechnologyParams::Wind(layer_overrides(technology, &cfg.wind, overrides)?)
            }
            Technology::Hydro => {
                TechnologyParams::Hydro(layer_overrides(technology, &cfg.hydro, overrides)?)
            }
            Technology::Biomass => {
                TechnologyParams::Biomass(layer_overrides(technology, &cfg.biomass, overrides)?)
            }
            Technology::Battery => {
                return Err(SimulationError::invalid(
                    technology,
                    "storage does not generate; use the arbitrage call",
                ))
            }
        })
    }

    pub async fn simulate(&self, request: &SimulationRequest) -> Result<GenerationResult> {
        let technology = request.technology;
        let capacity_kw = series::sanitize_capacity(request.capacity_kw);
        if capacity_kw != request.capacity_kw {
            warn!(%technology, requested = request.capacity_kw, "unusable capacity treated as zero");
        }
        info!(
            %technology,
            capacity_kw,
            latitude = request.location.latitude,
            longitude = request.location.longitude,
            "simulation requested"
        );

        let params = self.resolve_params(technology, &request.params)?;
        let lifetime_years = request
            .lifetime_years
            .unwrap_or(self.config.simulation.default_lifetime_years);
        let degradation_rate = request
            .degradation_rate
            .unwrap_or_else(|| params.degradation_rate());
        let projector = LongTermProjector::new(technology, lifetime_years, degradation_rate)?;

        let (summary, details) = match params {
            TechnologyParams::Biomass(p) => {
                let optimizer = BiomassOptimizer::new(p)?;
                self.run_biomass(optimizer, capacity_kw).await?
            }
            generation => {
                let model = GenerationModel::build(generation)?;
                let weather = MultiYearAggregator::new(Arc::clone(&self.weather), self.window())
                    .concatenated_weather(&request.location, request.orientation)
                    .await?;
                tokio::task::spawn_blocking(move || {
                    let (hourly, details) = model.run(&weather, capacity_kw);
                    (summarize(&hourly, &weather.timestamps), details)
                })
                .await
                .map_err(|e| SimulationError::Task(format!("{technology}: {e}")))?
            }
        };

        let long_term_monthly = projector.project(&summary.monthly_values());
        let capacity_factor = if capacity_kw > 0.0 {
            summary.total_annual_kwh / (capacity_kw * HOURS_PER_YEAR as f64)
        } else {
            0.0
        };

        info!(
            %technology,
            total_annual_kwh = summary.total_annual_kwh,
            capacity_factor,
            years = summary.years_simulated,
            "simulation finished"
        );

        Ok(GenerationResult {
            technology,
            capacity_kw,
            total_annual_kwh: summary.total_annual_kwh,
            capacity_factor,
            monthly_profile: summary.monthly_profile,
            hourly_sample: summary.hourly_sample,
            long_term_monthly,
            lifetime_years,
            degradation_rate,
            years_simulated: summary.years_simulated,
            insufficient_data: summary.insufficient_data,
            details,
        })
    }

    /// Biomass runs year by year so each year gets its own fuel budget
    async fn run_biomass(
        &self,
        optimizer: BiomassOptimizer,
        capacity_kw: f64,
    ) -> Result<(AnnualSummary, TechnologyDetails)> {
        let years = self.window().year_range();
        let fetched = join_all(years.iter().map(|year| self.fetch_prices(*year))).await;

        let mut inputs = Vec::with_capacity(years.len());
        for (year, prices) in years.iter().zip(fetched) {
            match prices {
                Ok(p) => inputs.push((*year, p)),
                Err(e) => warn!(year, error = %e, "price fetch failed, skipping year"),
            }
        }
        if inputs.is_empty() {
            return Err(SimulationError::InsufficientData {
                technology: Technology::Biomass,
                message: "no price year available".to_string(),
            });
        }

        let optimizer = Arc::new(optimizer);
        let model = Arc::clone(&optimizer);
        let outputs = run_per_year(
            inputs.clone(),
            Arc::new(move |prices: &HourlySeries| model.dispatch(prices, capacity_kw)),
        )
        .await?;

        let mut hourly = Vec::new();
        let mut stamps = Vec::new();
        let mut dispatch = DispatchSummary::default();
        for ((year, prices), (_, output)) in inputs.iter().zip(&outputs) {
            let year_summary = optimizer.summarize(prices, output);
            dispatch.hours_dispatched += year_summary.hours_dispatched;
            dispatch.energy_kwh += year_summary.energy_kwh;
            dispatch.fuel_burned_kg += year_summary.fuel_burned_kg;
            dispatch.gross_margin_eur += year_summary.gross_margin_eur;
            stamps.extend(series::hourly_stamps(*year, output.len()));
            hourly.extend_from_slice(output);
        }

        let details = TechnologyDetails::Biomass {
            marginal_cost_eur_mwh: optimizer.marginal_cost(),
            dispatch,
        };
        Ok((summarize(&hourly, &stamps), details))
    }

    async fn fetch_prices(&self, year: i32) -> Result<HourlySeries> {
        match timeout(
            self.config.simulation.fetch_timeout(),
            self.prices.annual_prices(year),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SimulationError::Timeout { year }),
        }
    }

    /// Battery arbitrage against the price curve of one year
    pub async fn arbitrage(&self, request: &StorageRequest) -> Result<StorageResult> {
        let params = layer_overrides(Technology::Battery, &self.config.battery, &request.params)?;
        let storage = BatteryStorage::new(params)?;
        let year = request.year.unwrap_or(self.config.simulation.base_year);
        let prices = self.fetch_prices(year).await?;

        let arbitrage = storage.arbitrage(&prices);
        let revenue_eur = arbitrage.revenue_eur(&prices);
        info!(year, revenue_eur, "arbitrage simulated");
        Ok(StorageResult {
            year,
            arbitrage,
            revenue_eur,
        })
    }
}

/// A weather-driven model, validated before any weather is fetched
#[derive(Debug, Clone)]
pub enum GenerationModel {
    Solar(SolarModel),
    Wind(WindModel),
    Hydro(HydroModel),
}

impl GenerationModel {
    pub fn build(params: TechnologyParams) -> Result<Self> {
        Ok(match params {
            TechnologyParams::Solar(p) => GenerationModel::Solar(SolarModel::new(p)?),
            TechnologyParams::Wind(p) => GenerationModel::Wind(WindModel::new(p)?),
            TechnologyParams::Hydro(p) => GenerationModel::Hydro(HydroModel::new(p)?),
            TechnologyParams::Biomass(_) => {
                return Err(SimulationError::invalid(
                    Technology::Biomass,
                    "biomass is driven by prices, not weather",
                ))
            }
        })
    }

    pub fn technology(&self) -> Technology {
        match self {
            GenerationModel::Solar(_) => Technology::Solar,
            GenerationModel::Wind(_) => Technology::Wind,
            GenerationModel::Hydro(_) => Technology::Hydro,
        }
    }

    /// Hourly output over `weather` plus the technology's reporting figures
    pub fn run(&self, weather: &WeatherSeries, capacity_kw: f64) -> (HourlySeries, TechnologyDetails) {
        match self {
            GenerationModel::Solar(model) => {
                let hourly =
                    model.generate(weather.irradiance(), &weather.temperature_c, capacity_kw);
                let ghi = &weather.ghi_w_m2;
                let last_year = &ghi[ghi.len().saturating_sub(HOURS_PER_YEAR)..];
                let details = TechnologyDetails::Solar {
                    peak_sun_hours: solar::peak_sun_hours(last_year),
                };
                (hourly, details)
            }
            GenerationModel::Wind(model) => {
                let hourly = model.generate(
                    &weather.wind_speed_10m_ms,
                    capacity_kw,
                    Some(&weather.temperature_c),
                    weather.surface_pressure_hpa.as_deref(),
                );
                let hub_speeds: Vec<f64> = weather
                    .wind_speed_10m_ms
                    .iter()
                    .map(|v| model.hub_speed(*v))
                    .collect();
                let hub_distribution = WeibullDistribution::fit(&hub_speeds);
                let details = TechnologyDetails::Wind {
                    hub_distribution,
                    expected_power_kw: hub_distribution
                        .map(|d| model.expected_power_kw(&d, capacity_kw)),
                };
                (hourly, details)
            }
            GenerationModel::Hydro(model) => {
                let hourly = model.generate(&weather.precipitation_mm);
                let details = TechnologyDetails::Hydro {
                    rated_power_kw: model.rated_power_kw(),
                };
                (hourly, details)
            }
        }
    }
}

/// Run a weather-driven model over an already assembled weather series
pub fn run_weather_model(
    params: TechnologyParams,
    weather: &WeatherSeries,
    capacity_kw: f64,
) -> Result<(AnnualSummary, TechnologyDetails)> {
    let model = GenerationModel::build(params)?;
    let (hourly, details) = model.run(weather, capacity_kw);
    Ok((summarize(&hourly, &weather.timestamps), details))
}
