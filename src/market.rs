//! Synthetic electricity market prices.
//!
//! Used as the price signal for biomass dispatch and battery arbitrage when no
//! real market feed is wired in. The curve combines a yearly cosine, a
//! two-peak daily shape, a linear trend and Gaussian noise.

use async_trait::async_trait;
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, f64::consts::PI, sync::Arc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, SimulationError};
use crate::series::{HourlySeries, HOURS_PER_YEAR};

const SEASONAL_AMPLITUDE: f64 = 10.0;
const MORNING_PEAK_AMPLITUDE: f64 = 15.0;
const MORNING_PEAK_HOUR: f64 = 8.0;
const EVENING_PEAK_AMPLITUDE: f64 = 10.0;
const EVENING_PEAK_HOUR: f64 = 20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketParams {
    pub base_price_eur_mwh: f64,
    /// Noise standard deviation as a fraction of the base price
    pub volatility: f64,
    /// Linear drift per hour (EUR/MWh)
    pub trend_eur_mwh_per_hour: f64,
    /// Random seed for reproducibility (None = random)
    pub random_seed: Option<u64>,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            base_price_eur_mwh: 50.0,
            volatility: 0.2,
            trend_eur_mwh_per_hour: 0.0,
            random_seed: None,
        }
    }
}

/// Synthetic hourly price generator
pub struct MarketModel {
    params: MarketParams,
    noise: Normal<f64>,
    rng: StdRng,
}

impl MarketModel {
    pub fn new(params: MarketParams) -> Result<Self> {
        let finite = [
            params.base_price_eur_mwh,
            params.volatility,
            params.trend_eur_mwh_per_hour,
        ]
        .iter()
        .all(|v| v.is_finite());
        if !finite {
            return Err(SimulationError::InvalidMarket(
                "base price, volatility and trend must be finite".to_string(),
            ));
        }
        let sigma = (params.base_price_eur_mwh * params.volatility).abs();
        let noise = Normal::new(0.0, sigma)
            .map_err(|e| SimulationError::InvalidMarket(format!("volatility: {e}")))?;
        let rng = match params.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { params, noise, rng })
    }

    pub fn params(&self) -> &MarketParams {
        &self.params
    }

    /// Deterministic part of the price at hour `t` of the year
    pub fn expected_price(&self, t: usize) -> f64 {
        let t_f = t as f64;
        let hour_of_day = (t % 24) as f64;
        let seasonal = SEASONAL_AMPLITUDE * (2.0 * PI * t_f / HOURS_PER_YEAR as f64).cos();
        let daily = MORNING_PEAK_AMPLITUDE * (2.0 * PI * (hour_of_day - MORNING_PEAK_HOUR) / 24.0).sin()
            + EVENING_PEAK_AMPLITUDE * (2.0 * PI * (hour_of_day - EVENING_PEAK_HOUR) / 24.0).sin();
        self.params.base_price_eur_mwh + seasonal + daily + self.params.trend_eur_mwh_per_hour * t_f
    }

    /// 8760 non-negative hourly prices (EUR/MWh).
    ///
    /// Consecutive calls continue the same random stream, so two curves from
    /// one model differ unless the model is rebuilt with the same seed.
    pub fn generate_annual_price_curve(&mut self) -> HourlySeries {
        let mut prices = Vec::with_capacity(HOURS_PER_YEAR);
        for t in 0..HOURS_PER_YEAR {
            let noise = self.noise.sample(&mut self.rng);
            prices.push((self.expected_price(t) + noise).max(0.0));
        }
        prices
    }
}

/// Source of one year of hourly prices (EUR/MWh)
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn annual_prices(&self, year: i32) -> Result<HourlySeries>;
}

/// Price source backed by [`MarketModel`], one cached curve per year
#[derive(Clone)]
pub struct SyntheticPriceSource {
    params: MarketParams,
    cache: Arc<RwLock<HashMap<i32, HourlySeries>>>,
}

impl SyntheticPriceSource {
    pub fn new(params: MarketParams) -> Result<Self> {
        // Fail on bad parameters here rather than on first use
        MarketModel::new(params.clone())?;
        Ok(Self {
            params,
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }
}

#[async_trait]
impl PriceSource for SyntheticPriceSource {
    async fn annual_prices(&self, year: i32) -> Result<HourlySeries> {
        if let Some(prices) = self.cache.read().await.get(&year) {
            return Ok(prices.clone());
        }

        let mut params = self.params.clone();
        params.random_seed = params.random_seed.map(|s| s.wrapping_add(year as u64));
        let prices = MarketModel::new(params)?.generate_annual_price_curve();
        debug!(year, "generated synthetic price curve");

        let mut cache = self.cache.write().await;
        Ok(cache.entry(year).or_insert(prices).clone())
    }
}
