//! Multi-year aggregation.
//!
//! Weather for several consecutive years is fetched concurrently, joined into
//! one series, run through a technology model and reduced to a representative
//! year: an average annual total, a twelve-month profile and the most recent
//! year of hourly output.

use chrono::{Datelike, NaiveDateTime};
use futures::future::join_all;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::{Result, SimulationError};
use crate::series::{self, HourlySeries, HOURS_PER_YEAR};
use crate::weather::{Location, PanelOrientation, WeatherProvider, WeatherSeries};

/// Longest window `year_range` will produce
pub const MAX_WINDOW_YEARS: i32 = 100;

/// Which years to fetch and how long to wait for each
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregationWindow {
    /// Most recent year, included
    pub base_year: i32,
    pub years: usize,
    pub fetch_timeout: Duration,
}

impl AggregationWindow {
    /// Years in chronological order, ending at `base_year`
    pub fn year_range(&self) -> Vec<i32> {
        let n = i32::try_from(self.years)
            .unwrap_or(MAX_WINDOW_YEARS)
            .clamp(1, MAX_WINDOW_YEARS);
        (self.base_year.saturating_sub(n - 1)..=self.base_year).collect()
    }
}

/// Reduction of an hourly output series to a representative year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualSummary {
    pub total_annual_kwh: f64,
    /// Average energy per calendar month (kWh), keyed 1..=12
    pub monthly_profile: BTreeMap<u32, f64>,
    /// Last 8760 hours of output (or all of it, if shorter)
    pub hourly_sample: HourlySeries,
    pub years_simulated: f64,
    /// Fewer than one full year of hourly samples was available
    pub insufficient_data: bool,
}

impl AnnualSummary {
    /// Monthly profile as twelve values, January first
    pub fn monthly_values(&self) -> [f64; 12] {
        let mut out = [0.0; 12];
        for (month, kwh) in &self.monthly_profile {
            if let Some(slot) = out.get_mut((*month as usize).wrapping_sub(1)) {
                *slot = *kwh;
            }
        }
        out
    }
}

pub struct MultiYearAggregator {
    provider: Arc<dyn WeatherProvider>,
    window: AggregationWindow,
}

impl MultiYearAggregator {
    pub fn new(provider: Arc<dyn WeatherProvider>, window: AggregationWindow) -> Self {
        Self { provider, window }
    }

    pub fn window(&self) -> &AggregationWindow {
        &self.window
    }

    async fn fetch_one(
        &self,
        location: &Location,
        year: i32,
        orientation: Option<PanelOrientation>,
    ) -> Result<WeatherSeries> {
        match timeout(
            self.window.fetch_timeout,
            self.provider.fetch_year(location, year, orientation),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SimulationError::Timeout { year }),
        }
    }

    /// Fetch every year of the window concurrently.
    ///
    /// Years that fail or time out are skipped with a warning. When none
    /// succeed the base year is tried once more on its own.
    pub async fn fetch_years(
        &self,
        location: &Location,
        orientation: Option<PanelOrientation>,
    ) -> Result<Vec<(i32, WeatherSeries)>> {
        let years = self.window.year_range();
        let fetches = years
            .iter()
            .map(|year| self.fetch_one(location, *year, orientation));
        let results = join_all(fetches).await;

        let mut fetched = Vec::with_capacity(years.len());
        for (year, result) in years.iter().zip(results) {
            match result {
                Ok(weather) if !weather.is_empty() => fetched.push((*year, weather)),
                Ok(_) => warn!(year, "weather provider returned no samples, skipping year"),
                Err(e) => warn!(year, error = %e, "weather fetch failed, skipping year"),
            }
        }

        if fetched.is_empty() {
            let base = self.window.base_year;
            warn!(year = base, "no year could be fetched, retrying base year");
            let weather = self.fetch_one(location, base, orientation).await?;
            if weather.is_empty() {
                return Err(SimulationError::WeatherUnavailable {
                    year: base,
                    message: "provider returned no samples".to_string(),
                });
            }
            fetched.push((base, weather));
        }

        info!(
            requested = years.len(),
            fetched = fetched.len(),
            "weather years assembled"
        );
        Ok(fetched)
    }

    /// Fetch the window and join it into one chronological series
    pub async fn concatenated_weather(
        &self,
        location: &Location,
        orientation: Option<PanelOrientation>,
    ) -> Result<WeatherSeries> {
        let years = self.fetch_years(location, orientation).await?;
        Ok(WeatherSeries::concat(
            years.into_iter().map(|(_, w)| w).collect(),
        ))
    }
}

/// Run `model` on each year's input on the blocking pool and return the
/// outputs in the order given.
///
/// Used where a model must see one year at a time, such as biomass dispatch
/// under an annual fuel budget.
pub async fn run_per_year<I, F>(inputs: Vec<(i32, I)>, model: Arc<F>) -> Result<Vec<(i32, HourlySeries)>>
where
    I: Send + 'static,
    F: Fn(&I) -> HourlySeries + Send + Sync + 'static,
{
    let handles: Vec<_> = inputs
        .into_iter()
        .map(|(year, input)| {
            let model = Arc::clone(&model);
            let handle = tokio::task::spawn_blocking(move || model(&input));
            (year, handle)
        })
        .collect();

    let mut outputs = Vec::with_capacity(handles.len());
    for (year, handle) in handles {
        let series = handle
            .await
            .map_err(|e| SimulationError::Task(format!("year {year}: {e}")))?;
        outputs.push((year, series));
    }
    Ok(outputs)
}

/// Reduce hourly output (kW, so kWh per hour) to a representative year.
///
/// Monthly values average the same calendar month across the years it
/// appears in. `stamps` is truncated together with `hourly_kw`.
pub fn summarize(hourly_kw: &[f64], stamps: &[NaiveDateTime]) -> AnnualSummary {
    let n = hourly_kw.len().min(stamps.len());
    let hourly = &hourly_kw[..n];
    let years_simulated = series::years_covered(n);

    let total: f64 = hourly.iter().filter(|v| v.is_finite()).sum();
    let total_annual_kwh = if years_simulated > 0.0 {
        total / years_simulated.max(1.0)
    } else {
        0.0
    };

    let mut month_sums: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (kw, stamp) in hourly.iter().zip(&stamps[..n]) {
        let v = if kw.is_finite() { *kw } else { 0.0 };
        *month_sums.entry((stamp.year(), stamp.month())).or_insert(0.0) += v;
    }

    let mut monthly_profile: BTreeMap<u32, f64> = (1..=12).map(|m| (m, 0.0)).collect();
    let by_month = month_sums
        .into_iter()
        .map(|((_, month), kwh)| (month, kwh))
        .into_group_map();
    for (month, sums) in by_month {
        monthly_profile.insert(month, sums.iter().sum::<f64>() / sums.len() as f64);
    }

    let sample_start = n.saturating_sub(HOURS_PER_YEAR);
    AnnualSummary {
        total_annual_kwh,
        monthly_profile,
        hourly_sample: hourly[sample_start..].to_vec(),
        years_simulated,
        insufficient_data: n < HOURS_PER_YEAR,
    }
}
