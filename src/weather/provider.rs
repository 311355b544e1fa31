//! Weather providers bundled with the crate.
//!
//! Remote acquisition and caching live outside this crate; these two cover
//! tests, batch runs over pre-fetched data, and the command-line binary.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use std::{collections::HashMap, path::PathBuf};
use tracing::debug;

use super::{Location, PanelOrientation, WeatherProvider, WeatherSeries};
use crate::error::{Result, SimulationError};
use crate::series;

/// Provider over weather already held in memory, keyed by year
#[derive(Debug, Clone, Default)]
pub struct InMemoryWeatherProvider {
    years: HashMap<i32, WeatherSeries>,
}

impl InMemoryWeatherProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_year(mut self, year: i32, weather: WeatherSeries) -> Self {
        self.years.insert(year, weather);
        self
    }
}

#[async_trait]
impl WeatherProvider for InMemoryWeatherProvider {
    async fn fetch_year(
        &self,
        _location: &Location,
        year: i32,
        _orientation: Option<PanelOrientation>,
    ) -> Result<WeatherSeries> {
        self.years
            .get(&year)
            .cloned()
            .ok_or_else(|| SimulationError::WeatherUnavailable {
                year,
                message: "no data loaded for this year".to_string(),
            })
    }
}

/// Provider reading one JSON file per year from `<data_dir>/<year>.json`
#[derive(Debug, Clone)]
pub struct DirectoryWeatherProvider {
    data_dir: PathBuf,
}

impl DirectoryWeatherProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path_for(&self, year: i32) -> PathBuf {
        self.data_dir.join(format!("{year}.json"))
    }
}

/// On-disk layout. Missing samples are `null`, missing columns are absent.
#[derive(Debug, Deserialize)]
struct WeatherFile {
    #[serde(default)]
    timestamps: Option<Vec<NaiveDateTime>>,
    #[serde(default)]
    temperature_c: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_mm: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_ms: Vec<Option<f64>>,
    #[serde(default)]
    ghi_w_m2: Vec<Option<f64>>,
    #[serde(default)]
    poa_w_m2: Option<Vec<Option<f64>>>,
    #[serde(default)]
    surface_pressure_hpa: Option<Vec<Option<f64>>>,
}

fn column(values: Vec<Option<f64>>) -> Vec<f64> {
    values.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

impl WeatherFile {
    fn into_series(self, year: i32) -> WeatherSeries {
        let timestamps = self
            .timestamps
            .unwrap_or_else(|| series::hourly_stamps(year, self.temperature_c.len()));
        let mut weather = WeatherSeries::new(
            timestamps,
            column(self.temperature_c),
            column(self.precipitation_mm),
            column(self.wind_speed_10m_ms),
            column(self.ghi_w_m2),
        );
        if let Some(poa) = self.poa_w_m2 {
            weather = weather.with_poa(column(poa));
        }
        if let Some(p) = self.surface_pressure_hpa {
            weather = weather.with_surface_pressure(column(p));
        }
        weather
    }
}

#[async_trait]
impl WeatherProvider for DirectoryWeatherProvider {
    async fn fetch_year(
        &self,
        location: &Location,
        year: i32,
        orientation: Option<PanelOrientation>,
    ) -> Result<WeatherSeries> {
        let path = self.path_for(year);
        debug!(
            path = %path.display(),
            latitude = location.latitude,
            longitude = location.longitude,
            tilted = orientation.is_some(),
            "reading weather file"
        );

        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SimulationError::WeatherUnavailable {
                year,
                message: format!("{}: {e}", path.display()),
            })?;
        let file: WeatherFile =
            serde_json::from_str(&raw).map_err(|e| SimulationError::WeatherUnavailable {
                year,
                message: format!("{}: {e}", path.display()),
            })?;
        Ok(file.into_series(year))
    }
}
