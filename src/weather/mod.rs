//! Hourly weather at the collaborator boundary.
//!
//! Weather arrives as a typed column set rather than a loosely-keyed table.
//! Optional columns (plane-of-array irradiance, surface pressure) stay `None`
//! when the provider has no data for them; models then skip the correction
//! that depends on them.

pub mod provider;

pub use provider::*;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::series::{self, HourlySeries};

/// Geographic location
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Module orientation for plane-of-array irradiance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelOrientation {
    /// Tilt from horizontal (degrees)
    pub tilt_deg: f64,
    /// Azimuth, 180 = south (degrees)
    pub azimuth_deg: f64,
}

/// Hourly weather columns of equal length
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub temperature_c: HourlySeries,
    pub precipitation_mm: HourlySeries,
    pub wind_speed_10m_ms: HourlySeries,
    pub ghi_w_m2: HourlySeries,
    pub poa_w_m2: Option<HourlySeries>,
    pub surface_pressure_hpa: Option<HourlySeries>,
}

impl WeatherSeries {
    /// Build from the mandatory columns, truncating all of them to the shortest
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        temperature_c: HourlySeries,
        precipitation_mm: HourlySeries,
        wind_speed_10m_ms: HourlySeries,
        ghi_w_m2: HourlySeries,
    ) -> Self {
        Self {
            timestamps,
            temperature_c,
            precipitation_mm,
            wind_speed_10m_ms,
            ghi_w_m2,
            poa_w_m2: None,
            surface_pressure_hpa: None,
        }
        .aligned()
    }

    pub fn with_poa(mut self, poa_w_m2: HourlySeries) -> Self {
        self.poa_w_m2 = Some(poa_w_m2);
        self.aligned()
    }

    pub fn with_surface_pressure(mut self, pressure_hpa: HourlySeries) -> Self {
        self.surface_pressure_hpa = Some(pressure_hpa);
        self.aligned()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Truncate every column to the shortest one
    pub fn aligned(mut self) -> Self {
        let mut lengths = vec![
            self.timestamps.len(),
            self.temperature_c.len(),
            self.precipitation_mm.len(),
            self.wind_speed_10m_ms.len(),
            self.ghi_w_m2.len(),
        ];
        lengths.extend(self.poa_w_m2.as_ref().map(Vec::len));
        lengths.extend(self.surface_pressure_hpa.as_ref().map(Vec::len));
        let n = lengths.into_iter().min().unwrap_or(0);

        self.timestamps.truncate(n);
        self.temperature_c.truncate(n);
        self.precipitation_mm.truncate(n);
        self.wind_speed_10m_ms.truncate(n);
        self.ghi_w_m2.truncate(n);
        if let Some(poa) = self.poa_w_m2.as_mut() {
            poa.truncate(n);
        }
        if let Some(p) = self.surface_pressure_hpa.as_mut() {
            p.truncate(n);
        }
        self
    }

    /// Plane-of-array irradiance when it carries any data, otherwise GHI
    pub fn irradiance(&self) -> &[f64] {
        match &self.poa_w_m2 {
            Some(poa) if poa.iter().any(|v| v.is_finite()) => poa,
            _ => &self.ghi_w_m2,
        }
    }

    /// Join consecutive years into one series.
    ///
    /// An optional column survives only if every part carries it, so the
    /// joined columns stay aligned.
    pub fn concat(parts: Vec<WeatherSeries>) -> WeatherSeries {
        let keep_poa = parts.iter().all(|p| p.poa_w_m2.is_some());
        let keep_pressure = parts.iter().all(|p| p.surface_pressure_hpa.is_some());

        let mut out = WeatherSeries {
            poa_w_m2: keep_poa.then(Vec::new),
            surface_pressure_hpa: keep_pressure.then(Vec::new),
            ..Default::default()
        };
        for part in parts {
            let part = part.aligned();
            out.timestamps.extend(part.timestamps);
            out.temperature_c.extend(part.temperature_c);
            out.precipitation_mm.extend(part.precipitation_mm);
            out.wind_speed_10m_ms.extend(part.wind_speed_10m_ms);
            out.ghi_w_m2.extend(part.ghi_w_m2);
            if let (Some(all), Some(poa)) = (out.poa_w_m2.as_mut(), part.poa_w_m2) {
                all.extend(poa);
            }
            if let (Some(all), Some(p)) = (out.surface_pressure_hpa.as_mut(), part.surface_pressure_hpa) {
                all.extend(p);
            }
        }
        out
    }

    /// A constant-weather year, handy for tests and smoke runs
    pub fn constant(year: i32, hours: usize, sample: WeatherSample) -> Self {
        Self::new(
            series::hourly_stamps(year, hours),
            vec![sample.temperature_c; hours],
            vec![sample.precipitation_mm; hours],
            vec![sample.wind_speed_10m_ms; hours],
            vec![sample.ghi_w_m2; hours],
        )
    }
}

/// One hour of weather
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherSample {
    pub temperature_c: f64,
    pub precipitation_mm: f64,
    pub wind_speed_10m_ms: f64,
    pub ghi_w_m2: f64,
}

/// Supplier of one calendar year of hourly weather for a location
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch_year(
        &self,
        location: &Location,
        year: i32,
        orientation: Option<PanelOrientation>,
    ) -> Result<WeatherSeries>;
}
