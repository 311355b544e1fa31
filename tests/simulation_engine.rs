//! End-to-end runs of the simulation engine against mocked collaborators.

use async_trait::async_trait;
use mockall::mock;
use renewable_yield_sim::{
    config::Config,
    engine::TechnologyDetails,
    market::PriceSource,
    series::{self, HourlySeries, HOURS_PER_YEAR},
    technology::Technology,
    weather::{Location, PanelOrientation, WeatherProvider, WeatherSeries},
    Result, SimulationEngine, SimulationError, SimulationRequest, StorageRequest,
};
use serde_json::json;
use std::{f64::consts::PI, sync::Arc, time::Duration};

mock! {
    pub Weather {}

    #[async_trait]
    impl WeatherProvider for Weather {
        async fn fetch_year(
            &self,
            location: &Location,
            year: i32,
            orientation: Option<PanelOrientation>,
        ) -> Result<WeatherSeries>;
    }
}

mock! {
    pub Prices {}

    #[async_trait]
    impl PriceSource for Prices {
        async fn annual_prices(&self, year: i32) -> Result<HourlySeries>;
    }
}

const MADRID: Location = Location {
    latitude: 40.4,
    longitude: -3.7,
};

/// Clear-sky-ish daily irradiance cycle, mild temperatures, steady breeze
fn weather_for(year: i32) -> WeatherSeries {
    let hours = HOURS_PER_YEAR;
    let ghi: Vec<f64> = (0..hours)
        .map(|h| {
            let hour_of_day = (h % 24) as f64;
            (900.0 * (PI * (hour_of_day - 6.0) / 12.0).sin()).max(0.0)
        })
        .collect();
    WeatherSeries::new(
        series::hourly_stamps(year, hours),
        vec![15.0; hours],
        vec![0.2; hours],
        (0..hours).map(|h| 4.0 + (h % 10) as f64).collect(),
        ghi,
    )
}

fn weather_mock() -> MockWeather {
    let mut weather = MockWeather::new();
    weather
        .expect_fetch_year()
        .returning(|_, year, _| Ok(weather_for(year)));
    weather
}

fn idle_prices() -> MockPrices {
    let mut prices = MockPrices::new();
    prices.expect_annual_prices().never();
    prices
}

fn engine(weather: MockWeather, prices: MockPrices) -> SimulationEngine {
    SimulationEngine::new(Config::default(), Arc::new(weather), Arc::new(prices))
}

fn request(technology: Technology, capacity_kw: f64) -> SimulationRequest {
    SimulationRequest {
        technology,
        location: MADRID,
        capacity_kw,
        params: serde_json::Value::Null,
        orientation: None,
        lifetime_years: None,
        degradation_rate: None,
    }
}

#[tokio::test]
async fn test_solar_year_profile() {
    let engine = engine(weather_mock(), idle_prices());
    let result = engine.simulate(&request(Technology::Solar, 100.0)).await.unwrap();

    assert_eq!(result.technology, Technology::Solar);
    assert_eq!(result.years_simulated, 3.0);
    assert!(!result.insufficient_data);
    assert_eq!(result.hourly_sample.len(), HOURS_PER_YEAR);
    assert_eq!(result.monthly_profile.len(), 12);
    assert!(result.capacity_factor > 0.1 && result.capacity_factor < 0.4);

    let monthly_total: f64 = result.monthly_profile.values().sum();
    assert!((monthly_total - result.total_annual_kwh).abs() < 1e-6 * result.total_annual_kwh);

    assert_eq!(result.lifetime_years, 25);
    assert_eq!(result.degradation_rate, 0.005);
    assert_eq!(result.long_term_monthly.len(), 25 * 12);
    assert!((result.long_term_monthly[12] - result.long_term_monthly[0] * 0.995).abs() < 1e-9);
    assert!(matches!(result.details, TechnologyDetails::Solar { .. }));
}

#[tokio::test]
async fn test_failed_year_is_skipped() {
    let mut weather = MockWeather::new();
    weather.expect_fetch_year().returning(|_, year, _| {
        if year == 2022 {
            Err(SimulationError::WeatherUnavailable {
                year,
                message: "provider down".to_string(),
            })
        } else {
            Ok(weather_for(year))
        }
    });
    let engine = engine(weather, idle_prices());
    let result = engine.simulate(&request(Technology::Wind, 2000.0)).await.unwrap();
    assert_eq!(result.years_simulated, 2.0);
    assert!(result.total_annual_kwh > 0.0);
}

#[tokio::test]
async fn test_orientation_reaches_provider() {
    let mut weather = MockWeather::new();
    weather
        .expect_fetch_year()
        .withf(|location, _, orientation| {
            *location == MADRID
                && *orientation
                    == Some(PanelOrientation {
                        tilt_deg: 30.0,
                        azimuth_deg: 180.0,
                    })
        })
        .times(3)
        .returning(|_, year, _| Ok(weather_for(year)));

    let mut req = request(Technology::Solar, 10.0);
    req.orientation = Some(PanelOrientation {
        tilt_deg: 30.0,
        azimuth_deg: 180.0,
    });
    engine(weather, idle_prices()).simulate(&req).await.unwrap();
}

#[tokio::test]
async fn test_wind_reports_fitted_distribution() {
    let engine = engine(weather_mock(), idle_prices());
    let result = engine.simulate(&request(Technology::Wind, 2000.0)).await.unwrap();
    match result.details {
        TechnologyDetails::Wind {
            hub_distribution,
            expected_power_kw,
        } => {
            assert!(hub_distribution.is_some());
            let expected = expected_power_kw.unwrap();
            assert!(expected > 0.0 && expected <= 2000.0);
        }
        other => panic!("unexpected details {other:?}"),
    }
}

#[tokio::test]
async fn test_zero_capacity_is_all_zero() {
    let engine = engine(weather_mock(), idle_prices());
    let result = engine.simulate(&request(Technology::Solar, 0.0)).await.unwrap();
    assert_eq!(result.total_annual_kwh, 0.0);
    assert_eq!(result.capacity_factor, 0.0);
    assert!(result.long_term_monthly.iter().all(|v| *v == 0.0));
}

#[tokio::test]
async fn test_dry_hydro_without_design_flow() {
    let mut weather = MockWeather::new();
    weather.expect_fetch_year().returning(|_, year, _| {
        let mut w = weather_for(year);
        w.precipitation_mm = vec![0.0; w.len()];
        Ok(w)
    });
    let result = engine(weather, idle_prices())
        .simulate(&request(Technology::Hydro, 500.0))
        .await
        .unwrap();
    assert_eq!(result.total_annual_kwh, 0.0);
}

#[tokio::test]
async fn test_dry_hydro_with_design_flow_falls_back() {
    let mut weather = MockWeather::new();
    weather.expect_fetch_year().returning(|_, year, _| {
        let mut w = weather_for(year);
        w.precipitation_mm = vec![0.0; w.len()];
        Ok(w)
    });
    let mut req = request(Technology::Hydro, 500.0);
    req.params = json!({ "design_flow_m3s": 2.0, "head_height_m": 20.0 });
    let result = engine(weather, idle_prices()).simulate(&req).await.unwrap();

    let rated = 1000.0 * 9.81 * 2.0 * 20.0 * 0.9 / 1000.0;
    assert!(result.total_annual_kwh > 0.0);
    assert!(result.hourly_sample.iter().all(|p| *p <= rated + 1e-9));
    assert_eq!(
        result.details,
        TechnologyDetails::Hydro {
            rated_power_kw: Some(rated)
        }
    );
}

#[tokio::test]
async fn test_biomass_dispatches_per_year() {
    let mut prices = MockPrices::new();
    prices.expect_annual_prices().times(3).returning(|_| {
        Ok((0..HOURS_PER_YEAR)
            .map(|h| if h % 2 == 0 { 10.0 } else { 200.0 })
            .collect())
    });
    let weather = {
        let mut w = MockWeather::new();
        w.expect_fetch_year().never();
        w
    };

    let result = engine(weather, prices)
        .simulate(&request(Technology::Biomass, 1000.0))
        .await
        .unwrap();
    assert!((result.total_annual_kwh - 4380.0 * 1000.0).abs() < 1e-6);
    assert!((result.capacity_factor - 0.5).abs() < 1e-12);
    match result.details {
        TechnologyDetails::Biomass {
            marginal_cost_eur_mwh,
            dispatch,
        } => {
            assert!((marginal_cost_eur_mwh - 133.333).abs() < 1e-2);
            assert_eq!(dispatch.hours_dispatched, 3 * 4380);
        }
        other => panic!("unexpected details {other:?}"),
    }
}

#[tokio::test]
async fn test_biomass_fuel_budget_limits_hours() {
    let mut prices = MockPrices::new();
    prices
        .expect_annual_prices()
        .returning(|_| Ok((0..HOURS_PER_YEAR).map(|h| 140.0 + (h % 100) as f64).collect()));

    let mut req = request(Technology::Biomass, 100.0);
    // 100 kW burns ~88.9 kg per hour: 10 t per year is 112 hours
    req.params = json!({ "fuel_budget": { "mode": "annual_limit", "max_fuel_ton": 10.0 } });
    let result = engine(MockWeather::new(), prices).simulate(&req).await.unwrap();
    assert!((result.total_annual_kwh - 112.0 * 100.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_storage_is_not_a_generator() {
    let err = engine(MockWeather::new(), idle_prices())
        .simulate(&request(Technology::Battery, 100.0))
        .await
        .unwrap_err();
    assert_eq!(err.technology(), Some(Technology::Battery));
}

fn idle_weather() -> MockWeather {
    let mut weather = MockWeather::new();
    weather.expect_fetch_year().never();
    weather
}

#[tokio::test]
async fn test_non_physical_override_is_rejected_before_fetching() {
    let mut req = request(Technology::Wind, 100.0);
    req.params = json!({ "roughness_length_m": 0.0 });
    let err = engine(idle_weather(), idle_prices())
        .simulate(&req)
        .await
        .unwrap_err();
    assert_eq!(err.technology(), Some(Technology::Wind));
}

#[tokio::test]
async fn test_incomplete_fuel_budget_is_rejected() {
    let mut req = request(Technology::Biomass, 100.0);
    req.params = json!({ "fuel_budget": { "mode": "annual_limit" } });
    let err = engine(idle_weather(), idle_prices())
        .simulate(&req)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SimulationError::InvalidConfig {
            technology: Technology::Biomass,
            ..
        }
    ));
}

/// Price feed that never answers for one year
struct StalledPrices {
    stalled_year: i32,
}

#[async_trait]
impl PriceSource for StalledPrices {
    async fn annual_prices(&self, year: i32) -> Result<HourlySeries> {
        if year == self.stalled_year {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(vec![200.0; HOURS_PER_YEAR])
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_price_year_times_out_and_is_skipped() {
    let engine = SimulationEngine::new(
        Config::default(),
        Arc::new(idle_weather()),
        Arc::new(StalledPrices { stalled_year: 2022 }),
    );
    let result = engine.simulate(&request(Technology::Biomass, 10.0)).await.unwrap();
    assert_eq!(result.years_simulated, 2.0);
    match result.details {
        TechnologyDetails::Biomass { dispatch, .. } => {
            assert_eq!(dispatch.hours_dispatched, 2 * HOURS_PER_YEAR);
        }
        other => panic!("unexpected details {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_stalled_arbitrage_prices_time_out() {
    let engine = SimulationEngine::new(
        Config::default(),
        Arc::new(idle_weather()),
        Arc::new(StalledPrices { stalled_year: 2023 }),
    );
    let err = engine.arbitrage(&StorageRequest::default()).await.unwrap_err();
    assert!(matches!(err, SimulationError::Timeout { year: 2023 }));
}

#[tokio::test]
async fn test_unusable_override_falls_back_to_default() {
    let mut req = request(Technology::Solar, 50.0);
    req.params = json!({ "system_loss": "lots" });
    req.lifetime_years = Some(10);
    req.degradation_rate = Some(0.0);
    let result = engine(weather_mock(), idle_prices()).simulate(&req).await.unwrap();
    assert_eq!(result.long_term_monthly.len(), 120);
    assert_eq!(&result.long_term_monthly[..12], &result.long_term_monthly[108..]);
}

#[tokio::test]
async fn test_battery_arbitrage_against_prices() {
    let mut prices = MockPrices::new();
    prices
        .expect_annual_prices()
        .withf(|year| *year == 2021)
        .returning(|_| {
            Ok((0..HOURS_PER_YEAR)
                .map(|h| 40.0 + 30.0 * (2.0 * PI * (h % 24) as f64 / 24.0).sin())
                .collect())
        });

    let result = engine(MockWeather::new(), prices)
        .arbitrage(&StorageRequest {
            params: json!({ "energy_capacity_kwh": 200.0, "max_power_kw": 100.0 }),
            year: Some(2021),
        })
        .await
        .unwrap();

    assert_eq!(result.year, 2021);
    assert_eq!(result.arbitrage.dispatch_kw.len(), HOURS_PER_YEAR);
    assert!(result
        .arbitrage
        .state_of_charge_kwh
        .iter()
        .all(|soc| (0.0..=200.0).contains(soc)));
    assert!(result.revenue_eur > 0.0);
}
