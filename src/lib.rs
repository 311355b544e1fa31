//! Hourly generation estimates for renewable plants.
//!
//! Weather (or market prices) go in, hourly power comes out: solar, wind,
//! run-of-river hydro and biomass dispatch, plus battery price arbitrage.
//! Several weather years are reduced to a representative year which is then
//! projected over the plant lifetime with degradation.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;
pub mod market;
pub mod series;
pub mod technology;
pub mod telemetry;
pub mod weather;

pub use engine::{GenerationResult, SimulationEngine, SimulationRequest, StorageRequest, StorageResult};
pub use error::{Result, SimulationError};
