use thiserror::Error;

use crate::technology::Technology;

/// Errors surfaced by the simulation core.
///
/// Degenerate weather or price data never produces an error: models absorb it
/// into zero or floored output. Errors are reserved for non-physical
/// configuration and for collaborator failures the core cannot paper over.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("{technology}: invalid configuration: {message}")]
    InvalidConfig {
        technology: Technology,
        message: String,
    },

    #[error("{technology}: insufficient data: {message}")]
    InsufficientData {
        technology: Technology,
        message: String,
    },

    #[error("market: invalid configuration: {0}")]
    InvalidMarket(String),

    #[error("weather unavailable for {year}: {message}")]
    WeatherUnavailable { year: i32, message: String },

    #[error("weather fetch for {year} timed out")]
    Timeout { year: i32 },

    #[error("worker task failed: {0}")]
    Task(String),
}

impl SimulationError {
    pub fn invalid(technology: Technology, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            technology,
            message: message.into(),
        }
    }

    /// Technology tag for errors raised by a specific model
    pub fn technology(&self) -> Option<Technology> {
        match self {
            Self::InvalidConfig { technology, .. } | Self::InsufficientData { technology, .. } => {
                Some(*technology)
            }
            _ => None,
        }
    }

    /// Convert `validator` failures into a single descriptive configuration error
    pub(crate) fn from_validation(
        technology: Technology,
        errors: validator::ValidationErrors,
    ) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let codes: Vec<String> = errs.iter().map(|e| e.code.to_string()).collect();
                format!("{} ({})", field, codes.join(", "))
            })
            .collect();
        fields.sort();
        if fields.is_empty() {
            return Self::invalid(technology, errors.to_string());
        }
        Self::invalid(technology, format!("out of range: {}", fields.join("; ")))
    }
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_carries_technology_tag() {
        let err = SimulationError::invalid(Technology::Wind, "roughness length must be positive");
        assert_eq!(err.technology(), Some(Technology::Wind));
        assert_eq!(
            err.to_string(),
            "wind: invalid configuration: roughness length must be positive"
        );
    }

    #[test]
    fn test_collaborator_errors_have_no_tag() {
        let err = SimulationError::Timeout { year: 2022 };
        assert!(err.technology().is_none());
        assert_eq!(err.to_string(), "weather fetch for 2022 timed out");
    }
}
