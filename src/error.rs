use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::LossCategory;

/// Errors raised while turning weather files into a yield report.
///
/// `Schema`, `Parse` and `InvalidValue` are raised during normalisation and
/// abort the run before any array is simulated. Degenerate numerics (sun below
/// the horizon, zero irradiance, calm air) never show up here: they are
/// clamped where they occur. An incomplete weather row is not an error either,
/// it becomes a NaN sample in the affected array output.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Schema error: column `{column}` not found in weather source `{source_name}`")]
    Schema { source_name: String, column: String },

    #[error("Parse error: unparseable timestamp `{value}` at row {row}")]
    Parse { row: usize, value: String },

    #[error("Parse error: timestamp `{value}` at row {row} does not match the format of the first row")]
    MixedTimestamps { row: usize, value: String },

    #[error("Parse error: invalid value `{value}` in column `{column}` at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Weather source `{0}` contains no samples")]
    EmptySource(String),

    #[error("Solar position provider returned {actual} positions for {expected} timestamps")]
    SolarPosition { expected: usize, actual: usize },

    #[error("Sun position unavailable at {time}: {reason}")]
    SunPosition { time: DateTime<Utc>, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown device `{0}`")]
    UnknownDevice(String),

    #[error("Simulation of array `{name}` failed: {reason}")]
    ArrayFailed { name: String, reason: String },

    #[error("Run exceeded the wall-clock limit of {seconds}s")]
    Timeout { seconds: f64 },

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    /// True for the input errors that stop a run before simulation starts.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::Schema { .. }
                | Self::Parse { .. }
                | Self::MixedTimestamps { .. }
                | Self::InvalidValue { .. }
                | Self::EmptySource(_)
        )
    }
}

/// Failures reported by a device model implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("Module `{name}` has unusable parameters: {reason}")]
    InvalidModule { name: String, reason: String },

    #[error("Inverter `{name}` has unusable parameters: {reason}")]
    InvalidInverter { name: String, reason: String },

    #[error("Device model produced a non-finite {quantity}")]
    NonFinite { quantity: &'static str },
}

/// Validation failures while building configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Array name must not be empty")]
    EmptyName,

    #[error("Array `{array}`: missing {field}")]
    Missing { array: String, field: &'static str },

    #[error("Array `{array}`: {field} = {value} is outside {min}..={max}")]
    OutOfRange {
        array: String,
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Array `{array}`: {field} must be positive")]
    NotPositive { array: String, field: &'static str },

    #[error("Loss `{category}` = {value}% is outside 0..=100")]
    Loss { category: LossCategory, value: f64 },

    #[error("At least one {0} is required")]
    Empty(&'static str),

    #[error("Duplicate array name `{0}`")]
    DuplicateName(String),

    #[error("Delimiter `{0}` is not a single-byte character")]
    Delimiter(char),

    #[error("Unknown time zone `{0}`")]
    TimeZone(String),

    #[error("{0}")]
    Validation(String),
}

impl From<validator::ValidationErrors> for ConfigError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ConfigError::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_errors_are_classified() {
        let schema = PipelineError::Schema {
            source_name: "htw".to_string(),
            column: "g_hor_si".to_string(),
        };
        assert!(schema.is_input_error());

        let parse = PipelineError::Parse {
            row: 3,
            value: "yesterday".to_string(),
        };
        assert!(parse.is_input_error());

        let timeout = PipelineError::Timeout { seconds: 5.0 };
        assert!(!timeout.is_input_error());
    }

    #[test]
    fn test_error_display() {
        let error = PipelineError::Schema {
            source_name: "fred".to_string(),
            column: "ghi".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Schema error: column `ghi` not found in weather source `fred`"
        );

        let loss = ConfigError::Loss {
            category: LossCategory::Soiling,
            value: 120.0,
        };
        assert_eq!(loss.to_string(), "Loss `soiling` = 120% is outside 0..=100");
    }
}
