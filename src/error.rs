use thiserror::Error;

use crate::domain::{EquipmentId, EquipmentKind, Variable};

pub type Result<T, E = MappingError> = std::result::Result<T, E>;

/// Errors that abort a mapping run.
///
/// Bound violations are not errors: they are corrected locally and reported
/// through the diagnostics aggregator.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Empty equipment group: time series '{time_series}' mapped on {variable} matches no equipment")]
    EmptyEquipmentGroup {
        time_series: String,
        variable: Variable,
    },

    #[error("Non positive or missing index: {0}")]
    NonPositiveOrMissingIndex(String),

    #[error("Time series '{name}' not found for version {version}")]
    TimeSeriesNotFound { name: String, version: u32 },

    #[error("Version {0} not found in time-series store")]
    VersionNotFound(u32),

    #[error("Unknown equipment: {0}")]
    UnknownEquipment(EquipmentId),

    #[error("Variable {variable} does not apply to {kind} '{equipment}'")]
    IncompatibleVariable {
        equipment: EquipmentId,
        kind: EquipmentKind,
        variable: Variable,
    },

    #[error("{variable} of '{equipment}' already mapped by '{existing}', cannot map '{requested}'")]
    AlreadyMapped {
        equipment: EquipmentId,
        variable: Variable,
        existing: String,
        requested: String,
    },

    #[error("Invalid distribution key for '{equipment}' in time series '{time_series}': {reason}")]
    InvalidDistributionKey {
        time_series: String,
        equipment: EquipmentId,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Observer failed: {0}")]
    Observer(String),

    #[error("Store error: {0}")]
    Store(anyhow::Error),

    #[error("Mapping task failed: {0}")]
    Task(String),
}

impl MappingError {
    /// Name of the time series the error is attributed to, when there is one.
    pub fn time_series(&self) -> Option<&str> {
        match self {
            MappingError::EmptyEquipmentGroup { time_series, .. }
            | MappingError::InvalidDistributionKey { time_series, .. } => Some(time_series),
            MappingError::TimeSeriesNotFound { name, .. } => Some(name),
            _ => None,
        }
    }
}
