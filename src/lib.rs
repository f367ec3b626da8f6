//! Time-series mapping engine.
//!
//! Distributes externally supplied time series onto network equipment
//! attributes, version by version and chunk by chunk, and enforces the
//! physical range of every corrected attribute. Findings are collected as
//! structured diagnostics records.

pub mod config;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod mapping;
pub mod store;
pub mod telemetry;

pub use config::MappingConfig;
pub use diagnostics::{DiagnosticsAggregator, LogRecord, ProblemCategory, Severity, VariantScope};
pub use domain::{
    EquipmentId, EquipmentKind, InMemoryNetwork, MappingKey, MappingTable, NetworkSnapshot,
    Provenance, Variable,
};
pub use error::{MappingError, Result};
pub use mapping::{ChunkBatch, MappingDriver, MappingObserver, RunSummary};
pub use store::{InMemoryTimeSeriesStore, TimeSeriesStore};
