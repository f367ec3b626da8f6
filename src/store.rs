use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::error::MappingError;

/// Source of raw time-series values, queried by name, version and point range.
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Versions available in the store, in ascending order
    async fn versions(&self) -> Result<Vec<u32>>;

    /// Number of points of the shared time index
    async fn point_count(&self) -> Result<usize>;

    /// Values of one series for one version over a contiguous point range
    async fn fetch(&self, name: &str, version: u32, points: Range<usize>) -> Result<Vec<f64>>;
}

/// Recover the typed error a store raised, wrapping anything else.
pub(crate) fn into_mapping_error(err: anyhow::Error) -> MappingError {
    match err.downcast::<MappingError>() {
        Ok(mapping) => mapping,
        Err(other) => MappingError::Store(other),
    }
}

/// Store held in memory; shared series apply to every version.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTimeSeriesStore {
    point_count: usize,
    versions: BTreeSet<u32>,
    series: BTreeMap<(String, u32), Vec<f64>>,
    shared: BTreeMap<String, Vec<f64>>,
}

impl InMemoryTimeSeriesStore {
    /// Store with `point_count` points per series and no versions
    pub fn new(point_count: usize) -> Self {
        Self {
            point_count,
            ..Default::default()
        }
    }

    /// Versions reported by `versions()`
    pub fn with_versions(mut self, versions: impl IntoIterator<Item = u32>) -> Self {
        self.versions.extend(versions);
        self
    }

    /// Values of a series for one version
    pub fn with_series(mut self, name: impl Into<String>, version: u32, values: Vec<f64>) -> Self {
        self.versions.insert(version);
        self.series.insert((name.into(), version), values);
        self
    }

    /// Values of a series used by every version without its own values
    pub fn with_shared_series(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.shared.insert(name.into(), values);
        self
    }

    fn lookup(&self, name: &str, version: u32) -> Option<&Vec<f64>> {
        self.series
            .get(&(name.to_string(), version))
            .or_else(|| self.shared.get(name))
    }
}

#[async_trait]
impl TimeSeriesStore for InMemoryTimeSeriesStore {
    async fn versions(&self) -> Result<Vec<u32>> {
        Ok(self.versions.iter().copied().collect())
    }

    async fn point_count(&self) -> Result<usize> {
        if self.point_count == 0 {
            return Err(MappingError::NonPositiveOrMissingIndex(
                "time index has no point".to_string(),
            )
            .into());
        }
        Ok(self.point_count)
    }

    async fn fetch(&self, name: &str, version: u32, points: Range<usize>) -> Result<Vec<f64>> {
        if !self.versions.contains(&version) {
            return Err(MappingError::VersionNotFound(version).into());
        }
        let values = self
            .lookup(name, version)
            .ok_or_else(|| MappingError::TimeSeriesNotFound {
                name: name.to_string(),
                version,
            })?;
        values.get(points.clone()).map(<[f64]>::to_vec).ok_or_else(|| {
            MappingError::NonPositiveOrMissingIndex(format!(
                "points {}..{} out of range for '{}' ({} values)",
                points.start,
                points.end,
                name,
                values.len()
            ))
            .into()
        })
    }
}
