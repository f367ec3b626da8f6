//! Streaming delivery of computed values.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Range;

use crate::domain::{EquipmentKind, MappingKey, Variable};

pub const TAG_SOURCE: &str = "source";
pub const TAG_KIND: &str = "kind";
pub const TAG_VARIABLE: &str = "variable";
pub const TAG_TIME_SERIES: &str = "timeSeries";

/// Values of one time series or equipment attribute over one chunk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkBatch {
    /// Time-series name, or `equipment.variable` for an attribute
    pub name: String,
    pub version: u32,
    pub points: Range<usize>,
    pub values: Vec<f64>,
    pub tags: BTreeMap<String, String>,
    /// Position of the chunk within its version
    pub index: usize,
}

impl ChunkBatch {
    pub(crate) fn time_series(name: &str, version: u32, points: Range<usize>, values: Vec<f64>, index: usize) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(TAG_SOURCE.to_string(), "timeSeries".to_string());
        Self {
            name: name.to_string(),
            version,
            points,
            values,
            tags,
            index,
        }
    }

    pub(crate) fn equipment(
        key: &MappingKey,
        kind: EquipmentKind,
        time_series: Option<&str>,
        version: u32,
        points: Range<usize>,
        values: Vec<f64>,
        index: usize,
    ) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert(TAG_SOURCE.to_string(), "equipment".to_string());
        tags.insert(TAG_KIND.to_string(), kind.to_string());
        tags.insert(TAG_VARIABLE.to_string(), key.variable.to_string());
        if let Some(ts) = time_series {
            tags.insert(TAG_TIME_SERIES.to_string(), ts.to_string());
        }
        Self {
            name: key.to_string(),
            version,
            points,
            values,
            tags,
            index,
        }
    }

    /// Batch of an equipment attribute rather than a raw time series
    pub fn is_equipment(&self) -> bool {
        self.tags.get(TAG_SOURCE).is_some_and(|s| s == "equipment")
    }

    pub fn variable(&self) -> Option<Variable> {
        self.tags.get(TAG_VARIABLE).and_then(|v| v.parse().ok())
    }
}

/// Sink of mapped values (result writers, balance accumulators, ...).
///
/// Called from the version tasks, so implementations must tolerate
/// interleaved calls for different versions. Within a version, chunks
/// arrive in index order.
///
/// Batches are delivered once the chunk is fully corrected. Delivery across
/// observers is not transactional: when one observer fails, observers
/// registered before it may already hold part of the chunk. An observer
/// needing all-or-nothing output stages batches until `on_version_end`.
#[cfg_attr(test, mockall::automock)]
pub trait MappingObserver: Send + Sync {
    fn on_run_start(&self, _versions: &[u32]) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_version_start(&self, _version: u32) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_chunk(&self, batch: &ChunkBatch) -> anyhow::Result<()>;

    /// End of a version: no more chunks will follow for it
    fn on_version_end(&self, _version: u32) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_run_end(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Keeps every batch in memory
#[derive(Debug, Default)]
pub struct CollectingObserver {
    batches: Mutex<Vec<ChunkBatch>>,
    finished_versions: Mutex<Vec<u32>>,
}

impl CollectingObserver {
    /// Empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch received so far, in arrival order
    pub fn batches(&self) -> Vec<ChunkBatch> {
        self.batches.lock().clone()
    }

    /// Versions whose end was signalled, ascending
    pub fn finished_versions(&self) -> Vec<u32> {
        let mut versions = self.finished_versions.lock().clone();
        versions.sort_unstable();
        versions
    }

    /// Concatenated values of one named batch stream for one version
    pub fn series(&self, name: &str, version: u32) -> Vec<f64> {
        let mut batches: Vec<ChunkBatch> = self
            .batches
            .lock()
            .iter()
            .filter(|b| b.name == name && b.version == version)
            .cloned()
            .collect();
        batches.sort_by_key(|b| b.index);
        batches.into_iter().flat_map(|b| b.values).collect()
    }
}

impl MappingObserver for CollectingObserver {
    fn on_chunk(&self, batch: &ChunkBatch) -> anyhow::Result<()> {
        self.batches.lock().push(batch.clone());
        Ok(())
    }

    fn on_version_end(&self, version: u32) -> anyhow::Result<()> {
        self.finished_versions.lock().push(version);
        Ok(())
    }
}
