//! Run orchestration: versions, chunks, points.

use futures::future::try_join_all;
use itertools::Itertools;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::Arc;
use strum::{Display, IntoEnumIterator};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::config::MappingConfig;
use crate::diagnostics::{DiagnosticsAggregator, Finding};
use crate::domain::{EquipmentId, EquipmentKind, MappingKey, MappingTable, NetworkSnapshot};
use crate::error::{MappingError, Result};
use crate::store::{into_mapping_error, TimeSeriesStore};

use super::allocator::{resolve_weights, Allocator};
use super::bounds::resolver_for;
use super::checker::Checker;
use super::observer::{ChunkBatch, MappingObserver};
use super::point::PointState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RunPhase {
    Init,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub versions: usize,
    pub chunks: usize,
    /// Points mapped, summed over versions
    pub points: usize,
}

/// Equipment whose range is enforced at every point
struct CheckedEquipment {
    id: EquipmentId,
    kind: EquipmentKind,
    ignore_limits: bool,
}

/// Result of mapping one chunk, held back until the whole chunk succeeded
struct ChunkOutput {
    batches: Vec<ChunkBatch>,
    findings: Vec<(usize, Finding)>,
}

pub struct MappingDriver {
    config: MappingConfig,
    table: Arc<MappingTable>,
    network: Arc<dyn NetworkSnapshot>,
    store: Arc<dyn TimeSeriesStore>,
    observers: Vec<Arc<dyn MappingObserver>>,
    diagnostics: Arc<DiagnosticsAggregator>,
    checker: Checker,
    allocator: Allocator,
    /// Assigned mappings first, so attribute weights see assigned values
    mapping_order: Vec<usize>,
    checked: Vec<CheckedEquipment>,
    phase: Mutex<RunPhase>,
}

impl MappingDriver {
    /// Prepare a run; fails when the configuration is invalid
    pub fn new(
        config: MappingConfig,
        table: Arc<MappingTable>,
        network: Arc<dyn NetworkSnapshot>,
        store: Arc<dyn TimeSeriesStore>,
    ) -> Result<Self> {
        config.validate()?;

        let mapping_order = table
            .mappings()
            .iter()
            .enumerate()
            .sorted_by_key(|(_, m)| m.variable.is_additive())
            .map(|(i, _)| i)
            .collect();

        let checked = EquipmentKind::iter()
            .filter_map(|kind| resolver_for(kind).map(|resolver| (kind, resolver)))
            .flat_map(|(kind, resolver)| {
                network
                    .equipment_of_kind(kind)
                    .into_iter()
                    .map(move |id| (id, kind, resolver))
            })
            .map(|(id, kind, resolver)| {
                let key = MappingKey::new(id.clone(), resolver.value_variable());
                CheckedEquipment {
                    ignore_limits: table.ignores_limits(&key),
                    id,
                    kind,
                }
            })
            .collect();

        Ok(Self {
            checker: Checker::new(config.tolerance_margin),
            allocator: Allocator::new(table.ignore_empty_filter()),
            diagnostics: Arc::new(DiagnosticsAggregator::new(config.log_point_details)),
            config,
            table,
            network,
            store,
            observers: Vec::new(),
            mapping_order,
            checked,
            phase: Mutex::new(RunPhase::Init),
        })
    }

    /// Register a sink notified in registration order
    pub fn with_observer(mut self, observer: Arc<dyn MappingObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Shared collector of the run's findings
    pub fn diagnostics(&self) -> Arc<DiagnosticsAggregator> {
        Arc::clone(&self.diagnostics)
    }

    /// Current lifecycle state
    pub fn phase(&self) -> RunPhase {
        *self.phase.lock()
    }

    /// Map every configured version. Fails on the first fatal error of any
    /// version; range violations never fail the run.
    pub async fn run(self: Arc<Self>) -> Result<RunSummary> {
        {
            let mut phase = self.phase.lock();
            if *phase != RunPhase::Init {
                return Err(MappingError::Task(format!("driver cannot run from phase {}", *phase)));
            }
            *phase = RunPhase::Running;
        }

        match Arc::clone(&self).run_versions().await {
            Ok(summary) => {
                *self.phase.lock() = RunPhase::Done;
                info!(
                    versions = summary.versions,
                    chunks = summary.chunks,
                    points = summary.points,
                    records = self.diagnostics.len(),
                    "Mapping run completed"
                );
                Ok(summary)
            }
            Err(e) => {
                *self.phase.lock() = RunPhase::Failed;
                error!(error = %e, time_series = ?e.time_series(), "Mapping run failed");
                Err(e)
            }
        }
    }

    async fn run_versions(self: Arc<Self>) -> Result<RunSummary> {
        let versions: Vec<u32> = match &self.config.versions {
            Some(versions) => versions.iter().copied().unique().collect(),
            None => self
                .store
                .versions()
                .await
                .map_err(into_mapping_error)?
                .into_iter()
                .unique()
                .collect(),
        };
        let point_count = self.store.point_count().await.map_err(into_mapping_error)?;
        if point_count == 0 {
            return Err(MappingError::NonPositiveOrMissingIndex(
                "time index has no points".to_string(),
            ));
        }

        info!(
            versions = ?versions,
            point_count,
            chunk_size = self.config.chunk_size,
            mappings = self.table.mappings().len(),
            "Starting mapping run"
        );
        self.notify(|o| o.on_run_start(&versions))?;

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_versions));
        let mut tasks = JoinSet::new();
        for version in versions.iter().copied() {
            let driver = Arc::clone(&self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| MappingError::Task(e.to_string()))?;
                driver.run_version(version, point_count).await
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| MappingError::Task(e.to_string()))
                .and_then(|result| result);
            match outcome {
                Ok(chunks) => {
                    summary.versions += 1;
                    summary.chunks += chunks;
                    summary.points += point_count;
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        self.notify(|o| o.on_run_end())?;
        Ok(summary)
    }

    async fn run_version(&self, version: u32, point_count: usize) -> Result<usize> {
        info!(version, "Mapping version");
        self.notify(|o| o.on_version_start(version))?;

        let required: Vec<String> = self.table.required_time_series().into_iter().collect();
        let mut chunks = 0;
        for (index, start) in (0..point_count).step_by(self.config.chunk_size).enumerate() {
            let points = start..(start + self.config.chunk_size).min(point_count);
            let series = self.fetch_chunk(&required, version, points.clone()).await?;
            let output = self.map_chunk(version, points.clone(), index, &series)?;

            debug!(
                version,
                chunk = index,
                start = points.start,
                end = points.end,
                batches = output.batches.len(),
                findings = output.findings.len(),
                "Chunk mapped"
            );
            for batch in &output.batches {
                self.notify(|o| o.on_chunk(batch))?;
            }
            // Only a fully delivered chunk contributes diagnostics.
            for (point, finding) in output.findings {
                self.diagnostics.report(version, point, finding);
            }
            chunks += 1;
        }

        self.notify(|o| o.on_version_end(version))?;
        info!(version, chunks, "Version mapped");
        Ok(chunks)
    }

    async fn fetch_chunk(
        &self,
        names: &[String],
        version: u32,
        points: Range<usize>,
    ) -> Result<BTreeMap<String, Vec<f64>>> {
        let fetches = names.iter().map(|name| {
            let points = points.clone();
            async move {
                let values = self
                    .store
                    .fetch(name, version, points.clone())
                    .await
                    .map_err(into_mapping_error)?;
                if values.len() != points.len() {
                    return Err(MappingError::NonPositiveOrMissingIndex(format!(
                        "time series '{name}' version {version} returned {} values for points {}..{}",
                        values.len(),
                        points.start,
                        points.end
                    )));
                }
                Ok((name.clone(), values))
            }
        });
        Ok(try_join_all(fetches).await?.into_iter().collect())
    }

    /// Allocate, correct and collect one chunk. Pure with respect to the
    /// driver: nothing is reported or emitted until the chunk succeeds.
    fn map_chunk(
        &self,
        version: u32,
        points: Range<usize>,
        index: usize,
        series: &BTreeMap<String, Vec<f64>>,
    ) -> Result<ChunkOutput> {
        let mut states = Vec::with_capacity(points.len());
        let mut findings = Vec::new();

        for (offset, point) in points.clone().enumerate() {
            let series_at = |name: &str| -> Result<f64> {
                series
                    .get(name)
                    .and_then(|values| values.get(offset))
                    .copied()
                    .ok_or_else(|| MappingError::TimeSeriesNotFound {
                        name: name.to_string(),
                        version,
                    })
            };

            let mut state = PointState::new(self.network.as_ref());
            for &i in &self.mapping_order {
                let mapping = &self.table.mappings()[i];
                let value = series_at(&mapping.time_series)?;
                let weights = resolve_weights(mapping, &state, &series_at)?;
                let shares = self
                    .allocator
                    .allocate(&mapping.time_series, mapping.variable, value, &weights)?;
                for (equipment, share) in shares {
                    state.set_mapped(MappingKey::new(equipment, mapping.variable), share);
                }
            }
            state.derive_load_p0();

            for equipment in &self.checked {
                let corrections = self.checker.enforce(
                    &mut state,
                    &equipment.id,
                    equipment.kind,
                    equipment.ignore_limits,
                );
                findings.extend(corrections.into_iter().map(|f| (point, f)));
            }
            states.push(state);
        }

        let mut batches: Vec<ChunkBatch> = self
            .table
            .mappings()
            .iter()
            .map(|m| m.time_series.as_str())
            .unique()
            .filter_map(|name| {
                let values = series.get(name)?;
                Some(ChunkBatch::time_series(name, version, points.clone(), values.clone(), index))
            })
            .collect();

        let touched: BTreeSet<&MappingKey> = states.iter().flat_map(|s| s.touched_keys()).collect();
        for key in touched {
            let Some(kind) = self.network.kind(&key.equipment) else {
                continue;
            };
            let values = states
                .iter()
                .map(|s| s.get(&key.equipment, key.variable).map_or(f64::NAN, |t| t.value))
                .collect();
            batches.push(ChunkBatch::equipment(
                key,
                kind,
                self.table.time_series_of(key),
                version,
                points.clone(),
                values,
                index,
            ));
        }

        Ok(ChunkOutput { batches, findings })
    }

    fn notify<F>(&self, call: F) -> Result<()>
    where
        F: Fn(&dyn MappingObserver) -> anyhow::Result<()>,
    {
        for observer in &self.observers {
            call(observer.as_ref()).map_err(|e| MappingError::Observer(e.to_string()))?;
        }
        Ok(())
    }
}
