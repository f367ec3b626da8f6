//! Diagnostics aggregation.
//!
//! Point-invariant findings collapse into a single `ALL` record per
//! (category, label, equipment). Version-specific findings produce one
//! synthesis record per (category, label, version), plus one record per
//! point when point details are kept. Appends are safe from concurrent
//! version workers; records carry explicit scope and point tags so their
//! arrival order does not matter.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

use super::record::{Finding, LogRecord, ProblemCategory, Severity, VariantScope};
use crate::domain::EquipmentId;

#[derive(Default)]
struct Inner {
    records: Vec<LogRecord>,
    invariant_seen: HashSet<(ProblemCategory, String, EquipmentId)>,
    synthesis_seen: HashSet<(ProblemCategory, String, u32)>,
}

pub struct DiagnosticsAggregator {
    inner: Mutex<Inner>,
    log_point_details: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiagnosticsSummary {
    pub warnings: usize,
    pub infos: usize,
    pub synthesis_records: usize,
    pub by_category: BTreeMap<ProblemCategory, usize>,
}

impl Default for DiagnosticsAggregator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DiagnosticsAggregator {
    /// Without `log_point_details`, per-point findings only feed the synthesis records
    pub fn new(log_point_details: bool) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            log_point_details,
        }
    }

    /// Record a checker finding observed for `version` at `point`
    pub fn report(&self, version: u32, point: usize, finding: Finding) {
        let mut inner = self.inner.lock();

        if finding.point_invariant {
            let key = (finding.category, finding.label.clone(), finding.equipment.clone());
            if !inner.invariant_seen.insert(key) {
                return;
            }
            trace_first(&finding, VariantScope::All);
            inner.records.push(LogRecord {
                severity: finding.severity,
                category: finding.category,
                label: finding.label,
                section: finding.section,
                scope: VariantScope::All,
                point: None,
                equipment: Some(finding.equipment),
                message: finding.message,
                synthesis: None,
            });
            return;
        }

        if let Some(synthesis) = &finding.synthesis {
            let key = (synthesis.category, synthesis.label.clone(), version);
            if inner.synthesis_seen.insert(key) {
                trace_first(&finding, VariantScope::Version(version));
                inner.records.push(LogRecord {
                    severity: finding.severity,
                    category: synthesis.category,
                    label: synthesis.label.clone(),
                    section: finding.section,
                    scope: VariantScope::Version(version),
                    point: Some(point),
                    equipment: Some(finding.equipment.clone()),
                    message: finding.message.clone(),
                    synthesis: Some(synthesis.message.clone()),
                });
            }
        }

        debug!(
            version,
            point,
            equipment = %finding.equipment,
            category = %finding.category,
            label = %finding.label,
            "{}",
            finding.message
        );
        if self.log_point_details {
            inner.records.push(LogRecord {
                severity: finding.severity,
                category: finding.category,
                label: finding.label,
                section: finding.section,
                scope: VariantScope::Version(version),
                point: Some(point),
                equipment: Some(finding.equipment),
                message: finding.message,
                synthesis: None,
            });
        }
    }

    /// Snapshot of all records in a deterministic order
    pub fn records(&self) -> Vec<LogRecord> {
        let mut records = self.inner.lock().records.clone();
        sort_records(&mut records);
        records
    }

    /// Remove and return all records, keeping deduplication state
    pub fn take_records(&self) -> Vec<LogRecord> {
        let mut records = std::mem::take(&mut self.inner.lock().records);
        sort_records(&mut records);
        records
    }

    pub fn len(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> DiagnosticsSummary {
        let inner = self.inner.lock();
        let mut summary = DiagnosticsSummary::default();
        for record in &inner.records {
            match record.severity {
                Severity::Warning => summary.warnings += 1,
                Severity::Info => summary.infos += 1,
            }
            if record.is_synthesis() {
                summary.synthesis_records += 1;
            }
            *summary.by_category.entry(record.category).or_default() += 1;
        }
        summary
    }
}

fn sort_records(records: &mut [LogRecord]) {
    records.sort_by(|a, b| {
        (a.scope, a.point, a.is_synthesis(), a.category, &a.label, &a.equipment).cmp(&(
            b.scope,
            b.point,
            b.is_synthesis(),
            b.category,
            &b.label,
            &b.equipment,
        ))
    });
}

fn trace_first(finding: &Finding, scope: VariantScope) {
    match finding.severity {
        Severity::Warning => warn!(
            scope = %scope,
            equipment = %finding.equipment,
            category = %finding.category,
            label = %finding.label,
            "{}",
            finding.message
        ),
        Severity::Info => info!(
            scope = %scope,
            equipment = %finding.equipment,
            category = %finding.category,
            label = %finding.label,
            "{}",
            finding.message
        ),
    }
}
