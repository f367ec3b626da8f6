//! Immutable mapping table.
//!
//! Built once per run from the loader's output. Associates every time series
//! with the equipment groups it is mapped on, and carries the run-wide
//! `ignoreLimits` set and `ignoreEmptyFilter` flag.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use super::network::NetworkSnapshot;
use super::types::{EquipmentId, MappingKey, Variable};
use crate::error::{MappingError, Result};

/// How the weight of one equipment in a group is obtained at each point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DistributionKey {
    /// Fixed non-negative weight
    Constant(f64),
    /// Current value of an attribute of the same equipment
    Attribute(Variable),
    /// Value of another time series at the same point
    TimeSeries(String),
}

impl Default for DistributionKey {
    fn default() -> Self {
        DistributionKey::Constant(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedEquipment {
    pub equipment: EquipmentId,
    pub key: DistributionKey,
}

/// One time series mapped on one variable of an equipment group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesMapping {
    pub time_series: String,
    pub variable: Variable,
    pub group: Vec<WeightedEquipment>,
}

impl TimeSeriesMapping {
    pub fn keys(&self) -> impl Iterator<Item = MappingKey> + '_ {
        self.group
            .iter()
            .map(move |w| MappingKey::new(w.equipment.clone(), self.variable))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingTable {
    mappings: Vec<TimeSeriesMapping>,
    key_index: BTreeMap<MappingKey, String>,
    equipment_index: BTreeMap<EquipmentId, BTreeSet<String>>,
    ignore_limits: BTreeSet<String>,
    ignore_empty_filter: bool,
}

impl MappingTable {
    pub fn builder(network: &dyn NetworkSnapshot) -> MappingTableBuilder<'_> {
        MappingTableBuilder {
            network,
            table: MappingTable::default(),
        }
    }

    pub fn mappings(&self) -> &[TimeSeriesMapping] {
        &self.mappings
    }

    pub fn mappings_of<'a>(&'a self, time_series: &'a str) -> impl Iterator<Item = &'a TimeSeriesMapping> + 'a {
        self.mappings.iter().filter(move |m| m.time_series == time_series)
    }

    /// Time series mapped on a key, if any
    pub fn time_series_of(&self, key: &MappingKey) -> Option<&str> {
        self.key_index.get(key).map(String::as_str)
    }

    /// Reverse index: every time series mapped on some variable of the equipment
    pub fn time_series_of_equipment(&self, equipment: &EquipmentId) -> impl Iterator<Item = &str> {
        self.equipment_index
            .get(equipment)
            .into_iter()
            .flat_map(|names| names.iter().map(String::as_str))
    }

    pub fn mapped_keys(&self) -> impl Iterator<Item = &MappingKey> {
        self.key_index.keys()
    }

    pub fn is_mapped(&self, key: &MappingKey) -> bool {
        self.key_index.contains_key(key)
    }

    /// Every time series the run must fetch: mapped series and weight series
    pub fn required_time_series(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self.mappings.iter().map(|m| m.time_series.clone()).collect();
        for mapping in &self.mappings {
            for weighted in &mapping.group {
                if let DistributionKey::TimeSeries(name) = &weighted.key {
                    names.insert(name.clone());
                }
            }
        }
        names
    }

    pub fn is_ignore_limits(&self, time_series: &str) -> bool {
        self.ignore_limits.contains(time_series)
    }

    /// Escape flag for an attribute.
    ///
    /// A mapped attribute follows its own time series. An unmapped attribute
    /// follows any time series mapped on the same equipment.
    pub fn ignores_limits(&self, key: &MappingKey) -> bool {
        match self.time_series_of(key) {
            Some(ts) => self.is_ignore_limits(ts),
            None => self
                .time_series_of_equipment(&key.equipment)
                .any(|ts| self.is_ignore_limits(ts)),
        }
    }

    pub fn ignore_empty_filter(&self) -> bool {
        self.ignore_empty_filter
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

pub struct MappingTableBuilder<'a> {
    network: &'a dyn NetworkSnapshot,
    table: MappingTable,
}

impl<'a> MappingTableBuilder<'a> {
    /// Map a time series on a variable of a weighted equipment group
    pub fn map(
        mut self,
        time_series: impl Into<String>,
        variable: Variable,
        group: Vec<(EquipmentId, DistributionKey)>,
    ) -> Result<Self> {
        let time_series = time_series.into();
        let mut weighted = Vec::with_capacity(group.len());

        for (equipment, key) in group {
            self.validate_equipment(&time_series, &equipment, variable, &key)?;
            let mapping_key = MappingKey::new(equipment.clone(), variable);
            if let Some(existing) = self.table.key_index.get(&mapping_key) {
                return Err(MappingError::AlreadyMapped {
                    equipment,
                    variable,
                    existing: existing.clone(),
                    requested: time_series,
                });
            }
            self.table.key_index.insert(mapping_key, time_series.clone());
            self.table
                .equipment_index
                .entry(equipment.clone())
                .or_default()
                .insert(time_series.clone());
            weighted.push(WeightedEquipment { equipment, key });
        }

        debug!(time_series = %time_series, %variable, equipment = weighted.len(), "time series mapped");
        self.table.mappings.push(TimeSeriesMapping {
            time_series,
            variable,
            group: weighted,
        });
        Ok(self)
    }

    /// Map with unit weights
    pub fn map_equally<I, E>(self, time_series: impl Into<String>, variable: Variable, equipment: I) -> Result<Self>
    where
        I: IntoIterator<Item = E>,
        E: Into<EquipmentId>,
    {
        let group = equipment
            .into_iter()
            .map(|id| (id.into(), DistributionKey::default()))
            .collect();
        self.map(time_series, variable, group)
    }

    pub fn ignore_limits(mut self, time_series: impl Into<String>) -> Self {
        self.table.ignore_limits.insert(time_series.into());
        self
    }

    pub fn ignore_empty_filter(mut self, ignore: bool) -> Self {
        self.table.ignore_empty_filter = ignore;
        self
    }

    pub fn build(self) -> MappingTable {
        self.table
    }

    fn validate_equipment(
        &self,
        time_series: &str,
        equipment: &EquipmentId,
        variable: Variable,
        key: &DistributionKey,
    ) -> Result<()> {
        let kind = self
            .network
            .kind(equipment)
            .ok_or_else(|| MappingError::UnknownEquipment(equipment.clone()))?;
        if !variable.applies_to(kind) {
            return Err(MappingError::IncompatibleVariable {
                equipment: equipment.clone(),
                kind,
                variable,
            });
        }
        let invalid = |reason: String| MappingError::InvalidDistributionKey {
            time_series: time_series.to_string(),
            equipment: equipment.clone(),
            reason,
        };
        match key {
            DistributionKey::Constant(w) if !w.is_finite() || *w < 0.0 => {
                Err(invalid(format!("weight {w} is negative or not finite")))
            }
            DistributionKey::Attribute(attr) if !attr.applies_to(kind) => {
                Err(invalid(format!("{attr} is not an attribute of {kind}")))
            }
            DistributionKey::TimeSeries(name) if name.is_empty() => {
                Err(invalid("empty weight time series name".to_string()))
            }
            _ => Ok(()),
        }
    }
}
