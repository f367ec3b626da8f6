//! Distribution of one time-series value over an equipment group.

use crate::domain::{DistributionKey, EquipmentId, TimeSeriesMapping, Variable};
use crate::error::{MappingError, Result};

use super::point::PointState;

#[derive(Debug, Clone, Copy, Default)]
pub struct Allocator {
    ignore_empty_filter: bool,
}

impl Allocator {
    /// With `ignore_empty_filter`, an empty group yields no shares instead of an error
    pub fn new(ignore_empty_filter: bool) -> Self {
        Self { ignore_empty_filter }
    }

    /// Split `value` among `group`.
    ///
    /// Additive variables are shared in proportion to the weights, or evenly
    /// when every weight is zero. Other variables are assigned in full to
    /// each equipment. An empty group fails unless the run ignores empty
    /// filters, in which case nothing is produced.
    pub fn allocate(
        &self,
        time_series: &str,
        variable: Variable,
        value: f64,
        group: &[(EquipmentId, f64)],
    ) -> Result<Vec<(EquipmentId, f64)>> {
        if group.is_empty() {
            if self.ignore_empty_filter {
                return Ok(Vec::new());
            }
            return Err(MappingError::EmptyEquipmentGroup {
                time_series: time_series.to_string(),
                variable,
            });
        }

        if !variable.is_additive() {
            return Ok(group.iter().map(|(id, _)| (id.clone(), value)).collect());
        }

        let total: f64 = group.iter().map(|(_, w)| w).sum();
        let shares = if total > 0.0 {
            group
                .iter()
                .map(|(id, w)| (id.clone(), value * w / total))
                .collect()
        } else {
            let n = group.len() as f64;
            group.iter().map(|(id, _)| (id.clone(), value / n)).collect()
        };
        Ok(shares)
    }
}

/// Weights of a mapping's group at one point.
///
/// `series` returns the value of a weight time series at the same point.
pub fn resolve_weights<F>(
    mapping: &TimeSeriesMapping,
    state: &PointState<'_>,
    series: F,
) -> Result<Vec<(EquipmentId, f64)>>
where
    F: Fn(&str) -> Result<f64>,
{
    mapping
        .group
        .iter()
        .map(|weighted| {
            let weight = match &weighted.key {
                DistributionKey::Constant(w) => *w,
                DistributionKey::Attribute(variable) => state
                    .get(&weighted.equipment, *variable)
                    .map(|t| t.value)
                    .unwrap_or(0.0),
                DistributionKey::TimeSeries(name) => series(name.as_str())?,
            };
            if !weight.is_finite() || weight < 0.0 {
                return Err(MappingError::InvalidDistributionKey {
                    time_series: mapping.time_series.clone(),
                    equipment: weighted.equipment.clone(),
                    reason: format!("resolved weight {weight} is negative or not finite"),
                });
            }
            Ok((weighted.equipment.clone(), weight))
        })
        .collect()
}
