//! Per-kind bound resolution.
//!
//! Each equipment kind with a physical range implements [`BoundResolver`].
//! The checker only ever sees the resulting [`BoundPair`], so the correction
//! policy is written once for every kind.

use serde::Serialize;

use super::point::PointState;
use crate::domain::{EquipmentId, EquipmentKind, MappingKey, Provenance, TrackedValue, Variable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Low,
    High,
}

/// One side of a range and the quantity that defines it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bound {
    pub value: f64,
    pub provenance: Provenance,
    pub name: &'static str,
}

impl Bound {
    fn from_tracked(tracked: TrackedValue, name: &'static str) -> Self {
        Self {
            value: tracked.value,
            provenance: tracked.provenance,
            name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundPair {
    pub low: Bound,
    pub high: Bound,
}

impl BoundPair {
    pub fn side(&self, side: Side) -> &Bound {
        match side {
            Side::Low => &self.low,
            Side::High => &self.high,
        }
    }

    /// Side violated by `value`, if any
    pub fn violated_side(&self, value: f64) -> Option<Side> {
        if value < self.low.value {
            Some(Side::Low)
        } else if value > self.high.value {
            Some(Side::High)
        } else {
            None
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.violated_side(value).is_none()
    }
}

/// Range of the checked attribute of one equipment kind.
///
/// Resolution reads the point state only, so calling it several times for
/// the same equipment and point always returns the same pair.
pub trait BoundResolver: Send + Sync {
    /// Attribute the range applies to
    fn value_variable(&self) -> Variable;

    fn resolve(&self, state: &PointState<'_>, equipment: &EquipmentId) -> Option<BoundPair>;

    /// Move the base case quantities of `side` so the range admits `value`.
    /// Returns false when the range cannot be changed.
    fn widen(&self, state: &mut PointState<'_>, equipment: &EquipmentId, side: Side, value: f64) -> bool;

    fn can_widen(&self) -> bool {
        true
    }

    /// A value on the wrong side of zero is reset to zero instead of clamped
    fn sign_sensitive(&self) -> bool {
        true
    }
}

/// Generator and battery active power: `[minP, maxP]`
pub struct PowerRangeResolver;

impl BoundResolver for PowerRangeResolver {
    fn value_variable(&self) -> Variable {
        Variable::TargetP
    }

    fn resolve(&self, state: &PointState<'_>, equipment: &EquipmentId) -> Option<BoundPair> {
        let min_p = state.get(equipment, Variable::MinP)?;
        let max_p = state.get(equipment, Variable::MaxP)?;
        Some(BoundPair {
            low: Bound::from_tracked(min_p, "minP"),
            high: Bound::from_tracked(max_p, "maxP"),
        })
    }

    fn widen(&self, state: &mut PointState<'_>, equipment: &EquipmentId, side: Side, value: f64) -> bool {
        let variable = match side {
            Side::Low => Variable::MinP,
            Side::High => Variable::MaxP,
        };
        state.correct(MappingKey::new(equipment.clone(), variable), value);
        true
    }
}

/// HVDC active power setpoint: symmetric `[-maxP, maxP]`, each side
/// narrowed by the operator range declared for its direction.
pub struct HvdcRangeResolver;

impl HvdcRangeResolver {
    /// Quantities limiting `side`, as (variable, tracked magnitude, bound name)
    fn limits(
        state: &PointState<'_>,
        equipment: &EquipmentId,
        side: Side,
    ) -> Vec<(Variable, TrackedValue, &'static str)> {
        let (operator, max_name, operator_name) = match side {
            Side::High => (Variable::Cs1ToCs2, "maxP", "CS1toCS2"),
            Side::Low => (Variable::Cs2ToCs1, "-maxP", "-CS2toCS1"),
        };
        let mut limits = Vec::with_capacity(2);
        if let Some(max_p) = state.get(equipment, Variable::MaxP) {
            limits.push((Variable::MaxP, max_p, max_name));
        }
        if let Some(range) = state.get(equipment, operator) {
            limits.push((operator, range, operator_name));
        }
        limits
    }

    fn tightest(limits: &[(Variable, TrackedValue, &'static str)], side: Side) -> Option<Bound> {
        let sign = match side {
            Side::High => 1.0,
            Side::Low => -1.0,
        };
        limits
            .iter()
            .map(|&(_, tracked, name)| Bound {
                value: sign * tracked.value,
                provenance: tracked.provenance,
                name,
            })
            .reduce(|best, candidate| {
                let tighter = match side {
                    Side::High => candidate.value < best.value,
                    Side::Low => candidate.value > best.value,
                };
                let tie_mapped = candidate.value == best.value
                    && candidate.provenance.is_mapped()
                    && !best.provenance.is_mapped();
                if tighter || tie_mapped {
                    candidate
                } else {
                    best
                }
            })
    }
}

impl BoundResolver for HvdcRangeResolver {
    fn value_variable(&self) -> Variable {
        Variable::ActivePowerSetpoint
    }

    fn resolve(&self, state: &PointState<'_>, equipment: &EquipmentId) -> Option<BoundPair> {
        let low = Self::tightest(&Self::limits(state, equipment, Side::Low), Side::Low)?;
        let high = Self::tightest(&Self::limits(state, equipment, Side::High), Side::High)?;
        Some(BoundPair { low, high })
    }

    fn widen(&self, state: &mut PointState<'_>, equipment: &EquipmentId, side: Side, value: f64) -> bool {
        let magnitude = value.abs();
        let mut widened = false;
        for (variable, tracked, _) in Self::limits(state, equipment, side) {
            if tracked.provenance == Provenance::BaseCase && tracked.value < magnitude {
                state.correct(MappingKey::new(equipment.clone(), variable), magnitude);
                widened = true;
            }
        }
        widened
    }
}

/// Phase tap changer position: `[lowTapPosition, highTapPosition]`.
/// Tap geometry is fixed, the range is never widened.
pub struct TapRangeResolver;

impl BoundResolver for TapRangeResolver {
    fn value_variable(&self) -> Variable {
        Variable::PhaseTapPosition
    }

    fn resolve(&self, state: &PointState<'_>, equipment: &EquipmentId) -> Option<BoundPair> {
        let (low, high) = state.network().tap_range(equipment)?;
        Some(BoundPair {
            low: Bound {
                value: low,
                provenance: Provenance::BaseCase,
                name: "lowTapPosition",
            },
            high: Bound {
                value: high,
                provenance: Provenance::BaseCase,
                name: "highTapPosition",
            },
        })
    }

    fn widen(&self, _state: &mut PointState<'_>, _equipment: &EquipmentId, _side: Side, _value: f64) -> bool {
        false
    }

    fn can_widen(&self) -> bool {
        false
    }

    fn sign_sensitive(&self) -> bool {
        false
    }
}

static POWER_RANGE: PowerRangeResolver = PowerRangeResolver;
static HVDC_RANGE: HvdcRangeResolver = HvdcRangeResolver;
static TAP_RANGE: TapRangeResolver = TapRangeResolver;

/// Resolver of an equipment kind, `None` for kinds without a range
pub fn resolver_for(kind: EquipmentKind) -> Option<&'static dyn BoundResolver> {
    match kind {
        EquipmentKind::Generator | EquipmentKind::Battery => Some(&POWER_RANGE),
        EquipmentKind::HvdcLine => Some(&HVDC_RANGE),
        EquipmentKind::PhaseTapChanger => Some(&TAP_RANGE),
        EquipmentKind::Load | EquipmentKind::Switch => None,
    }
}
