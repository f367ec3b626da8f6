use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

// ============================================================================
// Equipment identity
// ============================================================================

/// Network equipment identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EquipmentId(String);

impl EquipmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EquipmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EquipmentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EquipmentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Kind of network equipment a variable can be mapped on
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum EquipmentKind {
    Generator,
    Battery,
    HvdcLine,
    PhaseTapChanger,
    Load,
    Switch,
}

// ============================================================================
// Mapped variables
// ============================================================================

/// Semantic attribute tag a time series can be mapped on.
///
/// External names follow the network model's attribute names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    Display, EnumString, EnumIter, IntoStaticStr,
)]
pub enum Variable {
    #[strum(serialize = "targetP")]
    #[serde(rename = "targetP")]
    TargetP,
    #[strum(serialize = "minP")]
    #[serde(rename = "minP")]
    MinP,
    #[strum(serialize = "maxP")]
    #[serde(rename = "maxP")]
    MaxP,
    #[strum(serialize = "activePowerSetpoint")]
    #[serde(rename = "activePowerSetpoint")]
    ActivePowerSetpoint,
    #[strum(serialize = "CS1toCS2")]
    #[serde(rename = "CS1toCS2")]
    Cs1ToCs2,
    #[strum(serialize = "CS2toCS1")]
    #[serde(rename = "CS2toCS1")]
    Cs2ToCs1,
    #[strum(serialize = "phaseTapPosition")]
    #[serde(rename = "phaseTapPosition")]
    PhaseTapPosition,
    #[strum(serialize = "p0")]
    #[serde(rename = "p0")]
    P0,
    #[strum(serialize = "fixedActivePower")]
    #[serde(rename = "fixedActivePower")]
    FixedActivePower,
    #[strum(serialize = "variableActivePower")]
    #[serde(rename = "variableActivePower")]
    VariableActivePower,
    #[strum(serialize = "open")]
    #[serde(rename = "open")]
    Open,
}

impl Variable {
    /// Equipment kinds carrying this attribute
    pub fn kinds(self) -> &'static [EquipmentKind] {
        use EquipmentKind::{Battery, Generator, HvdcLine, Load, PhaseTapChanger, Switch};
        match self {
            Variable::TargetP | Variable::MinP => &[Generator, Battery],
            Variable::MaxP => &[Generator, Battery, HvdcLine],
            Variable::ActivePowerSetpoint | Variable::Cs1ToCs2 | Variable::Cs2ToCs1 => &[HvdcLine],
            Variable::PhaseTapPosition => &[PhaseTapChanger],
            Variable::P0 | Variable::FixedActivePower | Variable::VariableActivePower => &[Load],
            Variable::Open => &[Switch],
        }
    }

    pub fn applies_to(self, kind: EquipmentKind) -> bool {
        self.kinds().contains(&kind)
    }

    /// Additive variables are shared among a group according to distribution
    /// weights. Every other variable is assigned in full to each equipment.
    pub fn is_additive(self) -> bool {
        matches!(
            self,
            Variable::TargetP
                | Variable::ActivePowerSetpoint
                | Variable::P0
                | Variable::FixedActivePower
                | Variable::VariableActivePower
        )
    }
}

// ============================================================================
// Provenance
// ============================================================================

/// Where a value or a bound comes from at a given point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Provenance {
    /// Static network value, identical for every point
    BaseCase,
    /// Supplied this point by a mapped time series
    Mapped,
}

impl Provenance {
    pub fn is_mapped(self) -> bool {
        matches!(self, Provenance::Mapped)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::BaseCase => write!(f, "base case"),
            Provenance::Mapped => write!(f, "mapped"),
        }
    }
}

/// A value together with its provenance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedValue {
    pub value: f64,
    pub provenance: Provenance,
}

impl TrackedValue {
    pub fn base_case(value: f64) -> Self {
        Self {
            value,
            provenance: Provenance::BaseCase,
        }
    }

    pub fn mapped(value: f64) -> Self {
        Self {
            value,
            provenance: Provenance::Mapped,
        }
    }
}

// ============================================================================
// Mapping key
// ============================================================================

/// A mapped attribute: one variable of one equipment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappingKey {
    pub equipment: EquipmentId,
    pub variable: Variable,
}

impl MappingKey {
    pub fn new(equipment: impl Into<EquipmentId>, variable: Variable) -> Self {
        Self {
            equipment: equipment.into(),
            variable,
        }
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.equipment, self.variable)
    }
}
