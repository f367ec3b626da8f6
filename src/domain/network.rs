use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::types::{EquipmentId, EquipmentKind, Variable};

/// Read-only view of the static network the time series are mapped on.
///
/// Values returned here are the base case: they are identical for every point
/// of every version. Mapped values never flow back into the snapshot.
pub trait NetworkSnapshot: Send + Sync {
    fn kind(&self, id: &EquipmentId) -> Option<EquipmentKind>;

    /// Static value of an attribute, `None` when the equipment does not carry it
    fn value(&self, id: &EquipmentId, variable: Variable) -> Option<f64>;

    /// Lowest and highest tap position of a phase tap changer
    fn tap_range(&self, id: &EquipmentId) -> Option<(f64, f64)>;

    fn equipment_of_kind(&self, kind: EquipmentKind) -> Vec<EquipmentId>;
}

/// Generator or battery active power data (MW)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerUnit {
    pub min_p: f64,
    pub max_p: f64,
    pub target_p: f64,
}

/// HVDC line data (MW).
///
/// The operator active power range, when present, replaces the symmetric
/// `[-max_p, max_p]` range on the side it is declared for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HvdcLine {
    pub max_p: f64,
    pub active_power_setpoint: f64,
    pub cs1_to_cs2: Option<f64>,
    pub cs2_to_cs1: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseTapChanger {
    pub low_tap_position: i32,
    pub high_tap_position: i32,
    pub tap_position: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub p0: f64,
    pub fixed_active_power: Option<f64>,
    pub variable_active_power: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Equipment {
    Generator(PowerUnit),
    Battery(PowerUnit),
    HvdcLine(HvdcLine),
    PhaseTapChanger(PhaseTapChanger),
    Load(Load),
    Switch(Switch),
}

impl Equipment {
    pub fn kind(&self) -> EquipmentKind {
        match self {
            Equipment::Generator(_) => EquipmentKind::Generator,
            Equipment::Battery(_) => EquipmentKind::Battery,
            Equipment::HvdcLine(_) => EquipmentKind::HvdcLine,
            Equipment::PhaseTapChanger(_) => EquipmentKind::PhaseTapChanger,
            Equipment::Load(_) => EquipmentKind::Load,
            Equipment::Switch(_) => EquipmentKind::Switch,
        }
    }

    fn value(&self, variable: Variable) -> Option<f64> {
        match (self, variable) {
            (Equipment::Generator(u) | Equipment::Battery(u), Variable::TargetP) => Some(u.target_p),
            (Equipment::Generator(u) | Equipment::Battery(u), Variable::MinP) => Some(u.min_p),
            (Equipment::Generator(u) | Equipment::Battery(u), Variable::MaxP) => Some(u.max_p),
            (Equipment::HvdcLine(h), Variable::MaxP) => Some(h.max_p),
            (Equipment::HvdcLine(h), Variable::ActivePowerSetpoint) => Some(h.active_power_setpoint),
            (Equipment::HvdcLine(h), Variable::Cs1ToCs2) => h.cs1_to_cs2,
            (Equipment::HvdcLine(h), Variable::Cs2ToCs1) => h.cs2_to_cs1,
            (Equipment::PhaseTapChanger(t), Variable::PhaseTapPosition) => Some(t.tap_position as f64),
            (Equipment::Load(l), Variable::P0) => Some(l.p0),
            (Equipment::Load(l), Variable::FixedActivePower) => l.fixed_active_power,
            (Equipment::Load(l), Variable::VariableActivePower) => l.variable_active_power,
            (Equipment::Switch(s), Variable::Open) => Some(if s.open { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

/// Network snapshot held in memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryNetwork {
    equipment: BTreeMap<EquipmentId, Equipment>,
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a generator with its `[minP, maxP]` range and `targetP`
    pub fn with_generator(mut self, id: impl Into<EquipmentId>, min_p: f64, max_p: f64, target_p: f64) -> Self {
        self.insert(id, Equipment::Generator(PowerUnit { min_p, max_p, target_p }));
        self
    }

    pub fn with_battery(mut self, id: impl Into<EquipmentId>, min_p: f64, max_p: f64, target_p: f64) -> Self {
        self.insert(id, Equipment::Battery(PowerUnit { min_p, max_p, target_p }));
        self
    }

    pub fn with_hvdc_line(mut self, id: impl Into<EquipmentId>, line: HvdcLine) -> Self {
        self.insert(id, Equipment::HvdcLine(line));
        self
    }

    /// Add a phase tap changer; positions are stored as attribute values
    pub fn with_phase_tap_changer(mut self, id: impl Into<EquipmentId>, low: i32, high: i32, position: i32) -> Self {
        self.insert(
            id,
            Equipment::PhaseTapChanger(PhaseTapChanger {
                low_tap_position: low,
                high_tap_position: high,
                tap_position: position,
            }),
        );
        self
    }

    pub fn with_load(mut self, id: impl Into<EquipmentId>, load: Load) -> Self {
        self.insert(id, Equipment::Load(load));
        self
    }

    pub fn with_switch(mut self, id: impl Into<EquipmentId>, open: bool) -> Self {
        self.insert(id, Equipment::Switch(Switch { open }));
        self
    }

    pub fn insert(&mut self, id: impl Into<EquipmentId>, equipment: Equipment) {
        self.equipment.insert(id.into(), equipment);
    }

    pub fn get(&self, id: &EquipmentId) -> Option<&Equipment> {
        self.equipment.get(id)
    }

    pub fn len(&self) -> usize {
        self.equipment.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equipment.is_empty()
    }
}

impl NetworkSnapshot for InMemoryNetwork {
    fn kind(&self, id: &EquipmentId) -> Option<EquipmentKind> {
        self.equipment.get(id).map(Equipment::kind)
    }

    fn value(&self, id: &EquipmentId, variable: Variable) -> Option<f64> {
        self.equipment.get(id).and_then(|e| e.value(variable))
    }

    fn tap_range(&self, id: &EquipmentId) -> Option<(f64, f64)> {
        match self.equipment.get(id)? {
            Equipment::PhaseTapChanger(t) => {
                Some((t.low_tap_position as f64, t.high_tap_position as f64))
            }
            _ => None,
        }
    }

    fn equipment_of_kind(&self, kind: EquipmentKind) -> Vec<EquipmentId> {
        self.equipment
            .iter()
            .filter(|(_, e)| e.kind() == kind)
            .map(|(id, _)| id.clone())
            .collect()
    }
}
