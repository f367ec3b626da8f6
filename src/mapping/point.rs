use std::collections::BTreeMap;

use crate::domain::{EquipmentId, MappingKey, NetworkSnapshot, Provenance, TrackedValue, Variable};

/// Attribute values of one point of one version.
///
/// Overlays the values mapped and corrected at this point on top of the
/// static network. Dropped once the chunk is emitted; nothing is written
/// back to the network, so versions never share mutable state.
pub struct PointState<'a> {
    network: &'a dyn NetworkSnapshot,
    overrides: BTreeMap<MappingKey, TrackedValue>,
}

impl<'a> PointState<'a> {
    /// Fresh point: every value read from the network
    pub fn new(network: &'a dyn NetworkSnapshot) -> Self {
        Self {
            network,
            overrides: BTreeMap::new(),
        }
    }

    pub fn network(&self) -> &'a dyn NetworkSnapshot {
        self.network
    }

    /// Current value: the overlay when present, the base case otherwise
    pub fn get(&self, equipment: &EquipmentId, variable: Variable) -> Option<TrackedValue> {
        let key = MappingKey::new(equipment.clone(), variable);
        self.overrides
            .get(&key)
            .copied()
            .or_else(|| self.network.value(equipment, variable).map(TrackedValue::base_case))
    }

    /// Store a mapped value
    pub fn set_mapped(&mut self, key: MappingKey, value: f64) {
        self.overrides.insert(key, TrackedValue::mapped(value));
    }

    /// Replace a value, keeping its provenance
    pub fn correct(&mut self, key: MappingKey, value: f64) {
        let provenance = self
            .get(&key.equipment, key.variable)
            .map(|t| t.provenance)
            .unwrap_or(Provenance::BaseCase);
        self.overrides.insert(key, TrackedValue { value, provenance });
    }

    /// Keys mapped or corrected at this point
    pub fn touched_keys(&self) -> impl Iterator<Item = &MappingKey> {
        self.overrides.keys()
    }

    /// A load whose fixed or variable part is mapped consumes their sum,
    /// unless its `p0` is itself mapped.
    pub fn derive_load_p0(&mut self) {
        let loads: Vec<EquipmentId> = self
            .overrides
            .keys()
            .filter(|k| matches!(k.variable, Variable::FixedActivePower | Variable::VariableActivePower))
            .map(|k| k.equipment.clone())
            .collect();

        for load in loads {
            let p0_key = MappingKey::new(load.clone(), Variable::P0);
            if self.overrides.get(&p0_key).is_some_and(|t| t.provenance.is_mapped()) {
                continue;
            }
            let part = |variable| self.get(&load, variable).map(|t| t.value).unwrap_or(0.0);
            let p0 = part(Variable::FixedActivePower) + part(Variable::VariableActivePower);
            self.set_mapped(p0_key, p0);
        }
    }
}
