use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter};

use crate::domain::{EquipmentId, EquipmentKind};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
pub enum Severity {
    #[strum(serialize = "INFO")]
    Info,
    #[strum(serialize = "WARNING")]
    Warning,
}

/// Closed taxonomy of range findings
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
pub enum ProblemCategory {
    /// Base case value outside a base case bound
    #[strum(serialize = "BC range problem")]
    BaseCaseRangeProblem,
    /// Base case value outside a mapped bound
    #[strum(serialize = "mapping range problem")]
    MappingRangeProblem,
    /// Mapped value outside a bound
    #[strum(serialize = "scaling down")]
    ScalingDownProblem,
    /// Base case bound widened to let a mapped value through
    #[strum(serialize = "limit change")]
    LimitChange,
}

/// Versions a record applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariantScope {
    /// Point-invariant finding, identical in every version
    All,
    Version(u32),
}

impl fmt::Display for VariantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantScope::All => write!(f, "ALL"),
            VariantScope::Version(v) => write!(f, "{v}"),
        }
    }
}

/// One diagnostics entry, ready for a report writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub severity: Severity,
    pub category: ProblemCategory,
    pub label: String,
    pub section: EquipmentKind,
    pub scope: VariantScope,
    pub point: Option<usize>,
    pub equipment: Option<EquipmentId>,
    pub message: String,
    /// Set on synthesis records only
    pub synthesis: Option<String>,
}

impl LogRecord {
    pub fn is_synthesis(&self) -> bool {
        self.synthesis.is_some()
    }

    /// `<category> - <label>`, the heading report writers group records by
    pub fn title(&self) -> String {
        format!("{} - {}", self.category, self.label)
    }
}

/// Per-version aggregate a point-level finding contributes to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub category: ProblemCategory,
    pub label: String,
    pub message: String,
}

/// Checker outcome before it is scoped to a version and point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub category: ProblemCategory,
    pub label: String,
    pub section: EquipmentKind,
    pub equipment: EquipmentId,
    pub message: String,
    /// Both the value and the violated bound are base case
    pub point_invariant: bool,
    pub synthesis: Option<Synthesis>,
}
