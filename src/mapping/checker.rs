//! Range violation checker and correction engine.
//!
//! A value outside its range is classified by the provenance of the value
//! and of the violated bound:
//!
//! | value     | bound     | category              | correction                                   |
//! |-----------|-----------|-----------------------|----------------------------------------------|
//! | base case | base case | BC range problem      | clamp (or zero on sign mismatch); widen if ignoreLimits |
//! | mapped    | base case | scaling down          | clamp; widen to value + margin if ignoreLimits |
//! | base case | mapped    | mapping range problem | clamp, ignoreLimits has no effect             |
//! | mapped    | mapped    | scaling down          | clamp, ignoreLimits has no effect             |

use crate::diagnostics::{Finding, ProblemCategory, Severity, Synthesis};
use crate::domain::{EquipmentId, EquipmentKind, MappingKey, Provenance, TrackedValue, Variable};

use super::bounds::{resolver_for, Bound, BoundPair, Side};
use super::point::PointState;

/// Upper bound on check/correct rounds for one equipment at one point.
/// A widened base case limit can uncover a tighter mapped limit on the same
/// side, which the next round clamps to. A clamp always ends the rounds.
const MAX_CORRECTION_ROUNDS: usize = 3;

const IGNORE_LIMITS_DISABLED: &str = " (ignoreLimits disabled)";

/// Everything the checker needs to judge one value
#[derive(Debug, Clone)]
pub struct CheckInput<'a> {
    pub equipment: &'a EquipmentId,
    pub kind: EquipmentKind,
    pub variable: Variable,
    pub value: TrackedValue,
    pub bounds: BoundPair,
    /// ignoreLimits is set for the value's time series
    pub ignore_limits: bool,
    pub can_widen: bool,
    pub sign_sensitive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Leave value and bounds untouched
    Keep,
    SetValue(f64),
    WidenBound { side: Side, to: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub correction: Correction,
    pub finding: Finding,
}

#[derive(Debug, Clone, Copy)]
pub struct Checker {
    tolerance_margin: f64,
}

impl Checker {
    /// `tolerance_margin` is added past a mapped value when its base case bound is widened
    pub fn new(tolerance_margin: f64) -> Self {
        Self { tolerance_margin }
    }

    /// Judge one value against its range. `None` when the value is in range.
    pub fn check(&self, input: &CheckInput<'_>) -> Option<Verdict> {
        let side = input.bounds.violated_side(input.value.value)?;
        let bound = *input.bounds.side(side);
        let violation = Violation { input, side, bound };

        Some(match (input.value.provenance, bound.provenance) {
            (Provenance::BaseCase, Provenance::BaseCase) => self.base_case_range(&violation),
            (Provenance::Mapped, Provenance::BaseCase) => self.scaling_down_base_case(&violation),
            (Provenance::BaseCase, Provenance::Mapped) => {
                violation.clamp_to_mapped(ProblemCategory::MappingRangeProblem)
            }
            (Provenance::Mapped, Provenance::Mapped) => {
                violation.clamp_to_mapped(ProblemCategory::ScalingDownProblem)
            }
        })
    }

    fn base_case_range(&self, v: &Violation<'_, '_>) -> Verdict {
        let input = v.input;
        let value = input.value.value;
        let var = input.variable;
        let bound_name = v.bound.name;

        if input.sign_sensitive && v.between_zero_and_bound() {
            let label = format!("base case {bound_name} violated by {var}");
            let message = format!(
                "base case {bound_name} {} of {} violated by {var} {value}, but {var} has not been changed",
                v.bound.value, input.equipment
            );
            return v.invariant(Correction::Keep, Severity::Info, label, message);
        }

        if v.escape() {
            let label = format!("base case {bound_name} changed to {var}");
            let message = format!("{}: base case {bound_name} changed to {value}", v.describe());
            return v.invariant(
                Correction::WidenBound { side: v.side, to: value },
                Severity::Info,
                label,
                message,
            );
        }

        if input.sign_sensitive && v.opposite_sign() {
            let label = format!("{var} changed to 0{}", v.suffix());
            let message = format!("{}: {var} changed to 0", v.describe());
            return v.invariant(Correction::SetValue(0.0), Severity::Warning, label, message);
        }

        let label = format!("{var} changed to base case {bound_name}{}", v.suffix());
        let message = format!("{}: {var} changed to {}", v.describe(), v.bound.value);
        v.invariant(Correction::SetValue(v.bound.value), Severity::Warning, label, message)
    }

    fn scaling_down_base_case(&self, v: &Violation<'_, '_>) -> Verdict {
        let input = v.input;
        let var = input.variable;
        let bound_name = v.bound.name;

        if v.escape() {
            let to = match v.side {
                Side::High => input.value.value + self.tolerance_margin,
                Side::Low => input.value.value - self.tolerance_margin,
            };
            let label = format!("base case {bound_name} changed to mapped {var}");
            let message = format!("{}: base case {bound_name} changed to {to}", v.describe());
            return v.scoped(
                Correction::WidenBound { side: v.side, to },
                Severity::Info,
                ProblemCategory::LimitChange,
                label.clone(),
                message,
                ProblemCategory::ScalingDownProblem,
                label,
            );
        }

        let label = format!("{var} changed to base case {bound_name}{}", v.suffix());
        let message = format!("{}: {var} changed to {}", v.describe(), v.bound.value);
        v.scoped(
            Correction::SetValue(v.bound.value),
            Severity::Warning,
            ProblemCategory::ScalingDownProblem,
            label.clone(),
            message,
            ProblemCategory::ScalingDownProblem,
            label,
        )
    }

    /// Run check and correction rounds on one equipment until its value is
    /// accepted. Returns the findings in the order they were produced.
    pub fn enforce(
        &self,
        state: &mut PointState<'_>,
        equipment: &EquipmentId,
        kind: EquipmentKind,
        ignore_limits: bool,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();
        let Some(resolver) = resolver_for(kind) else {
            return findings;
        };
        let variable = resolver.value_variable();

        for _ in 0..MAX_CORRECTION_ROUNDS {
            let Some(bounds) = resolver.resolve(state, equipment) else {
                break;
            };
            let Some(value) = state.get(equipment, variable) else {
                break;
            };
            let input = CheckInput {
                equipment,
                kind,
                variable,
                value,
                bounds,
                ignore_limits,
                can_widen: resolver.can_widen(),
                sign_sensitive: resolver.sign_sensitive(),
            };
            let Some(verdict) = self.check(&input) else {
                break;
            };
            findings.push(verdict.finding);
            match verdict.correction {
                Correction::Keep => break,
                Correction::SetValue(corrected) => {
                    state.correct(MappingKey::new(equipment.clone(), variable), corrected);
                    break;
                }
                Correction::WidenBound { side, to } => {
                    if !resolver.widen(state, equipment, side, to) {
                        break;
                    }
                }
            }
        }
        findings
    }
}

/// A value found on the wrong side of one bound
struct Violation<'i, 'e> {
    input: &'i CheckInput<'e>,
    side: Side,
    bound: Bound,
}

impl Violation<'_, '_> {
    fn escape(&self) -> bool {
        self.input.ignore_limits && self.input.can_widen
    }

    /// Label suffix when ignoreLimits is set but cannot apply
    fn suffix(&self) -> &'static str {
        if self.input.ignore_limits {
            IGNORE_LIMITS_DISABLED
        } else {
            ""
        }
    }

    /// Value sits between zero and a bound of the same sign
    fn between_zero_and_bound(&self) -> bool {
        let value = self.input.value.value;
        match self.side {
            Side::Low => self.bound.value > 0.0 && value >= 0.0,
            Side::High => self.bound.value < 0.0 && value <= 0.0,
        }
    }

    /// Reaching the bound would cross zero
    fn opposite_sign(&self) -> bool {
        let value = self.input.value.value;
        match self.side {
            Side::Low => self.bound.value > 0.0 && value < 0.0,
            Side::High => self.bound.value < 0.0 && value > 0.0,
        }
    }

    fn describe(&self) -> String {
        let input = self.input;
        let comparison = match self.side {
            Side::Low => "lower than",
            Side::High => "higher than",
        };
        format!(
            "{} {} of {} {comparison} {} {} {}",
            input.variable,
            input.value.value,
            input.equipment,
            self.bound.provenance,
            self.bound.name,
            self.bound.value
        )
    }

    fn clamp_to_mapped(&self, category: ProblemCategory) -> Verdict {
        let var = self.input.variable;
        let label = format!("{var} changed to mapped {}{}", self.bound.name, self.suffix());
        let message = format!("{}: {var} changed to {}", self.describe(), self.bound.value);
        self.scoped(
            Correction::SetValue(self.bound.value),
            Severity::Warning,
            category,
            label.clone(),
            message,
            category,
            label,
        )
    }

    fn invariant(&self, correction: Correction, severity: Severity, label: String, message: String) -> Verdict {
        Verdict {
            correction,
            finding: Finding {
                severity,
                category: ProblemCategory::BaseCaseRangeProblem,
                label,
                section: self.input.kind,
                equipment: self.input.equipment.clone(),
                message,
                point_invariant: true,
                synthesis: None,
            },
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn scoped(
        &self,
        correction: Correction,
        severity: Severity,
        category: ProblemCategory,
        label: String,
        message: String,
        synthesis_category: ProblemCategory,
        synthesis_label: String,
    ) -> Verdict {
        let synthesis_message = format!("at least one {synthesis_label}");
        Verdict {
            correction,
            finding: Finding {
                severity,
                category,
                label,
                section: self.input.kind,
                equipment: self.input.equipment.clone(),
                message,
                point_invariant: false,
                synthesis: Some(Synthesis {
                    category: synthesis_category,
                    label: synthesis_label,
                    message: synthesis_message,
                }),
            },
        }
    }
}
