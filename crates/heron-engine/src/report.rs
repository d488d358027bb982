//! Serializable views of verification outcomes.
//!
//! Exact rationals are carried as strings next to their `f64` view so JSON
//! consumers never lose precision.

use std::fmt;

use num::rational::BigRational;
use num::traits::ToPrimitive;
use serde::Serialize;

use crate::refiner::{Direction, RefinementReport, StepOutcome};
use crate::registry::{ComparisonOutcome, EntryOutcome};
use crate::verifier::{Verdict, VerdictKind};
use crate::witness::{Corroboration, Witness};

/// JSON schema version for report outputs.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentView {
    pub name: String,
    pub exact: String,
    pub approx: Option<f64>,
}

fn assignments(witness: &Witness) -> Vec<AssignmentView> {
    witness
        .assignments()
        .into_iter()
        .map(|(name, value)| AssignmentView {
            approx: witness.approx(&name).ok(),
            exact: value.to_string(),
            name,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerdictReport {
    pub verdict: VerdictKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub witness: Vec<AssignmentView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub corroborations: Vec<Corroboration>,
}

impl VerdictReport {
    pub fn new(verdict: &Verdict, corroborations: &[Corroboration]) -> Self {
        Self {
            verdict: verdict.kind(),
            reason: match verdict {
                Verdict::Indeterminate(reason) => Some(reason.clone()),
                _ => None,
            },
            witness: verdict.witness().map(assignments).unwrap_or_default(),
            corroborations: corroborations.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RationalView {
    pub exact: String,
    pub approx: Option<f64>,
}

impl From<&BigRational> for RationalView {
    fn from(value: &BigRational) -> Self {
        Self {
            exact: value.to_string(),
            approx: value.to_f64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinementStepView {
    pub iteration: usize,
    pub candidate: RationalView,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinementReportView {
    pub direction: Direction,
    pub best_provable: Option<RationalView>,
    pub resolution: RationalView,
    pub indeterminate_steps: usize,
    pub steps: Vec<RefinementStepView>,
}

impl From<&RefinementReport> for RefinementReportView {
    fn from(report: &RefinementReport) -> Self {
        Self {
            direction: report.direction,
            best_provable: report.best_provable.as_ref().map(RationalView::from),
            resolution: RationalView::from(&report.resolution),
            indeterminate_steps: report.indeterminate_steps,
            steps: report
                .steps
                .iter()
                .map(|step| RefinementStepView {
                    iteration: step.iteration,
                    candidate: RationalView::from(&step.candidate),
                    outcome: step.outcome.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    FirstAlwaysBetter,
    SecondAlwaysBetter,
    Neither,
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub first: String,
    pub second: String,
    pub outcome: ComparisonKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub witness: Vec<AssignmentView>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub corroborations: Vec<Corroboration>,
}

impl ComparisonReport {
    pub fn new(
        first: &str,
        second: &str,
        outcome: &ComparisonOutcome,
        corroborations: &[Corroboration],
    ) -> Self {
        let (kind, reason, witness) = match outcome {
            ComparisonOutcome::FirstAlwaysBetter => (ComparisonKind::FirstAlwaysBetter, None, vec![]),
            ComparisonOutcome::SecondAlwaysBetter => {
                (ComparisonKind::SecondAlwaysBetter, None, vec![])
            }
            ComparisonOutcome::Neither(w) => (ComparisonKind::Neither, None, assignments(w)),
            ComparisonOutcome::Indeterminate(r) => {
                (ComparisonKind::Indeterminate, Some(r.clone()), vec![])
            }
        };
        Self {
            first: first.to_string(),
            second: second.to_string(),
            outcome: kind,
            reason,
            witness,
            corroborations: corroborations.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryReportBody {
    Check(VerdictReport),
    Refine(RefinementReportView),
    Compare(ComparisonReport),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryReport {
    pub schema_version: u32,
    pub name: String,
    pub description: String,
    pub solver: String,
    #[serde(flatten)]
    pub body: EntryReportBody,
}

impl EntryReport {
    /// `labels` names the two alternatives of a comparison.
    pub fn new(
        name: &str,
        description: &str,
        solver: &str,
        outcome: &EntryOutcome,
        labels: (&str, &str),
    ) -> Self {
        let body = match outcome {
            EntryOutcome::Check {
                verdict,
                corroborations,
            } => EntryReportBody::Check(VerdictReport::new(verdict, corroborations)),
            EntryOutcome::Refine(report) => EntryReportBody::Refine(report.into()),
            EntryOutcome::Compare {
                outcome,
                corroborations,
            } => EntryReportBody::Compare(ComparisonReport::new(
                labels.0,
                labels.1,
                outcome,
                corroborations,
            )),
        };
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            name: name.to_string(),
            description: description.to_string(),
            solver: solver.to_string(),
            body,
        }
    }
}

fn write_approx(f: &mut fmt::Formatter<'_>, approx: Option<f64>) -> fmt::Result {
    match approx {
        Some(v) => write!(f, " (~ {v})"),
        None => Ok(()),
    }
}

fn write_witness(f: &mut fmt::Formatter<'_>, witness: &[AssignmentView]) -> fmt::Result {
    if witness.is_empty() {
        return Ok(());
    }
    writeln!(f, "  counterexample:")?;
    for a in witness {
        write!(f, "    {} = {}", a.name, a.exact)?;
        write_approx(f, a.approx)?;
        writeln!(f)?;
    }
    Ok(())
}

fn write_corroborations(f: &mut fmt::Formatter<'_>, items: &[Corroboration]) -> fmt::Result {
    for c in items {
        writeln!(
            f,
            "  {} ~ {}, sqrt(x) ~ {}, |error| ~ {}",
            c.label, c.computed_approx, c.true_value, c.absolute_error
        )?;
    }
    Ok(())
}

impl fmt::Display for EntryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.name, self.description)?;
        match &self.body {
            EntryReportBody::Check(report) => {
                write!(f, "  verdict: {}", kind_label(report.verdict))?;
                if let Some(reason) = &report.reason {
                    write!(f, " ({reason})")?;
                }
                writeln!(f)?;
                write_witness(f, &report.witness)?;
                write_corroborations(f, &report.corroborations)?;
            }
            EntryReportBody::Refine(report) => {
                for step in &report.steps {
                    write!(f, "  step {:>2}: c = {}", step.iteration, step.candidate.exact)?;
                    write_approx(f, step.candidate.approx)?;
                    match &step.outcome {
                        StepOutcome::Proved => writeln!(f, " provable")?,
                        StepOutcome::Refuted => writeln!(f, " not provable")?,
                        StepOutcome::Indeterminate(reason) => {
                            writeln!(f, " indeterminate ({reason})")?
                        }
                    }
                }
                match &report.best_provable {
                    Some(best) => {
                        write!(f, "  best provable: {}", best.exact)?;
                        write_approx(f, best.approx)?;
                    }
                    None => write!(f, "  best provable: none")?,
                }
                write!(f, ", resolution {}", report.resolution.exact)?;
                write_approx(f, report.resolution.approx)?;
                writeln!(f)?;
                if report.indeterminate_steps > 0 {
                    writeln!(f, "  indeterminate steps: {}", report.indeterminate_steps)?;
                }
            }
            EntryReportBody::Compare(report) => {
                let outcome = match report.outcome {
                    ComparisonKind::FirstAlwaysBetter => format!("{} always better", report.first),
                    ComparisonKind::SecondAlwaysBetter => {
                        format!("{} always better", report.second)
                    }
                    ComparisonKind::Neither => "neither is always better".to_string(),
                    ComparisonKind::Indeterminate => "indeterminate".to_string(),
                };
                write!(f, "  outcome: {outcome}")?;
                if let Some(reason) = &report.reason {
                    write!(f, " ({reason})")?;
                }
                writeln!(f)?;
                write_witness(f, &report.witness)?;
                write_corroborations(f, &report.corroborations)?;
            }
        }
        Ok(())
    }
}

fn kind_label(kind: VerdictKind) -> &'static str {
    match kind {
        VerdictKind::Proved => "PROVED",
        VerdictKind::Refuted => "REFUTED",
        VerdictKind::Indeterminate => "INDETERMINATE",
    }
}
