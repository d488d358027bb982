//! The built-in claims about the Heron recurrence, as data.
//!
//! Each [`RegistryEntry`] names a task (a single check, a refinement or a
//! seed comparison) and everything goes through [`run_entry`]. Absolute
//! values never appear in the encodings: errors are bounded two-sidedly or
//! compared through their squares.

use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::Signed;
use tracing::info;

use heron_smt::terms::SmtTerm;

use crate::claim::{check_iterations, Claim, ClaimBuilder, EncodingError};
use crate::encoder::{heron_iterate, squared_error, Seed};
use crate::refiner::{refine, RefineOptions, RefinementReport};
use crate::verifier::{Verdict, Verifier, VerifierConfig, VerifyError};
use crate::witness::{corroborate_all, Corroboration, RecurrenceProbe, Witness};

const TARGET: &str = "x";
const ROOT: &str = "sqrt_x";

fn ratio(n: i64, d: i64) -> BigRational {
    BigRational::new(BigInt::from(n), BigInt::from(d))
}

fn zero() -> SmtTerm {
    SmtTerm::rational(0, 1)
}

/// `iterate(x, seed, n) - sqrt_x`.
fn signed_error(seed: &SmtTerm, iterations: usize) -> SmtTerm {
    heron_iterate(&SmtTerm::var(TARGET), seed, iterations).sub(SmtTerm::var(ROOT))
}

fn error_squared(seed: &SmtTerm, iterations: usize) -> SmtTerm {
    squared_error(
        heron_iterate(&SmtTerm::var(TARGET), seed, iterations),
        SmtTerm::var(ROOT),
    )
}

/// `x > 0`, `b > 0` for each seed variable, and `sqrt_x` the root of `x`.
fn positive_target_and_seeds(name: &str, seeds: &[&str]) -> ClaimBuilder {
    let mut builder = Claim::builder(name)
        .real(TARGET)
        .assume(SmtTerm::var(TARGET).gt(zero()));
    for seed in seeds {
        builder = builder.real(*seed).assume(SmtTerm::var(*seed).gt(zero()));
    }
    builder.sqrt(ROOT, TARGET)
}

/// Parameters of "`|heron(x, seed, n) - sqrt(x)| < tolerance` for all
/// `lower < x < upper`".
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceParams {
    pub iterations: usize,
    pub seed: BigRational,
    pub lower: BigRational,
    pub upper: BigRational,
    pub tolerance: BigRational,
}

impl Default for ConvergenceParams {
    fn default() -> Self {
        Self {
            iterations: 7,
            seed: ratio(1, 1),
            lower: ratio(0, 1),
            upper: ratio(100, 1),
            tolerance: ratio(1, 100),
        }
    }
}

pub fn convergence_claim(name: &str, params: &ConvergenceParams) -> Result<Claim, EncodingError> {
    check_iterations(params.iterations)?;
    let seed = Seed::Const(params.seed.clone());
    let error = signed_error(&seed.to_term(), params.iterations);
    Claim::builder(name)
        .real(TARGET)
        .assume(SmtTerm::var(TARGET).gt(SmtTerm::real(params.lower.clone())))
        .assume(SmtTerm::var(TARGET).lt(SmtTerm::real(params.upper.clone())))
        .sqrt(ROOT, TARGET)
        .property(SmtTerm::and(vec![
            error.clone().gt(SmtTerm::real(-params.tolerance.clone())),
            error.lt(SmtTerm::real(params.tolerance.clone())),
        ]))
        .probe(RecurrenceProbe::new(
            format!("heron(x, {}, {})", params.seed, params.iterations),
            TARGET,
            seed,
            params.iterations,
        ))
        .build()
}

/// `|heron(x, b, near) - sqrt(x)| > |heron(x, b, far) - sqrt(x)|`, optionally
/// excluding the fixpoint `b = sqrt(x)`.
pub fn monotone_error_claim(
    name: &str,
    near: usize,
    far: usize,
    exclude_fixpoint: bool,
) -> Result<Claim, EncodingError> {
    check_iterations(near.max(far))?;
    let b = SmtTerm::var("b");
    let mut builder = positive_target_and_seeds(name, &["b"]);
    if exclude_fixpoint {
        builder = builder.assume(b.clone().distinct(SmtTerm::var(ROOT)));
    }
    builder
        .property(error_squared(&b, near).gt(error_squared(&b, far)))
        .probe(RecurrenceProbe::new(format!("heron(x, b, {near})"), TARGET, Seed::var("b"), near))
        .probe(RecurrenceProbe::new(format!("heron(x, b, {far})"), TARGET, Seed::var("b"), far))
        .build()
}

/// `|heron(x, b, near) - sqrt(x)| > c * |heron(x, b, far) - sqrt(x)|` for
/// `b != sqrt(x)`, encoded as `e_near^2 > c^2 * e_far^2`.
///
/// Squaring only preserves the inequality for `c >= 0`, so negative factors
/// are rejected.
pub fn contraction_claim(near: usize, far: usize, c: &BigRational) -> Result<Claim, EncodingError> {
    if c.is_negative() {
        return Err(EncodingError::NegativeFactor(c.to_string()));
    }
    check_iterations(near.max(far))?;
    let b = SmtTerm::var("b");
    let c_squared = SmtTerm::real(c * c);
    positive_target_and_seeds(&format!("contraction(c = {c})"), &["b"])
        .assume(b.clone().distinct(SmtTerm::var(ROOT)))
        .property(error_squared(&b, near).gt(c_squared.mul(error_squared(&b, far))))
        .probe(RecurrenceProbe::new(format!("heron(x, b, {near})"), TARGET, Seed::var("b"), near))
        .probe(RecurrenceProbe::new(format!("heron(x, b, {far})"), TARGET, Seed::var("b"), far))
        .build()
}

/// Seeds `b1 < b2` at equal distance from `sqrt(x)`: after one step, which
/// seed is closer?
pub fn symmetric_seeds(iterations: usize) -> Result<ComparisonTask, EncodingError> {
    check_iterations(iterations)?;
    let (b1, b2, root) = (SmtTerm::var("b1"), SmtTerm::var("b2"), SmtTerm::var(ROOT));
    let e1 = error_squared(&b1, iterations);
    let e2 = error_squared(&b2, iterations);
    let alternative = |name: &str, property: SmtTerm| {
        positive_target_and_seeds(name, &["b1", "b2"])
            .assume(b1.clone().lt(b2.clone()))
            .assume(b1.clone().lt(root.clone()))
            .assume(root.clone().lt(b2.clone()))
            .assume(
                root.clone()
                    .eq(b1.clone().add(b2.clone()).div(SmtTerm::rational(2, 1))),
            )
            .property(property)
            .probe(RecurrenceProbe::new(
                format!("heron(x, b1, {iterations})"),
                TARGET,
                Seed::var("b1"),
                iterations,
            ))
            .probe(RecurrenceProbe::new(
                format!("heron(x, b2, {iterations})"),
                TARGET,
                Seed::var("b2"),
                iterations,
            ))
            .build()
    };
    Ok(ComparisonTask {
        first_label: "b1".to_string(),
        second_label: "b2".to_string(),
        claims: [
            alternative("b1-always-better", e1.clone().lt(e2.clone()))?,
            alternative("b2-always-better", e2.lt(e1))?,
        ],
    })
}

/// A claim family plus the search over its parameter.
pub struct RefinementTask {
    pub family: Box<dyn Fn(&BigRational) -> Result<Claim, EncodingError>>,
    pub options: RefineOptions,
}

impl RefinementTask {
    pub fn new<F>(family: F, options: RefineOptions) -> Self
    where
        F: Fn(&BigRational) -> Result<Claim, EncodingError> + 'static,
    {
        Self {
            family: Box::new(family),
            options,
        }
    }

    /// Largest `c` with `e_near > c * e_far`.
    pub fn contraction(near: usize, far: usize, options: RefineOptions) -> Self {
        Self::new(move |c| contraction_claim(near, far, c), options)
    }
}

impl std::fmt::Debug for RefinementTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefinementTask")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Two alternatives over one shared domain; "first is always better" and
/// "second is always better".
#[derive(Debug, Clone)]
pub struct ComparisonTask {
    pub first_label: String,
    pub second_label: String,
    pub claims: [Claim; 2],
}

#[derive(Debug)]
pub enum EntryTask {
    Check(Claim),
    Refine(RefinementTask),
    Compare(ComparisonTask),
}

#[derive(Debug)]
pub struct RegistryEntry {
    pub name: &'static str,
    pub description: &'static str,
    pub task: EntryTask,
    /// Overrides the configured timeout.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ComparisonOutcome {
    FirstAlwaysBetter,
    SecondAlwaysBetter,
    Neither(Witness),
    Indeterminate(String),
}

/// Interpret the verdicts of a two-way comparison, as produced by
/// [`Verifier::verify_alternatives`].
pub fn classify_comparison(verdicts: &[Verdict]) -> ComparisonOutcome {
    match verdicts {
        [Verdict::Proved, ..] => ComparisonOutcome::FirstAlwaysBetter,
        [Verdict::Indeterminate(reason), ..] => ComparisonOutcome::Indeterminate(reason.clone()),
        [Verdict::Refuted(_), Verdict::Proved, ..] => ComparisonOutcome::SecondAlwaysBetter,
        [Verdict::Refuted(_), Verdict::Refuted(witness), ..] => {
            ComparisonOutcome::Neither(witness.clone())
        }
        [Verdict::Refuted(_), Verdict::Indeterminate(reason), ..] => {
            ComparisonOutcome::Indeterminate(reason.clone())
        }
        _ => ComparisonOutcome::Indeterminate("comparison did not reach a verdict".to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Check {
        verdict: Verdict,
        corroborations: Vec<Corroboration>,
    },
    Refine(RefinementReport),
    Compare {
        outcome: ComparisonOutcome,
        corroborations: Vec<Corroboration>,
    },
}

/// Every built-in entry, in display order.
pub fn registry() -> Result<Vec<RegistryEntry>, EncodingError> {
    let convergence = |iterations| ConvergenceParams {
        iterations,
        ..ConvergenceParams::default()
    };
    Ok(vec![
        RegistryEntry {
            name: "convergence-6",
            description: "|heron(x, 1, 6) - sqrt(x)| < 0.01 for 0 < x < 100",
            task: EntryTask::Check(convergence_claim("convergence-6", &convergence(6))?),
            timeout_ms: None,
        },
        RegistryEntry {
            name: "convergence-7",
            description: "|heron(x, 1, 7) - sqrt(x)| < 0.01 for 0 < x < 100",
            task: EntryTask::Check(convergence_claim("convergence-7", &convergence(7))?),
            timeout_ms: None,
        },
        RegistryEntry {
            name: "monotone-error",
            description: "|heron(x, b, 1) - sqrt(x)| > |heron(x, b, 2) - sqrt(x)| for x, b > 0",
            task: EntryTask::Check(monotone_error_claim("monotone-error", 1, 2, false)?),
            timeout_ms: None,
        },
        RegistryEntry {
            name: "monotone-error-excluding-fixpoint",
            description: "the monotone-error claim with b != sqrt(x)",
            task: EntryTask::Check(monotone_error_claim(
                "monotone-error-excluding-fixpoint",
                1,
                2,
                true,
            )?),
            timeout_ms: None,
        },
        RegistryEntry {
            name: "contraction-constant",
            description: "largest c in [0, 1000] with |heron(x, b, 1) - sqrt(x)| > c * |heron(x, b, 3) - sqrt(x)|",
            task: EntryTask::Refine(RefinementTask::contraction(
                1,
                3,
                RefineOptions::new(ratio(0, 1), ratio(1000, 1), 20),
            )),
            timeout_ms: None,
        },
        RegistryEntry {
            name: "symmetric-seeds",
            description: "0 < b1 < b2 equidistant from sqrt(x): which seed is better after one step?",
            task: EntryTask::Compare(symmetric_seeds(1)?),
            timeout_ms: Some(30_000),
        },
    ])
}

/// Run any task with the given verifier.
pub fn run_task(verifier: &Verifier, task: &EntryTask) -> Result<EntryOutcome, VerifyError> {
    match task {
        EntryTask::Check(claim) => {
            let verdict = verifier.verify(claim)?;
            let corroborations = match verdict.witness() {
                Some(witness) => corroborate_all(witness, &claim.probes),
                None => Vec::new(),
            };
            Ok(EntryOutcome::Check {
                verdict,
                corroborations,
            })
        }
        EntryTask::Refine(task) => Ok(EntryOutcome::Refine(refine(
            verifier,
            &task.family,
            &task.options,
        )?)),
        EntryTask::Compare(task) => {
            let verdicts = verifier.verify_alternatives(&task.claims)?;
            let outcome = classify_comparison(&verdicts);
            let corroborations = match &outcome {
                ComparisonOutcome::Neither(witness) => {
                    corroborate_all(witness, &task.claims[1].probes)
                }
                _ => Vec::new(),
            };
            Ok(EntryOutcome::Compare {
                outcome,
                corroborations,
            })
        }
    }
}

/// Run one entry, applying its timeout override on top of `config`.
pub fn run_entry(config: &VerifierConfig, entry: &RegistryEntry) -> Result<EntryOutcome, VerifyError> {
    let config = config.with_timeout_ms(entry.timeout_ms.or(config.timeout_ms));
    info!(entry = entry.name, timeout_ms = ?config.timeout_ms, "running registry entry");
    run_task(&Verifier::new(config), &entry.task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{heron_step, MAX_ITERATIONS};
    use std::collections::BTreeSet;

    #[test]
    fn registry_entries_are_unique_and_ordered() -> Result<(), EncodingError> {
        let entries = registry()?;
        let names: Vec<_> = entries.iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![
                "convergence-6",
                "convergence-7",
                "monotone-error",
                "monotone-error-excluding-fixpoint",
                "contraction-constant",
                "symmetric-seeds",
            ]
        );
        assert_eq!(names.iter().collect::<BTreeSet<_>>().len(), names.len());
        let timed: Vec<_> = entries.iter().filter_map(|e| e.timeout_ms).collect();
        assert_eq!(timed, vec![30_000]);
        Ok(())
    }

    #[test]
    fn convergence_claim_bounds_error_on_both_sides() -> Result<(), EncodingError> {
        let claim = convergence_claim("c", &ConvergenceParams::default())?;
        assert_eq!(claim.domain.variables, vec!["x", "sqrt_x"]);
        let SmtTerm::And(sides) = &claim.property else {
            panic!("expected a conjunction, got {}", claim.property);
        };
        assert_eq!(sides.len(), 2);
        assert!(matches!(claim.negated_property(), SmtTerm::Or(_)));
        assert_eq!(claim.probes.len(), 1);
        assert_eq!(claim.probes[0].iterations, 7);
        Ok(())
    }

    #[test]
    fn convergence_below_zero_is_not_guarded() {
        let params = ConvergenceParams {
            lower: ratio(-1, 1),
            ..ConvergenceParams::default()
        };
        assert!(matches!(
            convergence_claim("c", &params),
            Err(EncodingError::UnguardedDenominator(_))
        ));
    }

    #[test]
    fn monotone_claim_differs_only_by_fixpoint_exclusion() -> Result<(), EncodingError> {
        let plain = monotone_error_claim("m", 1, 2, false)?;
        let excluded = monotone_error_claim("m", 1, 2, true)?;
        assert_eq!(plain.property, excluded.property);
        assert_eq!(
            excluded.domain.constraints.len(),
            plain.domain.constraints.len() + 1
        );
        assert_eq!(
            excluded.domain.constraints.last(),
            Some(&SmtTerm::var("b").distinct(SmtTerm::var("sqrt_x")))
        );
        Ok(())
    }

    #[test]
    fn contraction_squares_the_constant() -> Result<(), EncodingError> {
        let claim = contraction_claim(1, 3, &ratio(3, 2))?;
        let SmtTerm::Gt(_, rhs) = &claim.property else {
            panic!("expected a strict comparison, got {}", claim.property);
        };
        let SmtTerm::Mul(factor, _) = rhs.as_ref() else {
            panic!("expected a product, got {rhs}");
        };
        assert_eq!(factor.as_ref(), &SmtTerm::real(ratio(9, 4)));
        Ok(())
    }

    #[test]
    fn contraction_rejects_negative_factors() -> Result<(), EncodingError> {
        assert_eq!(
            contraction_claim(1, 3, &ratio(-5, 1)),
            Err(EncodingError::NegativeFactor("-5".to_string()))
        );
        let at_zero = contraction_claim(1, 3, &ratio(0, 1))?;
        assert_ne!(at_zero.property, contraction_claim(1, 3, &ratio(5, 1))?.property);
        Ok(())
    }

    #[test]
    fn oversized_iteration_counts_fail_before_encoding() {
        let too_many = MAX_ITERATIONS + 1;
        let expected = EncodingError::TooManyIterations {
            requested: too_many,
            max: MAX_ITERATIONS,
        };
        let params = ConvergenceParams {
            iterations: too_many,
            ..ConvergenceParams::default()
        };
        assert_eq!(convergence_claim("c", &params), Err(expected.clone()));
        assert_eq!(monotone_error_claim("m", 1, too_many, false), Err(expected.clone()));
        assert_eq!(contraction_claim(too_many, 3, &ratio(1, 1)), Err(expected.clone()));
        assert!(matches!(symmetric_seeds(too_many), Err(e) if e == expected));
    }

    #[test]
    fn symmetric_seed_alternatives_share_a_domain() -> Result<(), EncodingError> {
        let task = symmetric_seeds(1)?;
        assert_eq!(task.claims[0].domain, task.claims[1].domain);
        let b1 = SmtTerm::var("b1");
        let e1 = heron_step(&SmtTerm::var("x"), b1).sub(SmtTerm::var("sqrt_x"));
        assert_eq!(
            task.claims[0].property,
            e1.clone().mul(e1).lt(error_squared(&SmtTerm::var("b2"), 1))
        );
        Ok(())
    }

    #[test]
    fn comparison_classification() {
        let refuted = || Verdict::Refuted(Witness::default());
        assert_eq!(
            classify_comparison(&[Verdict::Proved]),
            ComparisonOutcome::FirstAlwaysBetter
        );
        assert_eq!(
            classify_comparison(&[refuted(), Verdict::Proved]),
            ComparisonOutcome::SecondAlwaysBetter
        );
        assert_eq!(
            classify_comparison(&[refuted(), refuted()]),
            ComparisonOutcome::Neither(Witness::default())
        );
        assert_eq!(
            classify_comparison(&[Verdict::Indeterminate("t".into())]),
            ComparisonOutcome::Indeterminate("t".into())
        );
        assert_eq!(
            classify_comparison(&[refuted(), Verdict::Indeterminate("t".into())]),
            ComparisonOutcome::Indeterminate("t".into())
        );
        assert!(matches!(
            classify_comparison(&[]),
            ComparisonOutcome::Indeterminate(_)
        ));
    }

    #[test]
    fn entry_timeout_overrides_config() {
        let config = VerifierConfig::default().with_timeout_ms(Some(5));
        let merged = config.with_timeout_ms(Some(30_000_u64).or(config.timeout_ms));
        assert_eq!(merged.timeout_ms, Some(30_000));
        let merged = config.with_timeout_ms(None.or(config.timeout_ms));
        assert_eq!(merged.timeout_ms, Some(5));
    }
}
