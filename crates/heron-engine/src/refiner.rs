//! Fixed-iteration binary search over a one-parameter family of claims.
//!
//! The family maps a rational parameter `c` to a claim. Provability is
//! assumed monotone in `c`; the refiner bisects `[low, high]` a fixed number
//! of times and reports the best candidate that was actually proved.

use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::ToPrimitive;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::claim::{Claim, EncodingError};
use crate::verifier::{ClaimChecker, Verdict, VerifyError};

/// Which side of the interval provability lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Provable for every `c` up to some threshold; search for the largest.
    #[default]
    Supremum,
    /// Provable for every `c` beyond some threshold; search for the smallest.
    Infimum,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefineOptions {
    pub low: BigRational,
    pub high: BigRational,
    pub iterations: usize,
    pub direction: Direction,
}

impl RefineOptions {
    pub fn new(low: BigRational, high: BigRational, iterations: usize) -> Self {
        Self {
            low,
            high,
            iterations,
            direction: Direction::Supremum,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    fn validate(&self) -> Result<(), RefineError> {
        if self.low > self.high {
            return Err(RefineError::EmptyInterval {
                low: self.low.to_string(),
                high: self.high.to_string(),
            });
        }
        if self.iterations == 0 {
            return Err(RefineError::ZeroIterations);
        }
        Ok(())
    }

    /// Width of the final interval: `(high - low) / 2^iterations`.
    pub fn resolution(&self) -> BigRational {
        let scale = num::pow(BigInt::from(2), self.iterations);
        (&self.high - &self.low) / BigRational::from_integer(scale)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefineError {
    #[error("search interval [{low}, {high}] is empty")]
    EmptyInterval { low: String, high: String },
    #[error("refinement needs at least one iteration")]
    ZeroIterations,
}

impl From<RefineError> for VerifyError {
    fn from(e: RefineError) -> Self {
        VerifyError::InvalidSearch(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum StepOutcome {
    Proved,
    Refuted,
    Indeterminate(String),
}

impl From<&Verdict> for StepOutcome {
    fn from(verdict: &Verdict) -> Self {
        match verdict {
            Verdict::Proved => StepOutcome::Proved,
            Verdict::Refuted(_) => StepOutcome::Refuted,
            Verdict::Indeterminate(reason) => StepOutcome::Indeterminate(reason.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefinementStep {
    /// 1-based.
    pub iteration: usize,
    pub candidate: BigRational,
    pub outcome: StepOutcome,
}

/// Interval state of one refinement run.
///
/// `best_provable`, once set, lies in `[low, high]` and was proved.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    pub low: BigRational,
    pub high: BigRational,
    pub best_provable: Option<BigRational>,
    pub iterations_run: usize,
}

impl SearchState {
    fn new(options: &RefineOptions) -> Self {
        Self {
            low: options.low.clone(),
            high: options.high.clone(),
            best_provable: None,
            iterations_run: 0,
        }
    }

    fn midpoint(&self) -> BigRational {
        (&self.low + &self.high) / BigRational::from_integer(BigInt::from(2))
    }

    fn advance(&mut self, candidate: BigRational, proved: bool, direction: Direction) {
        self.iterations_run += 1;
        match (direction, proved) {
            (Direction::Supremum, true) => {
                self.low = candidate.clone();
                self.best_provable = Some(candidate);
            }
            (Direction::Supremum, false) => self.high = candidate,
            (Direction::Infimum, true) => {
                self.high = candidate.clone();
                self.best_provable = Some(candidate);
            }
            (Direction::Infimum, false) => self.low = candidate,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefinementReport {
    pub direction: Direction,
    pub best_provable: Option<BigRational>,
    pub resolution: BigRational,
    pub final_low: BigRational,
    pub final_high: BigRational,
    pub steps: Vec<RefinementStep>,
    pub indeterminate_steps: usize,
}

impl RefinementReport {
    pub fn best_provable_f64(&self) -> Option<f64> {
        self.best_provable.as_ref().and_then(|c| c.to_f64())
    }
}

/// Bisect `[options.low, options.high]` for exactly `options.iterations`
/// steps.
///
/// `Indeterminate` steps steer the search like `Refuted` but are kept
/// distinct in the step log and counted separately.
pub fn refine<C, F>(
    checker: &C,
    family: F,
    options: &RefineOptions,
) -> Result<RefinementReport, VerifyError>
where
    C: ClaimChecker + ?Sized,
    F: Fn(&BigRational) -> Result<Claim, EncodingError>,
{
    options.validate()?;
    let mut state = SearchState::new(options);
    let mut steps = Vec::with_capacity(options.iterations);
    let mut indeterminate_steps = 0;

    for iteration in 1..=options.iterations {
        let candidate = state.midpoint();
        let claim = family(&candidate)?;
        let verdict = checker.check(&claim)?;
        let outcome = StepOutcome::from(&verdict);
        match &outcome {
            StepOutcome::Proved => info!(iteration, c = %candidate, "provable"),
            StepOutcome::Refuted => info!(iteration, c = %candidate, "not provable"),
            StepOutcome::Indeterminate(reason) => {
                indeterminate_steps += 1;
                warn!(iteration, c = %candidate, "indeterminate, treating as not provable: {reason}");
            }
        }
        state.advance(candidate.clone(), verdict.is_proved(), options.direction);
        steps.push(RefinementStep {
            iteration,
            candidate,
            outcome,
        });
    }

    Ok(RefinementReport {
        direction: options.direction,
        best_provable: state.best_provable,
        resolution: options.resolution(),
        final_low: state.low,
        final_high: state.high,
        steps,
        indeterminate_steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::{Verifier, VerifierConfig};
    use crate::witness::Witness;
    use heron_smt::terms::SmtTerm;
    use std::cell::Cell;

    fn ratio(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    /// `x > c` for every `x` in `(1, 2)`: provable exactly when `c <= 1`.
    fn above_family(c: &BigRational) -> Result<Claim, EncodingError> {
        Claim::builder(format!("above-{c}"))
            .real("x")
            .assume(SmtTerm::var("x").gt(SmtTerm::rational(1, 1)))
            .assume(SmtTerm::var("x").lt(SmtTerm::rational(2, 1)))
            .property(SmtTerm::var("x").gt(SmtTerm::real(c.clone())))
            .build()
    }

    /// `x < c` for every `x` in `(0, 1)`: provable exactly when `c >= 1`.
    fn below_family(c: &BigRational) -> Result<Claim, EncodingError> {
        Claim::builder(format!("below-{c}"))
            .real("x")
            .assume(SmtTerm::var("x").gt(SmtTerm::rational(0, 1)))
            .assume(SmtTerm::var("x").lt(SmtTerm::rational(1, 1)))
            .property(SmtTerm::var("x").lt(SmtTerm::real(c.clone())))
            .build()
    }

    /// Proves `x > c` whenever `c <= limit`, without a solver.
    struct Threshold {
        limit: BigRational,
        above: Verdict,
        calls: Cell<usize>,
    }

    impl Threshold {
        fn new(limit: BigRational, above: Verdict) -> Self {
            Self {
                limit,
                above,
                calls: Cell::new(0),
            }
        }
    }

    impl ClaimChecker for Threshold {
        fn check(&self, claim: &Claim) -> Result<Verdict, VerifyError> {
            self.calls.set(self.calls.get() + 1);
            match &claim.property {
                SmtTerm::Gt(_, rhs) => match rhs.as_ref() {
                    SmtTerm::RealLit(c) if *c <= self.limit => Ok(Verdict::Proved),
                    SmtTerm::RealLit(_) => Ok(self.above.clone()),
                    other => panic!("unexpected bound {other}"),
                },
                other => panic!("unexpected property {other}"),
            }
        }
    }

    #[test]
    fn supremum_lands_on_largest_dyadic_below_threshold() {
        let checker = Threshold::new(ratio(7, 10), Verdict::Refuted(Witness::default()));
        let options = RefineOptions::new(ratio(0, 1), ratio(1, 1), 8);
        let report = refine(&checker, above_family, &options).expect("refinement should run");

        assert_eq!(checker.calls.get(), 8);
        assert_eq!(report.steps.len(), 8);
        assert_eq!(report.resolution, ratio(1, 256));
        assert_eq!(report.best_provable, Some(ratio(179, 256)));
        assert_eq!(report.indeterminate_steps, 0);

        let best = report.best_provable.clone().expect("some candidate was proved");
        assert!(best >= report.final_low && best <= report.final_high);
        let successor = above_family(&(best + report.resolution.clone())).expect("claim builds");
        assert!(!checker.check(&successor).expect("mock check").is_proved());
    }

    #[test]
    fn indeterminate_steps_steer_like_refutations_but_are_counted() {
        let checker = Threshold::new(ratio(7, 10), Verdict::Indeterminate("timeout".into()));
        let options = RefineOptions::new(ratio(0, 1), ratio(1, 1), 8);
        let report = refine(&checker, above_family, &options).expect("refinement should run");

        assert_eq!(report.best_provable, Some(ratio(179, 256)));
        let not_proved = report
            .steps
            .iter()
            .filter(|s| s.outcome != StepOutcome::Proved)
            .count();
        assert_eq!(report.indeterminate_steps, not_proved);
        assert!(report
            .steps
            .iter()
            .all(|s| s.outcome != StepOutcome::Refuted));
    }

    #[test]
    fn nothing_provable_leaves_best_unset() {
        let checker = Threshold::new(ratio(-1, 1), Verdict::Refuted(Witness::default()));
        let options = RefineOptions::new(ratio(0, 1), ratio(10, 1), 5);
        let report = refine(&checker, above_family, &options).expect("refinement should run");
        assert_eq!(report.best_provable, None);
        assert_eq!(report.best_provable_f64(), None);
        assert_eq!(report.final_low, ratio(0, 1));
    }

    #[test]
    fn steps_are_numbered_and_bisect() {
        let checker = Threshold::new(ratio(1, 1), Verdict::Refuted(Witness::default()));
        let options = RefineOptions::new(ratio(0, 1), ratio(4, 1), 3);
        let report = refine(&checker, above_family, &options).expect("refinement should run");
        let candidates: Vec<_> = report.steps.iter().map(|s| s.candidate.clone()).collect();
        assert_eq!(candidates, vec![ratio(2, 1), ratio(1, 1), ratio(3, 2)]);
        let numbers: Vec<_> = report.steps.iter().map(|s| s.iteration).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn invalid_options_are_rejected() {
        let checker = Threshold::new(ratio(1, 1), Verdict::Proved);
        let err = refine(
            &checker,
            above_family,
            &RefineOptions::new(ratio(2, 1), ratio(1, 1), 4),
        )
        .unwrap_err();
        assert!(matches!(err, VerifyError::InvalidSearch(_)));

        let err = refine(
            &checker,
            above_family,
            &RefineOptions::new(ratio(0, 1), ratio(1, 1), 0),
        )
        .unwrap_err();
        assert!(matches!(err, VerifyError::InvalidSearch(_)));
        assert_eq!(checker.calls.get(), 0);
    }

    #[test]
    fn family_encoding_errors_propagate() {
        let checker = Threshold::new(ratio(1, 1), Verdict::Proved);
        let broken = |_: &BigRational| {
            Claim::builder("broken")
                .property(SmtTerm::var("ghost").gt(SmtTerm::rational(0, 1)))
                .build()
        };
        let err = refine(&checker, broken, &RefineOptions::new(ratio(0, 1), ratio(1, 1), 2))
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Encoding(EncodingError::UndeclaredVariable(_))
        ));
    }

    #[test]
    fn z3_supremum_of_linear_family() -> Result<(), Box<dyn std::error::Error>> {
        let verifier = Verifier::new(VerifierConfig::default());
        let options = RefineOptions::new(ratio(0, 1), ratio(4, 1), 10);
        let report = refine(&verifier, above_family, &options)?;

        assert_eq!(report.best_provable, Some(ratio(1, 1)));
        let successor = above_family(&(ratio(1, 1) + report.resolution.clone()))?;
        assert!(!verifier.verify(&successor)?.is_proved());
        Ok(())
    }

    #[test]
    fn z3_infimum_of_linear_family() -> Result<(), Box<dyn std::error::Error>> {
        let verifier = Verifier::new(VerifierConfig::default());
        let options =
            RefineOptions::new(ratio(0, 1), ratio(4, 1), 6).with_direction(Direction::Infimum);
        let report = refine(&verifier, below_family, &options)?;

        assert_eq!(report.best_provable, Some(ratio(1, 1)));
        assert_eq!(report.final_high, ratio(1, 1));
        let predecessor = below_family(&(ratio(1, 1) - report.resolution.clone()))?;
        assert!(!verifier.verify(&predecessor)?.is_proved());
        Ok(())
    }
}
