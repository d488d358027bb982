//! Claim verification by existential negation.
//!
//! A universal claim holds on its domain exactly when "domain and not
//! property" is unsatisfiable. Each verification runs in its own scoped
//! session on a freshly constructed backend: the variables are declared,
//! the domain and the negated property are asserted inside a scope, the
//! solver is asked once, and the scope is popped on every exit path.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use heron_smt::backends::cvc5_backend::Cvc5Solver;
use heron_smt::backends::z3_backend::Z3Solver;
use heron_smt::solver::{SatResult, SmtSolver};
use heron_smt::sorts::SmtSort;

use crate::claim::{Claim, Domain, EncodingError};
use crate::witness::Witness;

/// Which solver backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverChoice {
    #[default]
    Z3,
    Cvc5,
}

impl SolverChoice {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "z3" => Some(SolverChoice::Z3),
            "cvc5" => Some(SolverChoice::Cvc5),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SolverChoice::Z3 => "z3",
            SolverChoice::Cvc5 => "cvc5",
        }
    }
}

/// Per-session solver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerifierConfig {
    pub solver: SolverChoice,
    /// `None` or `Some(0)` disables the limit.
    pub timeout_ms: Option<u64>,
}

impl VerifierConfig {
    pub fn with_timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    fn effective_timeout_ms(&self) -> Option<u64> {
        self.timeout_ms.filter(|ms| *ms > 0)
    }
}

/// Outcome of verifying one claim.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The negated claim is unsatisfiable on the domain.
    Proved,
    /// The solver found an assignment violating the claim.
    Refuted(Witness),
    /// The solver gave up, usually on a timeout.
    Indeterminate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Proved,
    Refuted,
    Indeterminate,
}

impl Verdict {
    pub fn kind(&self) -> VerdictKind {
        match self {
            Verdict::Proved => VerdictKind::Proved,
            Verdict::Refuted(_) => VerdictKind::Refuted,
            Verdict::Indeterminate(_) => VerdictKind::Indeterminate,
        }
    }

    pub fn is_proved(&self) -> bool {
        matches!(self, Verdict::Proved)
    }

    pub fn witness(&self) -> Option<&Witness> {
        match self {
            Verdict::Refuted(w) => Some(w),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Proved => write!(f, "proved"),
            Verdict::Refuted(_) => write!(f, "refuted"),
            Verdict::Indeterminate(reason) => write!(f, "indeterminate ({reason})"),
        }
    }
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Solver error: {0}")]
    Backend(String),
    #[error("Invalid search: {0}")]
    InvalidSearch(String),
}

fn backend_error(e: impl std::error::Error) -> VerifyError {
    VerifyError::Backend(e.to_string())
}

fn spawn_cvc5(timeout_ms: Option<u64>) -> Result<Cvc5Solver, VerifyError> {
    Cvc5Solver::with_command_and_timeout("cvc5", timeout_ms).map_err(backend_error)
}

/// A solver scope that is popped when the guard goes out of scope.
///
/// [`ScopedSession::close`] pops explicitly and reports a failing pop; the
/// `Drop` impl covers early returns and can only log.
pub struct ScopedSession<'a, S: SmtSolver> {
    solver: &'a mut S,
    open: bool,
}

impl<'a, S: SmtSolver> ScopedSession<'a, S> {
    pub fn open(solver: &'a mut S) -> Result<Self, S::Error> {
        solver.push()?;
        debug!("solver scope pushed");
        Ok(Self { solver, open: true })
    }

    pub fn solver(&mut self) -> &mut S {
        self.solver
    }

    pub fn close(mut self) -> Result<(), S::Error> {
        self.open = false;
        self.solver.pop()?;
        debug!("solver scope popped");
        Ok(())
    }
}

impl<S: SmtSolver> Drop for ScopedSession<'_, S> {
    fn drop(&mut self) {
        if self.open {
            match self.solver.pop() {
                Ok(()) => debug!("solver scope popped on early exit"),
                Err(e) => warn!("failed to pop solver scope: {e}"),
            }
        }
    }
}

fn declare_domain<S: SmtSolver>(solver: &mut S, domain: &Domain) -> Result<(), S::Error> {
    for var in &domain.variables {
        solver.declare_var(var, &SmtSort::Real)?;
    }
    debug!(variables = domain.variables.len(), "declared claim variables");
    for constraint in &domain.constraints {
        solver.assert(constraint)?;
    }
    Ok(())
}

/// Assert the negated property and classify the single check.
fn check_negation<S: SmtSolver>(solver: &mut S, claim: &Claim) -> Result<Verdict, VerifyError> {
    solver
        .assert(&claim.negated_property())
        .map_err(backend_error)?;
    let (result, model) = solver
        .check_sat_with_model(&claim.domain.var_sorts())
        .map_err(backend_error)?;
    let verdict = match (result, model) {
        (SatResult::Unsat, _) => Verdict::Proved,
        (SatResult::Sat, Some(model)) => Verdict::Refuted(Witness::new(model)),
        (SatResult::Sat, None) => {
            return Err(VerifyError::Backend(format!(
                "solver reported sat for `{}` without a model",
                claim.name
            )))
        }
        (SatResult::Unknown(reason), _) => Verdict::Indeterminate(reason),
    };
    debug!(claim = %claim.name, verdict = %verdict, "check complete");
    Ok(verdict)
}

/// Verify `claim` on an already constructed backend.
pub fn verify_in_session<S: SmtSolver>(
    solver: &mut S,
    claim: &Claim,
    timeout_ms: Option<u64>,
) -> Result<Verdict, VerifyError> {
    if let Some(ms) = timeout_ms {
        solver.set_timeout_ms(ms).map_err(backend_error)?;
    }
    let mut session = ScopedSession::open(solver).map_err(backend_error)?;
    declare_domain(session.solver(), &claim.domain).map_err(backend_error)?;
    let verdict = check_negation(session.solver(), claim)?;
    session.close().map_err(backend_error)?;
    Ok(verdict)
}

/// Check `claims` in order under their shared domain, moving on to the next
/// claim only while the previous one is `Refuted`. The domain is declared
/// once; each claim gets its own nested scope.
pub fn alternatives_in_session<S: SmtSolver>(
    solver: &mut S,
    claims: &[Claim],
    timeout_ms: Option<u64>,
) -> Result<Vec<Verdict>, VerifyError> {
    let Some(first) = claims.first() else {
        return Ok(Vec::new());
    };
    if let Some(ms) = timeout_ms {
        solver.set_timeout_ms(ms).map_err(backend_error)?;
    }
    let mut outer = ScopedSession::open(solver).map_err(backend_error)?;
    declare_domain(outer.solver(), &first.domain).map_err(backend_error)?;

    let mut verdicts = Vec::with_capacity(claims.len());
    for claim in claims {
        let mut inner = ScopedSession::open(outer.solver()).map_err(backend_error)?;
        let verdict = check_negation(inner.solver(), claim)?;
        inner.close().map_err(backend_error)?;
        let refuted = matches!(verdict, Verdict::Refuted(_));
        verdicts.push(verdict);
        if !refuted {
            break;
        }
    }
    outer.close().map_err(backend_error)?;
    Ok(verdicts)
}

/// Anything that can decide a claim. The refiner is generic over this.
pub trait ClaimChecker {
    fn check(&self, claim: &Claim) -> Result<Verdict, VerifyError>;
}

/// Runs each verification on a fresh backend chosen by [`VerifierConfig`].
#[derive(Debug, Clone, Default)]
pub struct Verifier {
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn verify(&self, claim: &Claim) -> Result<Verdict, VerifyError> {
        let timeout = self.config.effective_timeout_ms();
        let verdict = match self.config.solver {
            SolverChoice::Z3 => {
                let mut solver = Z3Solver::new();
                verify_in_session(&mut solver, claim, timeout)?
            }
            SolverChoice::Cvc5 => {
                // cvc5 takes its limit at spawn time.
                let mut solver = spawn_cvc5(timeout)?;
                verify_in_session(&mut solver, claim, None)?
            }
        };
        info!(claim = %claim.name, solver = self.config.solver.name(), "{verdict}");
        Ok(verdict)
    }

    /// See [`alternatives_in_session`]. All claims must share one domain.
    pub fn verify_alternatives(&self, claims: &[Claim]) -> Result<Vec<Verdict>, VerifyError> {
        if let Some(first) = claims.first() {
            if let Some(other) = claims.iter().find(|c| c.domain != first.domain) {
                return Err(EncodingError::MismatchedDomains(
                    first.name.clone(),
                    other.name.clone(),
                )
                .into());
            }
        }
        let timeout = self.config.effective_timeout_ms();
        let verdicts = match self.config.solver {
            SolverChoice::Z3 => {
                let mut solver = Z3Solver::new();
                alternatives_in_session(&mut solver, claims, timeout)?
            }
            SolverChoice::Cvc5 => {
                let mut solver = spawn_cvc5(timeout)?;
                alternatives_in_session(&mut solver, claims, None)?
            }
        };
        for (claim, verdict) in claims.iter().zip(&verdicts) {
            info!(claim = %claim.name, solver = self.config.solver.name(), "{verdict}");
        }
        Ok(verdicts)
    }
}

impl ClaimChecker for Verifier {
    fn check(&self, claim: &Claim) -> Result<Verdict, VerifyError> {
        self.verify(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heron_smt::solver::{Model, ModelValue};
    use heron_smt::terms::SmtTerm;
    use std::collections::HashMap;
    use std::io;

    /// Records the call sequence and answers a scripted result.
    struct MockSolver {
        answers: Vec<SatResult>,
        depth: usize,
        max_depth: usize,
        asserted: Vec<SmtTerm>,
        declared: Vec<String>,
        timeout_ms: Option<u64>,
        fail_on_check: bool,
        omit_model: bool,
    }

    impl MockSolver {
        fn new(answers: Vec<SatResult>) -> Self {
            Self {
                answers,
                depth: 0,
                max_depth: 0,
                asserted: Vec::new(),
                declared: Vec::new(),
                timeout_ms: None,
                fail_on_check: false,
                omit_model: false,
            }
        }
    }

    impl SmtSolver for MockSolver {
        type Error = io::Error;

        fn declare_var(&mut self, name: &str, _sort: &SmtSort) -> Result<(), Self::Error> {
            self.declared.push(name.to_string());
            Ok(())
        }

        fn assert(&mut self, term: &SmtTerm) -> Result<(), Self::Error> {
            self.asserted.push(term.clone());
            Ok(())
        }

        fn push(&mut self) -> Result<(), Self::Error> {
            self.depth += 1;
            self.max_depth = self.max_depth.max(self.depth);
            Ok(())
        }

        fn pop(&mut self) -> Result<(), Self::Error> {
            self.depth -= 1;
            Ok(())
        }

        fn set_timeout_ms(&mut self, timeout_ms: u64) -> Result<(), Self::Error> {
            self.timeout_ms = Some(timeout_ms);
            Ok(())
        }

        fn check_sat(&mut self) -> Result<SatResult, Self::Error> {
            if self.fail_on_check {
                return Err(io::Error::other("backend crashed"));
            }
            Ok(self.answers.remove(0))
        }

        fn check_sat_with_model(
            &mut self,
            var_names: &[(&str, &SmtSort)],
        ) -> Result<(SatResult, Option<Model>), Self::Error> {
            let result = self.check_sat()?;
            let model = (result == SatResult::Sat && !self.omit_model).then(|| Model {
                values: var_names
                    .iter()
                    .map(|(n, _)| (n.to_string(), ModelValue::Int(1)))
                    .collect::<HashMap<_, _>>(),
            });
            Ok((result, model))
        }

        fn reset(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn sample_claim(name: &str, bound: i64) -> Claim {
        Claim::builder(name)
            .real("x")
            .assume(SmtTerm::var("x").gt(SmtTerm::rational(0, 1)))
            .property(SmtTerm::var("x").lt(SmtTerm::rational(bound, 1)))
            .build()
            .expect("sample claim should build")
    }

    #[test]
    fn unsat_negation_is_proved_and_scope_is_released() {
        let mut solver = MockSolver::new(vec![SatResult::Unsat]);
        let claim = sample_claim("c", 1);
        let verdict = verify_in_session(&mut solver, &claim, Some(500)).expect("mock check");
        assert_eq!(verdict, Verdict::Proved);
        assert_eq!(solver.depth, 0);
        assert_eq!(solver.timeout_ms, Some(500));
        assert_eq!(solver.declared, vec!["x"]);
        // Domain first, then the negation of x < 1.
        assert_eq!(
            solver.asserted.last(),
            Some(&SmtTerm::var("x").ge(SmtTerm::rational(1, 1)))
        );
    }

    #[test]
    fn sat_negation_is_refuted_with_model() {
        let mut solver = MockSolver::new(vec![SatResult::Sat]);
        let verdict =
            verify_in_session(&mut solver, &sample_claim("c", 1), None).expect("mock check");
        let witness = verdict.witness().expect("refuted verdict carries a witness");
        assert_eq!(witness.value("x"), Some(&ModelValue::Int(1)));
        assert_eq!(solver.depth, 0);
        assert_eq!(solver.timeout_ms, None);
    }

    #[test]
    fn unknown_is_indeterminate_and_scope_is_released() {
        let mut solver = MockSolver::new(vec![SatResult::Unknown("timeout".into())]);
        let verdict =
            verify_in_session(&mut solver, &sample_claim("c", 1), Some(1)).expect("mock check");
        assert_eq!(verdict, Verdict::Indeterminate("timeout".into()));
        assert_eq!(verdict.kind(), VerdictKind::Indeterminate);
        assert_eq!(solver.depth, 0);
    }

    #[test]
    fn backend_failure_still_pops_scope() {
        let mut solver = MockSolver::new(Vec::new());
        solver.fail_on_check = true;
        let result = verify_in_session(&mut solver, &sample_claim("c", 1), None);
        assert!(result.is_err());
        assert_eq!(solver.depth, 0, "guard must pop on the error path");
        assert_eq!(solver.max_depth, 1);
    }

    #[test]
    fn sat_without_model_is_a_backend_error() {
        let mut solver = MockSolver::new(vec![SatResult::Sat]);
        solver.omit_model = true;
        let err = verify_in_session(&mut solver, &sample_claim("c", 1), None).unwrap_err();
        assert!(matches!(err, VerifyError::Backend(msg) if msg.contains("without a model")));
        assert_eq!(solver.depth, 0);
    }

    #[test]
    fn alternatives_continue_past_refutations_until_proof() {
        let mut solver = MockSolver::new(vec![SatResult::Sat, SatResult::Unsat, SatResult::Sat]);
        let claims = vec![
            sample_claim("a", 1),
            sample_claim("b", 2),
            sample_claim("c", 3),
        ];
        let verdicts = alternatives_in_session(&mut solver, &claims, None).expect("mock check");
        assert_eq!(verdicts.len(), 2);
        assert_eq!(verdicts[0].kind(), VerdictKind::Refuted);
        assert_eq!(verdicts[1], Verdict::Proved);
        assert_eq!(solver.depth, 0);
        assert_eq!(solver.max_depth, 2);
        assert_eq!(solver.declared, vec!["x"], "domain is declared once");
    }

    #[test]
    fn alternatives_stop_at_indeterminate() {
        let mut solver = MockSolver::new(vec![SatResult::Unknown("timeout".into())]);
        let claims = vec![sample_claim("a", 1), sample_claim("b", 2)];
        let verdicts = alternatives_in_session(&mut solver, &claims, Some(10)).expect("mock check");
        assert_eq!(verdicts, vec![Verdict::Indeterminate("timeout".into())]);
        assert_eq!(solver.depth, 0);
    }

    #[test]
    fn alternatives_require_a_shared_domain() {
        let a = sample_claim("a", 1);
        let b = Claim::builder("b")
            .real("y")
            .property(SmtTerm::bool(true))
            .build()
            .expect("claim should build");
        let err = Verifier::default()
            .verify_alternatives(&[a, b])
            .unwrap_err();
        assert!(matches!(
            err,
            VerifyError::Encoding(EncodingError::MismatchedDomains(..))
        ));
    }

    #[test]
    fn solver_choice_parsing() {
        assert_eq!(SolverChoice::parse("Z3"), Some(SolverChoice::Z3));
        assert_eq!(SolverChoice::parse(" cvc5 "), Some(SolverChoice::Cvc5));
        assert_eq!(SolverChoice::parse("yices"), None);
        assert_eq!(SolverChoice::Cvc5.name(), "cvc5");
    }

    #[test]
    fn zero_timeout_is_no_timeout() {
        let config = VerifierConfig::default().with_timeout_ms(Some(0));
        assert_eq!(config.effective_timeout_ms(), None);
        let config = config.with_timeout_ms(Some(30_000));
        assert_eq!(config.effective_timeout_ms(), Some(30_000));
    }
}
