//! Universally quantified claims over real variables.
//!
//! A [`Claim`] states that `property` holds for every assignment of its
//! variables that satisfies the domain constraints. Claims are only created
//! through [`ClaimBuilder::build`], which rejects encodings that could divide
//! by zero or reference undeclared variables.

use std::collections::BTreeSet;

use num::traits::{Signed, Zero};
use thiserror::Error;

use heron_smt::backends::smtlib_printer::to_smtlib_script;
use heron_smt::sorts::SmtSort;
use heron_smt::terms::SmtTerm;

use crate::encoder::{Seed, MAX_ITERATIONS};
use crate::witness::RecurrenceProbe;

/// Construction-time encoding errors. These indicate a malformed claim, not a
/// verification outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("variable `{0}` is declared more than once")]
    DuplicateVariable(String),
    #[error("variable `{0}` is used but not declared")]
    UndeclaredVariable(String),
    #[error("division by the literal zero in `{0}`")]
    DivisionByZero(String),
    #[error("denominator `{0}` is not provably positive under the domain constraints")]
    UnguardedDenominator(String),
    #[error("seed `{0}` must be positive")]
    NonPositiveSeed(String),
    #[error("`{0}` is not a formula")]
    NotAFormula(String),
    #[error("claim `{0}` has no property")]
    MissingProperty(String),
    #[error("claims `{0}` and `{1}` do not share a domain")]
    MismatchedDomains(String, String),
    #[error("{requested} iterations requested, at most {max} can be encoded")]
    TooManyIterations { requested: usize, max: usize },
    #[error("factor `{0}` must not be negative")]
    NegativeFactor(String),
}

/// Reject iteration counts whose encoding would be too large to build.
pub fn check_iterations(iterations: usize) -> Result<(), EncodingError> {
    if iterations > MAX_ITERATIONS {
        return Err(EncodingError::TooManyIterations {
            requested: iterations,
            max: MAX_ITERATIONS,
        });
    }
    Ok(())
}

/// Declared variables plus the constraints restricting them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain {
    pub variables: Vec<String>,
    pub constraints: Vec<SmtTerm>,
}

impl Domain {
    /// `(name, sort)` pairs for model extraction. All claim variables are real.
    pub fn var_sorts(&self) -> Vec<(&str, &'static SmtSort)> {
        self.variables
            .iter()
            .map(|v| (v.as_str(), &SmtSort::Real))
            .collect()
    }

    /// Variables bounded below by a non-negative constant through a strict
    /// top-level domain constraint (`v > k` or `k < v` with `k >= 0`, or
    /// `v >= k` with `k > 0`).
    pub fn positive_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for constraint in &self.constraints {
            collect_positive_guards(constraint, &mut out);
        }
        out
    }
}

fn collect_positive_guards(term: &SmtTerm, out: &mut BTreeSet<String>) {
    match term {
        SmtTerm::And(terms) => {
            for t in terms {
                collect_positive_guards(t, out);
            }
        }
        SmtTerm::Gt(l, r) | SmtTerm::Lt(r, l) => {
            if let (SmtTerm::Var(name), Some(k)) = (l.as_ref(), literal_sign(r)) {
                if k >= 0 {
                    out.insert(name.clone());
                }
            }
        }
        SmtTerm::Ge(l, r) | SmtTerm::Le(r, l) => {
            if let (SmtTerm::Var(name), Some(k)) = (l.as_ref(), literal_sign(r)) {
                if k > 0 {
                    out.insert(name.clone());
                }
            }
        }
        _ => {}
    }
}

/// Sign (-1, 0, 1) of a numeric literal.
fn literal_sign(term: &SmtTerm) -> Option<i8> {
    match term {
        SmtTerm::IntLit(n) => Some(n.signum() as i8),
        SmtTerm::RealLit(r) if r.is_zero() => Some(0),
        SmtTerm::RealLit(r) => Some(if r.is_positive() { 1 } else { -1 }),
        SmtTerm::Neg(inner) => literal_sign(inner).map(|s| -s),
        _ => None,
    }
}

/// Positive literals, guarded variables, and sums, products and quotients
/// of such terms.
fn provably_positive(term: &SmtTerm, guarded: &BTreeSet<String>) -> bool {
    match term {
        SmtTerm::Var(name) => guarded.contains(name),
        SmtTerm::IntLit(_) | SmtTerm::RealLit(_) => literal_sign(term) == Some(1),
        SmtTerm::Add(l, r) | SmtTerm::Mul(l, r) | SmtTerm::Div(l, r) => {
            provably_positive(l, guarded) && provably_positive(r, guarded)
        }
        _ => false,
    }
}

fn check_denominators(term: &SmtTerm, guarded: &BTreeSet<String>) -> Result<(), EncodingError> {
    if let SmtTerm::Div(_, denom) = term {
        if literal_sign(denom) == Some(0) {
            return Err(EncodingError::DivisionByZero(term.to_string()));
        }
        if literal_sign(denom).is_none() && !provably_positive(denom, guarded) {
            return Err(EncodingError::UnguardedDenominator(denom.to_string()));
        }
    }
    for child in term.children() {
        check_denominators(child, guarded)?;
    }
    Ok(())
}

/// A validated universal claim.
#[derive(Debug, Clone, PartialEq)]
pub struct Claim {
    pub name: String,
    pub domain: Domain,
    pub property: SmtTerm,
    /// Recurrences to re-evaluate numerically when the claim is refuted.
    pub probes: Vec<RecurrenceProbe>,
}

impl Claim {
    pub fn builder(name: impl Into<String>) -> ClaimBuilder {
        ClaimBuilder::new(name)
    }

    /// The formula whose satisfiability refutes the claim.
    pub fn negated_property(&self) -> SmtTerm {
        self.property.clone().negate()
    }

    /// The refutation query as a standalone SMT-LIB2 script.
    pub fn to_smtlib_script(&self) -> String {
        let mut assertions = self.domain.constraints.clone();
        assertions.push(self.negated_property());
        to_smtlib_script(&self.domain.var_sorts(), &assertions)
    }
}

/// Incremental construction of a [`Claim`].
#[derive(Debug, Clone)]
pub struct ClaimBuilder {
    name: String,
    domain: Domain,
    property: Option<SmtTerm>,
    probes: Vec<RecurrenceProbe>,
}

impl ClaimBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            domain: Domain::default(),
            property: None,
            probes: Vec::new(),
        }
    }

    /// Declare a real variable.
    pub fn real(mut self, name: impl Into<String>) -> Self {
        self.domain.variables.push(name.into());
        self
    }

    /// Add a domain constraint.
    pub fn assume(mut self, constraint: SmtTerm) -> Self {
        self.domain.constraints.push(constraint);
        self
    }

    /// Declare `root` and constrain it to the positive square root of `of`.
    pub fn sqrt(self, root: &str, of: &str) -> Self {
        self.real(root)
            .assume(SmtTerm::var(root).square().eq(SmtTerm::var(of)))
            .assume(SmtTerm::var(root).gt(SmtTerm::rational(0, 1)))
    }

    /// The proposition that must hold on the whole domain.
    pub fn property(mut self, property: SmtTerm) -> Self {
        self.property = Some(property);
        self
    }

    pub fn probe(mut self, probe: RecurrenceProbe) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn build(self) -> Result<Claim, EncodingError> {
        let mut declared = BTreeSet::new();
        for v in &self.domain.variables {
            if !declared.insert(v.clone()) {
                return Err(EncodingError::DuplicateVariable(v.clone()));
            }
        }
        let property = self
            .property
            .ok_or_else(|| EncodingError::MissingProperty(self.name.clone()))?;

        let guarded = self.domain.positive_vars();
        for term in self.domain.constraints.iter().chain(std::iter::once(&property)) {
            if !term.is_formula() {
                return Err(EncodingError::NotAFormula(term.to_string()));
            }
            if let Some(undeclared) = term.free_vars().difference(&declared).next() {
                return Err(EncodingError::UndeclaredVariable(undeclared.clone()));
            }
            check_denominators(term, &guarded)?;
        }

        for probe in &self.probes {
            check_probe(probe, &declared, &guarded)?;
        }

        Ok(Claim {
            name: self.name,
            domain: self.domain,
            property,
            probes: self.probes,
        })
    }
}

fn check_probe(
    probe: &RecurrenceProbe,
    declared: &BTreeSet<String>,
    guarded: &BTreeSet<String>,
) -> Result<(), EncodingError> {
    check_iterations(probe.iterations)?;
    if !declared.contains(&probe.target_var) {
        return Err(EncodingError::UndeclaredVariable(probe.target_var.clone()));
    }
    if !guarded.contains(&probe.target_var) {
        return Err(EncodingError::UnguardedDenominator(probe.target_var.clone()));
    }
    match &probe.seed {
        Seed::Const(value) if !value.is_positive() => {
            Err(EncodingError::NonPositiveSeed(value.to_string()))
        }
        Seed::Const(_) => Ok(()),
        Seed::Var(name) if !declared.contains(name) => {
            Err(EncodingError::UndeclaredVariable(name.clone()))
        }
        Seed::Var(name) if !guarded.contains(name) => {
            Err(EncodingError::NonPositiveSeed(name.clone()))
        }
        Seed::Var(_) => Ok(()),
    }
}
