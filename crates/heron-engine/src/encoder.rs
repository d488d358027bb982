//! Symbolic encoding of the Heron recurrence `next = (target/current + current) / 2`.

use num::rational::BigRational;
use num::traits::ToPrimitive;

use heron_smt::terms::SmtTerm;

/// Starting value of the recurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seed {
    /// A fixed rational seed such as `1`.
    Const(BigRational),
    /// A free variable of the claim.
    Var(String),
}

impl Seed {
    pub fn constant(n: i64) -> Self {
        Seed::Const(BigRational::from_integer(n.into()))
    }

    pub fn var(name: impl Into<String>) -> Self {
        Seed::Var(name.into())
    }

    pub fn to_term(&self) -> SmtTerm {
        match self {
            Seed::Const(value) => SmtTerm::real(value.clone()),
            Seed::Var(name) => SmtTerm::var(name.clone()),
        }
    }
}

impl std::fmt::Display for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Seed::Const(value) => write!(f, "{value}"),
            Seed::Var(name) => write!(f, "{name}"),
        }
    }
}

/// Largest iteration count a claim may encode. Iterates are plain trees, so
/// each step doubles the size of the term.
pub const MAX_ITERATIONS: usize = 16;

/// One application of the update rule.
pub fn heron_step(target: &SmtTerm, current: SmtTerm) -> SmtTerm {
    target
        .clone()
        .div(current.clone())
        .add(current)
        .div(SmtTerm::rational(2, 1))
}

/// `iterations` applications of the update rule starting from `seed`.
///
/// Every step builds a fresh node over the previous iterate; zero
/// iterations return the seed unchanged.
pub fn heron_iterate(target: &SmtTerm, seed: &SmtTerm, iterations: usize) -> SmtTerm {
    (0..iterations).fold(seed.clone(), |current, _| heron_step(target, current))
}

/// `(iterate - root)^2`, the error of an iterate without an absolute value.
pub fn squared_error(iterate: SmtTerm, root: SmtTerm) -> SmtTerm {
    iterate.sub(root).square()
}

/// The recurrence in ordinary floating point.
pub fn heron_f64(target: f64, seed: f64, iterations: usize) -> f64 {
    (0..iterations).fold(seed, |current, _| (target / current + current) / 2.0)
}

/// Floating-point view of a constant seed; `None` for symbolic seeds.
pub fn seed_f64(seed: &Seed) -> Option<f64> {
    match seed {
        Seed::Const(value) => value.to_f64(),
        Seed::Var(_) => None,
    }
}
