use std::collections::BTreeSet;
use std::fmt;

use num::bigint::BigInt;
use num::rational::BigRational;

/// Abstract SMT term representation, solver-agnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtTerm {
    /// Variable reference by name.
    Var(String),
    /// Integer literal.
    IntLit(i64),
    /// Exact rational literal.
    RealLit(BigRational),
    /// Boolean literal.
    BoolLit(bool),

    // Arithmetic
    Add(Box<SmtTerm>, Box<SmtTerm>),
    Sub(Box<SmtTerm>, Box<SmtTerm>),
    Mul(Box<SmtTerm>, Box<SmtTerm>),
    /// Real division. Backends assume the denominator is nonzero.
    Div(Box<SmtTerm>, Box<SmtTerm>),
    Neg(Box<SmtTerm>),

    // Comparison
    Eq(Box<SmtTerm>, Box<SmtTerm>),
    Lt(Box<SmtTerm>, Box<SmtTerm>),
    Le(Box<SmtTerm>, Box<SmtTerm>),
    Gt(Box<SmtTerm>, Box<SmtTerm>),
    Ge(Box<SmtTerm>, Box<SmtTerm>),

    // Boolean logic
    And(Vec<SmtTerm>),
    Or(Vec<SmtTerm>),
    Not(Box<SmtTerm>),
    Implies(Box<SmtTerm>, Box<SmtTerm>),

    // If-then-else
    Ite(Box<SmtTerm>, Box<SmtTerm>, Box<SmtTerm>),
}

#[allow(clippy::should_implement_trait)]
impl SmtTerm {
    pub fn var(name: impl Into<String>) -> Self {
        SmtTerm::Var(name.into())
    }

    pub fn int(n: i64) -> Self {
        SmtTerm::IntLit(n)
    }

    pub fn real(value: BigRational) -> Self {
        SmtTerm::RealLit(value)
    }

    /// Rational literal `num/den`.
    ///
    /// # Panics
    ///
    /// Panics if `den` is zero.
    pub fn rational(num: i64, den: i64) -> Self {
        SmtTerm::RealLit(BigRational::new(BigInt::from(num), BigInt::from(den)))
    }

    pub fn bool(b: bool) -> Self {
        SmtTerm::BoolLit(b)
    }

    pub fn add(self, other: SmtTerm) -> Self {
        SmtTerm::Add(Box::new(self), Box::new(other))
    }

    pub fn sub(self, other: SmtTerm) -> Self {
        SmtTerm::Sub(Box::new(self), Box::new(other))
    }

    pub fn mul(self, other: SmtTerm) -> Self {
        SmtTerm::Mul(Box::new(self), Box::new(other))
    }

    pub fn div(self, other: SmtTerm) -> Self {
        SmtTerm::Div(Box::new(self), Box::new(other))
    }

    pub fn neg(self) -> Self {
        SmtTerm::Neg(Box::new(self))
    }

    /// `self * self`.
    pub fn square(self) -> Self {
        self.clone().mul(self)
    }

    pub fn eq(self, other: SmtTerm) -> Self {
        SmtTerm::Eq(Box::new(self), Box::new(other))
    }

    pub fn lt(self, other: SmtTerm) -> Self {
        SmtTerm::Lt(Box::new(self), Box::new(other))
    }

    pub fn le(self, other: SmtTerm) -> Self {
        SmtTerm::Le(Box::new(self), Box::new(other))
    }

    pub fn gt(self, other: SmtTerm) -> Self {
        SmtTerm::Gt(Box::new(self), Box::new(other))
    }

    pub fn ge(self, other: SmtTerm) -> Self {
        SmtTerm::Ge(Box::new(self), Box::new(other))
    }

    /// Arithmetic disequality as `self < other ∨ self > other`.
    pub fn distinct(self, other: SmtTerm) -> Self {
        SmtTerm::or(vec![self.clone().lt(other.clone()), self.gt(other)])
    }

    pub fn and(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::And(terms)
    }

    pub fn or(terms: Vec<SmtTerm>) -> Self {
        SmtTerm::Or(terms)
    }

    pub fn not(self) -> Self {
        SmtTerm::Not(Box::new(self))
    }

    pub fn implies(self, other: SmtTerm) -> Self {
        SmtTerm::Implies(Box::new(self), Box::new(other))
    }

    pub fn ite(cond: SmtTerm, then: SmtTerm, els: SmtTerm) -> Self {
        SmtTerm::Ite(Box::new(cond), Box::new(then), Box::new(els))
    }

    /// Logical negation pushed through comparisons and connectives.
    ///
    /// Order comparisons flip to their complement (`a < b` becomes `a >= b`),
    /// conjunctions and disjunctions swap by De Morgan, and double negation
    /// cancels. Equalities and other shapes are wrapped in `Not`.
    pub fn negate(self) -> Self {
        match self {
            SmtTerm::BoolLit(b) => SmtTerm::BoolLit(!b),
            SmtTerm::Lt(l, r) => SmtTerm::Ge(l, r),
            SmtTerm::Le(l, r) => SmtTerm::Gt(l, r),
            SmtTerm::Gt(l, r) => SmtTerm::Le(l, r),
            SmtTerm::Ge(l, r) => SmtTerm::Lt(l, r),
            SmtTerm::And(terms) => SmtTerm::Or(terms.into_iter().map(SmtTerm::negate).collect()),
            SmtTerm::Or(terms) => SmtTerm::And(terms.into_iter().map(SmtTerm::negate).collect()),
            SmtTerm::Not(inner) => *inner,
            SmtTerm::Implies(l, r) => SmtTerm::And(vec![*l, r.negate()]),
            other => SmtTerm::Not(Box::new(other)),
        }
    }

    /// True for terms whose value is a truth value.
    pub fn is_formula(&self) -> bool {
        match self {
            SmtTerm::BoolLit(_)
            | SmtTerm::Eq(..)
            | SmtTerm::Lt(..)
            | SmtTerm::Le(..)
            | SmtTerm::Gt(..)
            | SmtTerm::Ge(..)
            | SmtTerm::And(_)
            | SmtTerm::Or(_)
            | SmtTerm::Not(_)
            | SmtTerm::Implies(..) => true,
            SmtTerm::Ite(_, then, _) => then.is_formula(),
            // Boolean variables are indistinguishable here; callers that
            // declare them know their sort.
            _ => false,
        }
    }

    /// Direct subterms, left to right.
    pub fn children(&self) -> Vec<&SmtTerm> {
        match self {
            SmtTerm::Var(_) | SmtTerm::IntLit(_) | SmtTerm::RealLit(_) | SmtTerm::BoolLit(_) => {
                Vec::new()
            }
            SmtTerm::Neg(inner) | SmtTerm::Not(inner) => vec![inner.as_ref()],
            SmtTerm::Add(l, r)
            | SmtTerm::Sub(l, r)
            | SmtTerm::Mul(l, r)
            | SmtTerm::Div(l, r)
            | SmtTerm::Eq(l, r)
            | SmtTerm::Lt(l, r)
            | SmtTerm::Le(l, r)
            | SmtTerm::Gt(l, r)
            | SmtTerm::Ge(l, r)
            | SmtTerm::Implies(l, r) => vec![l.as_ref(), r.as_ref()],
            SmtTerm::And(terms) | SmtTerm::Or(terms) => terms.iter().collect(),
            SmtTerm::Ite(c, t, e) => vec![c.as_ref(), t.as_ref(), e.as_ref()],
        }
    }

    /// Names of all variables occurring in the term.
    pub fn free_vars(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_vars(&mut out);
        out
    }

    fn collect_vars(&self, out: &mut BTreeSet<String>) {
        if let SmtTerm::Var(name) = self {
            out.insert(name.clone());
        }
        for child in self.children() {
            child.collect_vars(out);
        }
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        1 + self
            .children()
            .into_iter()
            .map(SmtTerm::node_count)
            .sum::<usize>()
    }
}

impl fmt::Display for SmtTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::backends::smtlib_printer::to_smtlib(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negate_flips_order_comparisons() {
        let x = SmtTerm::var("x");
        let one = SmtTerm::int(1);
        assert_eq!(
            x.clone().lt(one.clone()).negate(),
            x.clone().ge(one.clone())
        );
        assert_eq!(
            x.clone().le(one.clone()).negate(),
            x.clone().gt(one.clone())
        );
        assert_eq!(
            x.clone().gt(one.clone()).negate(),
            x.clone().le(one.clone())
        );
        assert_eq!(x.clone().ge(one.clone()).negate(), x.lt(one));
    }

    #[test]
    fn negate_two_sided_bound_yields_disjunction() {
        let d = SmtTerm::var("d");
        let eps = SmtTerm::rational(1, 100);
        let bound = SmtTerm::and(vec![
            d.clone().lt(eps.clone()),
            d.clone().gt(eps.clone().neg()),
        ]);
        assert_eq!(
            bound.negate(),
            SmtTerm::or(vec![d.clone().ge(eps.clone()), d.le(eps.neg())])
        );
    }

    #[test]
    fn negate_cancels_double_negation_and_wraps_equalities() {
        let eq = SmtTerm::var("a").eq(SmtTerm::var("b"));
        assert_eq!(eq.clone().negate(), eq.clone().not());
        assert_eq!(eq.clone().not().negate(), eq);
        assert_eq!(SmtTerm::bool(true).negate(), SmtTerm::bool(false));
    }

    #[test]
    fn negate_implication_is_premise_and_negated_conclusion() {
        let p = SmtTerm::var("x").gt(SmtTerm::int(0));
        let q = SmtTerm::var("y").gt(SmtTerm::int(0));
        assert_eq!(
            p.clone().implies(q.clone()).negate(),
            SmtTerm::and(vec![p, SmtTerm::var("y").le(SmtTerm::int(0))])
        );
    }

    #[test]
    fn distinct_is_strict_disjunction() {
        let t = SmtTerm::var("b").distinct(SmtTerm::var("s"));
        assert_eq!(
            t,
            SmtTerm::or(vec![
                SmtTerm::var("b").lt(SmtTerm::var("s")),
                SmtTerm::var("b").gt(SmtTerm::var("s")),
            ])
        );
    }

    #[test]
    fn free_vars_and_node_count() {
        let t = SmtTerm::var("x")
            .div(SmtTerm::var("b"))
            .add(SmtTerm::var("b"))
            .div(SmtTerm::rational(2, 1));
        let vars: Vec<String> = t.free_vars().into_iter().collect();
        assert_eq!(vars, vec!["b".to_string(), "x".to_string()]);
        assert_eq!(t.node_count(), 7);
    }

    #[test]
    fn rational_literals_are_normalized() {
        assert_eq!(SmtTerm::rational(2, 4), SmtTerm::rational(1, 2));
    }

    #[test]
    fn formula_shape_detection() {
        assert!(SmtTerm::var("x").lt(SmtTerm::int(0)).is_formula());
        assert!(SmtTerm::and(vec![]).is_formula());
        assert!(!SmtTerm::var("x").add(SmtTerm::int(1)).is_formula());
        assert!(!SmtTerm::rational(1, 3).is_formula());
    }
}
