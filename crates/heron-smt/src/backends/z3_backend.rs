use std::collections::HashMap;

use num::rational::BigRational;
use num::traits::{One, ToPrimitive};
use thiserror::Error;
use z3::SatResult as Z3SatResult;

use crate::backends::smtlib_printer::parse_real_value;
use crate::solver::{Model, ModelValue, SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Sort mismatch for variable {0}")]
    SortMismatch(String),
    #[error("Rational literal {0} does not fit a 64-bit numerator/denominator")]
    LiteralOutOfRange(String),
}

pub struct Z3Solver {
    solver: z3::Solver,
    int_vars: HashMap<String, z3::ast::Int>,
    real_vars: HashMap<String, z3::ast::Real>,
    bool_vars: HashMap<String, z3::ast::Bool>,
    params: Option<z3::Params>,
    timeout_ms: Option<u64>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            int_vars: HashMap::new(),
            real_vars: HashMap::new(),
            bool_vars: HashMap::new(),
            params: None,
            timeout_ms: None,
        }
    }

    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        let mut solver = Self::new();
        solver.apply_timeout(timeout_ms);
        solver
    }

    pub fn with_default_config() -> Self {
        Self::new()
    }

    /// Milliseconds currently configured, if any.
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    fn apply_timeout(&mut self, timeout_ms: u64) {
        if timeout_ms == 0 {
            // Z3 treats u32::MAX as "no limit".
            let mut params = z3::Params::new();
            params.set_u32("timeout", u32::MAX);
            self.solver.set_params(&params);
            self.params = None;
            self.timeout_ms = None;
            return;
        }
        let ms = u32::try_from(timeout_ms).unwrap_or(u32::MAX);
        let mut params = z3::Params::new();
        params.set_u32("timeout", ms);
        params.set_u32("solver2_timeout", ms);
        self.solver.set_params(&params);
        self.params = Some(params);
        self.timeout_ms = Some(timeout_ms);
    }

    fn real_literal(r: &BigRational) -> Result<z3::ast::Real, Z3Error> {
        let out_of_range = || Z3Error::LiteralOutOfRange(r.to_string());
        let numer = r.numer().to_i64().ok_or_else(out_of_range)?;
        let numer = z3::ast::Real::from_int(&z3::ast::Int::from_i64(numer));
        if r.denom().is_one() {
            return Ok(numer);
        }
        let denom = r.denom().to_i64().ok_or_else(out_of_range)?;
        let denom = z3::ast::Real::from_int(&z3::ast::Int::from_i64(denom));
        Ok(&numer / &denom)
    }

    fn translate_term(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => {
                if let Some(v) = self.real_vars.get(name) {
                    Ok(Z3Term::Real(v.clone()))
                } else if let Some(v) = self.int_vars.get(name) {
                    Ok(Z3Term::Int(v.clone()))
                } else if let Some(v) = self.bool_vars.get(name) {
                    Ok(Z3Term::Bool(v.clone()))
                } else {
                    Err(Z3Error::UnknownVariable(name.clone()))
                }
            }
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(z3::ast::Int::from_i64(*n))),
            SmtTerm::RealLit(r) => Ok(Z3Term::Real(Self::real_literal(r)?)),
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(z3::ast::Bool::from_bool(*b))),
            SmtTerm::Add(lhs, rhs) => self.arith(lhs, rhs, |l, r| l + r, |l, r| l + r),
            SmtTerm::Sub(lhs, rhs) => self.arith(lhs, rhs, |l, r| l - r, |l, r| l - r),
            SmtTerm::Mul(lhs, rhs) => self.arith(lhs, rhs, |l, r| l * r, |l, r| l * r),
            SmtTerm::Div(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_real()?;
                let r = self.translate_term(rhs)?.into_real()?;
                Ok(Z3Term::Real(&l / &r))
            }
            SmtTerm::Neg(inner) => match self.translate_term(inner)? {
                Z3Term::Int(i) => Ok(Z3Term::Int(&z3::ast::Int::from_i64(0) - &i)),
                Z3Term::Real(r) => {
                    let zero = z3::ast::Real::from_int(&z3::ast::Int::from_i64(0));
                    Ok(Z3Term::Real(&zero - &r))
                }
                Z3Term::Bool(_) => Err(Z3Error::Internal("Cannot negate a Bool".into())),
            },
            SmtTerm::Eq(lhs, rhs) => {
                let l = self.translate_term(lhs)?;
                let r = self.translate_term(rhs)?;
                match (l, r) {
                    (Z3Term::Int(li), Z3Term::Int(ri)) => Ok(Z3Term::Bool(li.eq(&ri))),
                    (Z3Term::Bool(lb), Z3Term::Bool(rb)) => Ok(Z3Term::Bool(lb.eq(&rb))),
                    (l @ (Z3Term::Int(_) | Z3Term::Real(_)), r) => {
                        let l = l.into_real()?;
                        let r = r.into_real()?;
                        Ok(Z3Term::Bool(l.eq(&r)))
                    }
                    _ => Err(Z3Error::Internal("Sort mismatch in Eq".into())),
                }
            }
            SmtTerm::Lt(lhs, rhs) => self.compare(lhs, rhs, |l, r| l.lt(r), |l, r| l.lt(r)),
            SmtTerm::Le(lhs, rhs) => self.compare(lhs, rhs, |l, r| l.le(r), |l, r| l.le(r)),
            SmtTerm::Gt(lhs, rhs) => self.compare(lhs, rhs, |l, r| l.gt(r), |l, r| l.gt(r)),
            SmtTerm::Ge(lhs, rhs) => self.compare(lhs, rhs, |l, r| l.ge(r), |l, r| l.ge(r)),
            SmtTerm::And(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&z3::ast::Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(z3::ast::Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
            SmtTerm::Implies(lhs, rhs) => {
                let l = self.translate_term(lhs)?.into_bool()?;
                let r = self.translate_term(rhs)?.into_bool()?;
                Ok(Z3Term::Bool(l.implies(&r)))
            }
            SmtTerm::Ite(cond, then, els) => {
                let c = self.translate_term(cond)?.into_bool()?;
                let t = self.translate_term(then)?;
                let e = self.translate_term(els)?;
                match (t, e) {
                    (Z3Term::Int(ti), Z3Term::Int(ei)) => Ok(Z3Term::Int(c.ite(&ti, &ei))),
                    (Z3Term::Bool(tb), Z3Term::Bool(eb)) => Ok(Z3Term::Bool(c.ite(&tb, &eb))),
                    (t @ (Z3Term::Int(_) | Z3Term::Real(_)), e) => {
                        let t = t.into_real()?;
                        let e = e.into_real()?;
                        Ok(Z3Term::Real(c.ite(&t, &e)))
                    }
                    _ => Err(Z3Error::Internal("Sort mismatch in ITE".into())),
                }
            }
        }
    }

    fn translate_bools(&self, terms: &[SmtTerm]) -> Result<Vec<z3::ast::Bool>, Z3Error> {
        terms
            .iter()
            .map(|t| self.translate_term(t).and_then(|z| z.into_bool()))
            .collect()
    }

    /// Integer arithmetic when both sides are Int, real arithmetic otherwise.
    fn arith(
        &self,
        lhs: &SmtTerm,
        rhs: &SmtTerm,
        int_op: impl Fn(&z3::ast::Int, &z3::ast::Int) -> z3::ast::Int,
        real_op: impl Fn(&z3::ast::Real, &z3::ast::Real) -> z3::ast::Real,
    ) -> Result<Z3Term, Z3Error> {
        let l = self.translate_term(lhs)?;
        let r = self.translate_term(rhs)?;
        match (l, r) {
            (Z3Term::Int(li), Z3Term::Int(ri)) => Ok(Z3Term::Int(int_op(&li, &ri))),
            (l, r) => {
                let l = l.into_real()?;
                let r = r.into_real()?;
                Ok(Z3Term::Real(real_op(&l, &r)))
            }
        }
    }

    fn compare(
        &self,
        lhs: &SmtTerm,
        rhs: &SmtTerm,
        int_op: impl Fn(&z3::ast::Int, &z3::ast::Int) -> z3::ast::Bool,
        real_op: impl Fn(&z3::ast::Real, &z3::ast::Real) -> z3::ast::Bool,
    ) -> Result<Z3Term, Z3Error> {
        let l = self.translate_term(lhs)?;
        let r = self.translate_term(rhs)?;
        match (l, r) {
            (Z3Term::Int(li), Z3Term::Int(ri)) => Ok(Z3Term::Bool(int_op(&li, &ri))),
            (l, r) => {
                let l = l.into_real()?;
                let r = r.into_real()?;
                Ok(Z3Term::Bool(real_op(&l, &r)))
            }
        }
    }

    fn map_check(result: Z3SatResult) -> SatResult {
        match result {
            Z3SatResult::Sat => SatResult::Sat,
            Z3SatResult::Unsat => SatResult::Unsat,
            Z3SatResult::Unknown => SatResult::Unknown("Z3 returned unknown".into()),
        }
    }
}

enum Z3Term {
    Int(z3::ast::Int),
    Real(z3::ast::Real),
    Bool(z3::ast::Bool),
}

impl Z3Term {
    fn into_real(self) -> Result<z3::ast::Real, Z3Error> {
        match self {
            Z3Term::Real(r) => Ok(r),
            Z3Term::Int(i) => Ok(z3::ast::Real::from_int(&i)),
            Z3Term::Bool(_) => Err(Z3Error::Internal("Expected Real, got Bool".into())),
        }
    }

    fn into_bool(self) -> Result<z3::ast::Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            Z3Term::Int(_) => Err(Z3Error::Internal("Expected Bool, got Int".into())),
            Z3Term::Real(_) => Err(Z3Error::Internal("Expected Bool, got Real".into())),
        }
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        self.int_vars.remove(name);
        self.real_vars.remove(name);
        self.bool_vars.remove(name);
        match sort {
            SmtSort::Int => {
                let v = z3::ast::Int::new_const(name);
                self.int_vars.insert(name.to_string(), v);
            }
            SmtSort::Real => {
                let v = z3::ast::Real::new_const(name);
                self.real_vars.insert(name.to_string(), v);
            }
            SmtSort::Bool => {
                let v = z3::ast::Bool::new_const(name);
                self.bool_vars.insert(name.to_string(), v);
            }
        }
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_term(term)?.into_bool()?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        Ok(())
    }

    fn set_timeout_ms(&mut self, timeout_ms: u64) -> Result<(), Z3Error> {
        self.apply_timeout(timeout_ms);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        Ok(Self::map_check(self.solver.check()))
    }

    fn check_sat_with_model(
        &mut self,
        var_names: &[(&str, &SmtSort)],
    ) -> Result<(SatResult, Option<Model>), Z3Error> {
        match self.solver.check() {
            Z3SatResult::Sat => {
                let z3_model = self
                    .solver
                    .get_model()
                    .ok_or_else(|| Z3Error::Internal("SAT but no model available".into()))?;
                let mut values = HashMap::new();

                for &(name, sort) in var_names {
                    match sort {
                        SmtSort::Int => {
                            let v = self
                                .int_vars
                                .get(name)
                                .ok_or_else(|| Z3Error::SortMismatch(name.to_string()))?;
                            if let Some(val) = z3_model.eval::<z3::ast::Int>(v, true) {
                                if let Some(n) = val.as_i64() {
                                    values.insert(name.to_string(), ModelValue::Int(n));
                                }
                            }
                        }
                        SmtSort::Real => {
                            let v = self
                                .real_vars
                                .get(name)
                                .ok_or_else(|| Z3Error::SortMismatch(name.to_string()))?;
                            if let Some(val) = z3_model.eval::<z3::ast::Real>(v, true) {
                                let text = val.to_string();
                                let value = match parse_real_value(&text) {
                                    Some(r) => ModelValue::Real(r),
                                    None => ModelValue::Algebraic(text),
                                };
                                values.insert(name.to_string(), value);
                            }
                        }
                        SmtSort::Bool => {
                            let v = self
                                .bool_vars
                                .get(name)
                                .ok_or_else(|| Z3Error::SortMismatch(name.to_string()))?;
                            if let Some(val) = z3_model.eval::<z3::ast::Bool>(v, true) {
                                if let Some(b) = val.as_bool() {
                                    values.insert(name.to_string(), ModelValue::Bool(b));
                                }
                            }
                        }
                    }
                }

                Ok((SatResult::Sat, Some(Model { values })))
            }
            other => Ok((Self::map_check(other), None)),
        }
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 may drop per-solver parameters on reset; reapply timeout if configured.
        if let Some(params) = &self.params {
            self.solver.set_params(params);
        }
        self.int_vars.clear();
        self.real_vars.clear();
        self.bool_vars.clear();
        Ok(())
    }
}
