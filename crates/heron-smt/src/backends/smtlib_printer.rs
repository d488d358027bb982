use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::{One, Signed, Zero};

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

/// Print an SmtTerm as SMT-LIB2 format.
pub fn to_smtlib(term: &SmtTerm) -> String {
    match term {
        SmtTerm::Var(name) => name.clone(),
        SmtTerm::IntLit(n) => {
            if *n < 0 {
                format!("(- {})", n.unsigned_abs())
            } else {
                n.to_string()
            }
        }
        SmtTerm::RealLit(r) => real_to_smtlib(r),
        SmtTerm::BoolLit(b) => {
            if *b {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }
        SmtTerm::Add(lhs, rhs) => format!("(+ {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Sub(lhs, rhs) => format!("(- {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Mul(lhs, rhs) => format!("(* {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Div(lhs, rhs) => format!("(/ {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Neg(inner) => format!("(- {})", to_smtlib(inner)),
        SmtTerm::Eq(lhs, rhs) => format!("(= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Lt(lhs, rhs) => format!("(< {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Le(lhs, rhs) => format!("(<= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Gt(lhs, rhs) => format!("(> {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::Ge(lhs, rhs) => format!("(>= {} {})", to_smtlib(lhs), to_smtlib(rhs)),
        SmtTerm::And(terms) => {
            if terms.is_empty() {
                "true".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(and {})", inner.join(" "))
            }
        }
        SmtTerm::Or(terms) => {
            if terms.is_empty() {
                "false".to_string()
            } else if terms.len() == 1 {
                to_smtlib(&terms[0])
            } else {
                let inner: Vec<String> = terms.iter().map(to_smtlib).collect();
                format!("(or {})", inner.join(" "))
            }
        }
        SmtTerm::Not(inner) => format!("(not {})", to_smtlib(inner)),
        SmtTerm::Implies(lhs, rhs) => {
            format!("(=> {} {})", to_smtlib(lhs), to_smtlib(rhs))
        }
        SmtTerm::Ite(cond, then, els) => {
            format!(
                "(ite {} {} {})",
                to_smtlib(cond),
                to_smtlib(then),
                to_smtlib(els)
            )
        }
    }
}

fn real_to_smtlib(r: &BigRational) -> String {
    let magnitude = r.abs();
    let body = if magnitude.denom().is_one() {
        format!("{}.0", magnitude.numer())
    } else {
        format!("(/ {}.0 {}.0)", magnitude.numer(), magnitude.denom())
    };
    if r.is_negative() {
        format!("(- {body})")
    } else {
        body
    }
}

/// Print a sort as SMT-LIB2 format.
pub fn sort_to_smtlib(sort: &SmtSort) -> &'static str {
    match sort {
        SmtSort::Bool => "Bool",
        SmtSort::Int => "Int",
        SmtSort::Real => "Real",
    }
}

/// Render a self-contained SMT-LIB2 script: declarations, assertions and a
/// final `(check-sat)`.
pub fn to_smtlib_script(vars: &[(&str, &SmtSort)], assertions: &[SmtTerm]) -> String {
    let mut out = String::from("(set-logic ALL)\n");
    for (name, sort) in vars {
        out.push_str(&format!(
            "(declare-const {name} {})\n",
            sort_to_smtlib(sort)
        ));
    }
    for term in assertions {
        out.push_str(&format!("(assert {})\n", to_smtlib(term)));
    }
    out.push_str("(check-sat)\n");
    out
}

/// Parse a numeric SMT-LIB2 value as printed by solvers: `3`, `3.0`,
/// `2.25`, `(/ 1 2)`, `(/ 1.0 2.0)`, `(- 4.0)` and nestings of these.
///
/// Returns `None` for anything else, notably algebraic `root-obj` values.
pub fn parse_real_value(text: &str) -> Option<BigRational> {
    let tokens = tokenize(text);
    let mut pos = 0;
    let value = parse_value(&tokens, &mut pos)?;
    if pos == tokens.len() {
        Some(value)
    } else {
        None
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    for ch in text.chars() {
        match ch {
            '(' | ')' => {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
                out.push(ch.to_string());
            }
            c if c.is_whitespace() => {
                if !buf.is_empty() {
                    out.push(std::mem::take(&mut buf));
                }
            }
            other => buf.push(other),
        }
    }
    if !buf.is_empty() {
        out.push(buf);
    }
    out
}

fn parse_value(tokens: &[String], pos: &mut usize) -> Option<BigRational> {
    let token = tokens.get(*pos)?;
    *pos += 1;
    if token != "(" {
        return parse_fraction(token).or_else(|| parse_decimal(token));
    }
    let op = tokens.get(*pos)?.clone();
    *pos += 1;
    let mut args = Vec::new();
    while tokens.get(*pos)? != ")" {
        args.push(parse_value(tokens, pos)?);
    }
    *pos += 1;
    match (op.as_str(), args.as_slice()) {
        ("-", [v]) => Some(-v.clone()),
        ("-", [a, b]) => Some(a - b),
        ("/", [a, b]) if !b.is_zero() => Some(a / b),
        _ => None,
    }
}

/// `3/4` as printed by some solver front ends.
fn parse_fraction(token: &str) -> Option<BigRational> {
    let (numer, denom) = token.split_once('/')?;
    let numer = parse_decimal(numer)?;
    let denom = parse_decimal(denom)?;
    if denom.is_zero() {
        None
    } else {
        Some(numer / denom)
    }
}

/// Exact value of a plain decimal literal such as `12`, `0.01` or `-3.5`.
pub fn parse_decimal(token: &str) -> Option<BigRational> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }
    let numer: BigInt = format!("{int_part}{frac_part}")
        .trim_start_matches('0')
        .parse()
        .unwrap_or_else(|_| BigInt::zero());
    let denom = num::pow(BigInt::from(10), frac_part.len());
    let value = BigRational::new(numer, denom);
    Some(if negative { -value } else { value })
}
