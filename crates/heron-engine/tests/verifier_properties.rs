//! Verifier behavior against the in-process Z3 backend.

use heron_engine::claim::Claim;
use heron_engine::encoder::heron_iterate;
use heron_engine::verifier::{Verdict, VerdictKind, Verifier, VerifierConfig};
use heron_smt::solver::ModelValue;
use heron_smt::terms::SmtTerm;
use num::bigint::BigInt;
use num::rational::BigRational;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn lit(n: i64) -> SmtTerm {
    SmtTerm::rational(n, 1)
}

fn verifier() -> Verifier {
    Verifier::new(VerifierConfig::default().with_timeout_ms(Some(60_000)))
}

#[test]
fn always_true_relation_is_proved_on_empty_domain() -> TestResult {
    let claim = Claim::builder("successor-is-larger")
        .real("x")
        .property(SmtTerm::var("x").add(lit(1)).gt(SmtTerm::var("x")))
        .build()?;
    assert_eq!(verifier().verify(&claim)?, Verdict::Proved);
    Ok(())
}

#[test]
fn always_true_relation_is_proved_on_trivial_domain() -> TestResult {
    let claim = Claim::builder("square-is-non-negative")
        .real("x")
        .assume(SmtTerm::bool(true))
        .property(SmtTerm::var("x").square().ge(lit(0)))
        .build()?;
    assert_eq!(verifier().verify(&claim)?, Verdict::Proved);
    Ok(())
}

#[test]
fn pinned_counterexample_is_returned_as_witness() -> TestResult {
    // heron(4, 1, 1) = 2.5, so "one step from 1 lands below 2" fails at x = 4.
    let (x, b) = (SmtTerm::var("x"), SmtTerm::var("b"));
    let claim = Claim::builder("pinned")
        .real("x")
        .real("b")
        .assume(x.clone().gt(lit(0)))
        .assume(b.clone().gt(lit(0)))
        .assume(x.clone().eq(lit(4)))
        .assume(b.clone().eq(lit(1)))
        .property(heron_iterate(&x, &b, 1).lt(lit(2)))
        .build()?;

    let verdict = verifier().verify(&claim)?;
    let witness = verdict.witness().ok_or("expected a counterexample")?;
    let four = BigRational::from_integer(BigInt::from(4));
    let one = BigRational::from_integer(BigInt::from(1));
    assert_eq!(witness.value("x"), Some(&ModelValue::Real(four)));
    assert_eq!(witness.value("b"), Some(&ModelValue::Real(one)));
    assert_eq!(witness.approx("x")?, 4.0);
    Ok(())
}

#[test]
fn repeated_verification_is_stable() -> TestResult {
    let claim = Claim::builder("unit-interval")
        .real("x")
        .assume(SmtTerm::var("x").gt(lit(0)))
        .assume(SmtTerm::var("x").lt(lit(1)))
        .property(SmtTerm::var("x").square().lt(SmtTerm::var("x")))
        .build()?;
    let v = verifier();
    let first = v.verify(&claim)?.kind();
    let second = v.verify(&claim)?.kind();
    assert_eq!(first, VerdictKind::Proved);
    assert_eq!(first, second);
    Ok(())
}

#[test]
fn two_sided_bound_is_refuted_on_either_side() -> TestResult {
    // -1/2 < x - 1 < 1/2 fails somewhere in (0, 3).
    let d = SmtTerm::var("x").sub(lit(1));
    let claim = Claim::builder("two-sided")
        .real("x")
        .assume(SmtTerm::var("x").gt(lit(0)))
        .assume(SmtTerm::var("x").lt(lit(3)))
        .property(SmtTerm::and(vec![
            d.clone().gt(SmtTerm::rational(-1, 2)),
            d.lt(SmtTerm::rational(1, 2)),
        ]))
        .build()?;
    let verdict = verifier().verify(&claim)?;
    let witness = verdict.witness().ok_or("expected a counterexample")?;
    let x = witness.approx("x")?;
    assert!(x > 0.0 && x < 3.0);
    assert!((x - 1.0).abs() >= 0.5);
    Ok(())
}

#[test]
fn alternatives_share_a_domain() -> TestResult {
    let build = |name: &str, property: SmtTerm| {
        Claim::builder(name)
            .real("x")
            .assume(SmtTerm::var("x").gt(lit(2)))
            .property(property)
            .build()
    };
    let claims = [
        build("below-one", SmtTerm::var("x").lt(lit(1)))?,
        build("above-one", SmtTerm::var("x").gt(lit(1)))?,
    ];
    let verdicts = verifier().verify_alternatives(&claims)?;
    assert_eq!(verdicts.len(), 2);
    assert_eq!(verdicts[0].kind(), VerdictKind::Refuted);
    assert_eq!(verdicts[1], Verdict::Proved);
    Ok(())
}
