use criterion::{black_box, criterion_group, criterion_main, Criterion};
use heron_engine::encoder::{heron_iterate, Seed};
use heron_engine::registry::{contraction_claim, convergence_claim, ConvergenceParams};
use heron_smt::terms::SmtTerm;
use num::rational::BigRational;

fn bench_heron_iterate_depth7(c: &mut Criterion) {
    let target = SmtTerm::var("x");
    let seed = Seed::constant(1).to_term();
    c.bench_function("heron_iterate_depth7", |b| {
        b.iter(|| heron_iterate(black_box(&target), black_box(&seed), 7))
    });
}

fn bench_convergence_claim_build(c: &mut Criterion) {
    let params = ConvergenceParams::default();
    c.bench_function("convergence_claim_build", |b| {
        b.iter(|| convergence_claim("bench", black_box(&params)).unwrap())
    });
}

fn bench_contraction_script(c: &mut Criterion) {
    let constant = BigRational::from_integer(4.into());
    let claim = contraction_claim(1, 3, &constant).unwrap();
    c.bench_function("contraction_smtlib_script", |b| {
        b.iter(|| black_box(&claim).to_smtlib_script())
    });
}

criterion_group!(
    benches,
    bench_heron_iterate_depth7,
    bench_convergence_claim_build,
    bench_contraction_script
);
criterion_main!(benches);
