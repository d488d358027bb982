//! `heron converge` and `heron contraction`: claims built from flags.

use std::path::PathBuf;

use miette::IntoDiagnostic;
use num::traits::Signed;

use heron_engine::claim::check_iterations;
use heron_engine::refiner::RefineOptions;
use heron_engine::registry::{
    convergence_claim, run_task, ConvergenceParams, EntryTask, RefinementTask,
};
use heron_engine::report::EntryReport;
use heron_engine::verifier::{Verifier, VerifierConfig};

use crate::commands::helpers::{dump_claims, emit_reports, parse_rational};
use crate::types::OutputFormat;

pub(crate) struct ConvergeArgs {
    pub(crate) iterations: usize,
    pub(crate) seed: String,
    pub(crate) lower: String,
    pub(crate) upper: String,
    pub(crate) tolerance: String,
    pub(crate) dump_smt: Option<PathBuf>,
}

pub(crate) fn convergence_params(args: &ConvergeArgs) -> miette::Result<ConvergenceParams> {
    let params = ConvergenceParams {
        iterations: args.iterations,
        seed: parse_rational("seed", &args.seed)?,
        lower: parse_rational("lower", &args.lower)?,
        upper: parse_rational("upper", &args.upper)?,
        tolerance: parse_rational("tolerance", &args.tolerance)?,
    };
    check_iterations(params.iterations).into_diagnostic()?;
    if !params.tolerance.is_positive() {
        return Err(miette::miette!("--tolerance must be positive"));
    }
    if params.lower >= params.upper {
        return Err(miette::miette!("--lower must be below --upper"));
    }
    Ok(params)
}

pub(crate) fn run_converge_command(
    args: ConvergeArgs,
    config: &VerifierConfig,
    format: OutputFormat,
) -> miette::Result<()> {
    let params = convergence_params(&args)?;
    let name = format!("converge-{}", params.iterations);
    let claim = convergence_claim(&name, &params).into_diagnostic()?;
    if let Some(dir) = &args.dump_smt {
        dump_claims(dir, [&claim])?;
    }
    let description = format!(
        "|heron(x, {}, {}) - sqrt(x)| < {} for {} < x < {}",
        params.seed, params.iterations, params.tolerance, params.lower, params.upper
    );
    let outcome = run_task(&Verifier::new(*config), &EntryTask::Check(claim)).into_diagnostic()?;
    let report = EntryReport::new(&name, &description, config.solver.name(), &outcome, ("", ""));
    emit_reports(format, &[report])
}

pub(crate) struct ContractionArgs {
    pub(crate) lower: String,
    pub(crate) upper: String,
    pub(crate) refine_iterations: usize,
    pub(crate) near: usize,
    pub(crate) far: usize,
}

pub(crate) fn contraction_options(args: &ContractionArgs) -> miette::Result<RefineOptions> {
    check_iterations(args.near.max(args.far)).into_diagnostic()?;
    let options = RefineOptions::new(
        parse_rational("lower", &args.lower)?,
        parse_rational("upper", &args.upper)?,
        args.refine_iterations,
    );
    if options.low.is_negative() {
        return Err(miette::miette!("--lower must not be negative"));
    }
    Ok(options)
}

pub(crate) fn run_contraction_command(
    args: ContractionArgs,
    config: &VerifierConfig,
    format: OutputFormat,
) -> miette::Result<()> {
    let options = contraction_options(&args)?;
    let description = format!(
        "largest c in [{}, {}] with |heron(x, b, {near}) - sqrt(x)| > c * |heron(x, b, {far}) - sqrt(x)|",
        options.low,
        options.high,
        near = args.near,
        far = args.far,
    );
    let task = EntryTask::Refine(RefinementTask::contraction(args.near, args.far, options));
    let outcome = run_task(&Verifier::new(*config), &task).into_diagnostic()?;
    let report = EntryReport::new(
        "contraction",
        &description,
        config.solver.name(),
        &outcome,
        ("", ""),
    );
    emit_reports(format, &[report])
}
