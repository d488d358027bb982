//! Argument parsing and output plumbing shared by the commands.

use std::fs;
use std::path::Path;

use miette::IntoDiagnostic;
use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::Zero;
use tracing::info;

use heron_engine::claim::Claim;
use heron_engine::report::EntryReport;
use heron_engine::verifier::{SolverChoice, VerifierConfig};
use heron_smt::backends::smtlib_printer::parse_decimal;

use crate::cli::Cli;
use crate::types::OutputFormat;

pub(crate) fn parse_output_format(raw: &str) -> miette::Result<OutputFormat> {
    match raw {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(miette::miette!(
            "Unknown output format: {other}. Use 'text' or 'json'."
        )),
    }
}

pub(crate) fn parse_solver(raw: &str) -> miette::Result<SolverChoice> {
    SolverChoice::parse(raw)
        .ok_or_else(|| miette::miette!("Unknown solver: {raw}. Use 'z3' or 'cvc5'."))
}

pub(crate) fn verifier_config_from_cli(cli: &Cli) -> miette::Result<VerifierConfig> {
    Ok(VerifierConfig {
        solver: parse_solver(&cli.solver)?,
        timeout_ms: Some(cli.timeout_ms).filter(|ms| *ms > 0),
    })
}

/// Exact value of `3`, `-0.25` or `1/3`.
pub(crate) fn parse_rational(flag: &str, raw: &str) -> miette::Result<BigRational> {
    let raw = raw.trim();
    let parsed = match raw.split_once('/') {
        Some((num, den)) => match (num.trim().parse::<BigInt>(), den.trim().parse::<BigInt>()) {
            (Ok(n), Ok(d)) if !d.is_zero() => Some(BigRational::new(n, d)),
            _ => None,
        },
        None => parse_decimal(raw),
    };
    parsed.ok_or_else(|| {
        miette::miette!("--{flag}: expected a decimal or a fraction like 1/3, got '{raw}'")
    })
}

pub(crate) fn emit_reports(format: OutputFormat, reports: &[EntryReport]) -> miette::Result<()> {
    match format {
        OutputFormat::Text => {
            for report in reports {
                println!("{report}");
            }
        }
        OutputFormat::Json => {
            let text = match reports {
                [single] => serde_json::to_string_pretty(single),
                many => serde_json::to_string_pretty(many),
            };
            println!("{}", text.into_diagnostic()?);
        }
    }
    Ok(())
}

/// File name for a claim's script: anything outside `[A-Za-z0-9_-]`
/// becomes `_`.
pub(crate) fn script_file_name(claim_name: &str) -> String {
    let stem: String = claim_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}.smt2")
}

pub(crate) fn dump_claims<'a>(
    dir: &Path,
    claims: impl IntoIterator<Item = &'a Claim>,
) -> miette::Result<()> {
    fs::create_dir_all(dir).into_diagnostic()?;
    for claim in claims {
        let path = dir.join(script_file_name(&claim.name));
        fs::write(&path, claim.to_smtlib_script()).into_diagnostic()?;
        info!("wrote {}", path.display());
    }
    Ok(())
}
