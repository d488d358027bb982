//! `heron list` and `heron run`.

use std::path::PathBuf;

use miette::IntoDiagnostic;
use tracing::info;

use heron_engine::claim::Claim;
use heron_engine::registry::{registry, run_entry, EntryTask, RegistryEntry};
use heron_engine::report::EntryReport;
use heron_engine::verifier::VerifierConfig;

use crate::commands::helpers::{dump_claims, emit_reports};
use crate::types::OutputFormat;

#[derive(serde::Serialize)]
struct ListedEntry<'a> {
    name: &'a str,
    kind: &'static str,
    description: &'a str,
}

fn task_kind(task: &EntryTask) -> &'static str {
    match task {
        EntryTask::Check(_) => "check",
        EntryTask::Refine(_) => "refine",
        EntryTask::Compare(_) => "compare",
    }
}

pub(crate) fn run_list_command(format: OutputFormat) -> miette::Result<()> {
    let entries = registry().into_diagnostic()?;
    match format {
        OutputFormat::Text => {
            let width = entries.iter().map(|e| e.name.len()).max().unwrap_or(0);
            for entry in &entries {
                println!("{:<width$}  {}", entry.name, entry.description);
            }
        }
        OutputFormat::Json => {
            let listed: Vec<_> = entries
                .iter()
                .map(|e| ListedEntry {
                    name: e.name,
                    kind: task_kind(&e.task),
                    description: e.description,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&listed).into_diagnostic()?);
        }
    }
    Ok(())
}

/// Selected entries in registry order, or every entry when `names` is empty.
fn select(entries: Vec<RegistryEntry>, names: &[String]) -> miette::Result<Vec<RegistryEntry>> {
    if let Some(unknown) = names
        .iter()
        .find(|n| !entries.iter().any(|e| e.name == n.as_str()))
    {
        let known: Vec<_> = entries.iter().map(|e| e.name).collect();
        return Err(miette::miette!(
            "Unknown claim: {unknown}. Available: {}",
            known.join(", ")
        ));
    }
    Ok(entries
        .into_iter()
        .filter(|e| names.is_empty() || names.iter().any(|n| n == e.name))
        .collect())
}

fn entry_claims(task: &EntryTask) -> Vec<&Claim> {
    match task {
        EntryTask::Check(claim) => vec![claim],
        EntryTask::Compare(task) => task.claims.iter().collect(),
        EntryTask::Refine(_) => Vec::new(),
    }
}

fn comparison_labels(task: &EntryTask) -> (&str, &str) {
    match task {
        EntryTask::Compare(task) => (task.first_label.as_str(), task.second_label.as_str()),
        _ => ("", ""),
    }
}

pub(crate) fn run_registry_command(
    names: &[String],
    dump_smt: Option<PathBuf>,
    config: &VerifierConfig,
    format: OutputFormat,
) -> miette::Result<()> {
    let entries = select(registry().into_diagnostic()?, names)?;
    if let Some(dir) = &dump_smt {
        dump_claims(dir, entries.iter().flat_map(|e| entry_claims(&e.task)))?;
    }

    let mut reports = Vec::with_capacity(entries.len());
    for entry in &entries {
        let outcome = run_entry(config, entry).into_diagnostic()?;
        let report = EntryReport::new(
            entry.name,
            entry.description,
            config.solver.name(),
            &outcome,
            comparison_labels(&entry.task),
        );
        if format == OutputFormat::Text {
            println!("{report}");
        } else {
            reports.push(report);
        }
    }
    info!(entries = entries.len(), "registry run complete");
    if format == OutputFormat::Json {
        emit_reports(format, &reports)?;
    }
    Ok(())
}
