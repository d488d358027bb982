#![doc = include_str!("../README.md")]

mod cli;
mod commands;
mod types;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::adhoc::{
    run_contraction_command, run_converge_command, ContractionArgs, ConvergeArgs,
};
use crate::commands::helpers::{parse_output_format, verifier_config_from_cli};
use crate::commands::run::{run_list_command, run_registry_command};

fn main() -> miette::Result<()> {
    // Logs on stderr; reports own stdout.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = parse_output_format(&cli.format)?;
    let config = verifier_config_from_cli(&cli)?;

    match cli.command {
        Commands::List => run_list_command(format)?,
        Commands::Run { names, dump_smt } => {
            run_registry_command(&names, dump_smt, &config, format)?;
        }
        Commands::Converge {
            iterations,
            seed,
            lower,
            upper,
            tolerance,
            dump_smt,
        } => {
            run_converge_command(
                ConvergeArgs {
                    iterations,
                    seed,
                    lower,
                    upper,
                    tolerance,
                    dump_smt,
                },
                &config,
                format,
            )?;
        }
        Commands::Contraction {
            lower,
            upper,
            refine_iterations,
            near,
            far,
        } => {
            run_contraction_command(
                ContractionArgs {
                    lower,
                    upper,
                    refine_iterations,
                    near,
                    far,
                },
                &config,
                format,
            )?;
        }
    }
    Ok(())
}
