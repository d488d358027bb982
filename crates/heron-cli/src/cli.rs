//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub(crate) const CLI_LONG_ABOUT: &str =
    "Verify claims about the Babylonian (Heron) square-root iteration with an SMT solver.\n\n\
    A claim is proved when its negation is unsatisfiable on the claim's domain, \
    refuted when the solver finds a counterexample, and indeterminate when the \
    solver gives up within its time limit.\n\n\
    Start with:\n  \
    1. heron list\n  \
    2. heron run convergence-7\n  \
    3. heron converge --iterations 6";

#[derive(Parser)]
#[command(name = "heron")]
#[command(about = "Verify claims about the Heron square-root iteration with an SMT solver")]
#[command(long_about = CLI_LONG_ABOUT)]
#[command(version)]
pub(crate) struct Cli {
    /// Solver backend: z3 | cvc5
    #[arg(long, global = true, default_value = "z3")]
    pub(crate) solver: String,

    /// Per-session solver timeout in milliseconds (0 disables)
    #[arg(long, global = true, default_value_t = 30_000)]
    pub(crate) timeout_ms: u64,

    /// Output format: text | json
    #[arg(long, global = true, default_value = "text")]
    pub(crate) format: String,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List the built-in claims
    List,

    /// Run built-in claims by name (all of them when none are given)
    Run {
        /// Registry entry names, see `heron list`
        names: Vec<String>,

        /// Write each solver query as an SMT-LIB2 script into this directory
        #[arg(long)]
        dump_smt: Option<PathBuf>,
    },

    /// Check |heron(x, seed, N) - sqrt(x)| < tolerance for lower < x < upper
    Converge {
        /// Number of iterations N, at most 16
        #[arg(long)]
        iterations: usize,

        /// Positive starting value (decimal or fraction)
        #[arg(long, default_value = "1")]
        seed: String,

        /// Exclusive lower bound on x, at least 0
        #[arg(long, default_value = "0")]
        lower: String,

        /// Exclusive upper bound on x
        #[arg(long, default_value = "100")]
        upper: String,

        /// Error tolerance
        #[arg(long, default_value = "0.01")]
        tolerance: String,

        /// Write the solver query as an SMT-LIB2 script into this directory
        #[arg(long)]
        dump_smt: Option<PathBuf>,
    },

    /// Search for the largest c with |heron(x,b,near) - sqrt(x)| > c * |heron(x,b,far) - sqrt(x)|
    Contraction {
        /// Lower end of the search interval for c
        #[arg(long)]
        lower: String,

        /// Upper end of the search interval for c
        #[arg(long)]
        upper: String,

        /// Number of bisection steps
        #[arg(long)]
        refine_iterations: usize,

        /// Iteration count on the left-hand side, at most 16
        #[arg(long, default_value_t = 1)]
        near: usize,

        /// Iteration count on the right-hand side, at most 16
        #[arg(long, default_value_t = 3)]
        far: usize,
    },
}
