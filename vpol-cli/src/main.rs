use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use vpol_core::{Interpreter, Options};

/// Runtime for .vpol diagnostic scripts.
#[derive(Parser, Debug)]
#[command(name = "vpol", version, about = "VPOL script runtime")]
struct Args {
    /// Script file to execute
    script: PathBuf,
    /// Reject function redefinition and unrecognized statements
    #[arg(long)]
    strict: bool,
    /// Verbose runtime diagnostics on stderr
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("{e:#}").red());
            ExitCode::from(1)
        }
    }
}

fn run(args: &Args) -> anyhow::Result<()> {
    let source = fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read {}", args.script.display()))?;
    tracing::debug!(script = %args.script.display(), bytes = source.len(), "loaded");

    let opts = Options {
        strict: args.strict,
    };
    Interpreter::new(opts).run(&source)?;
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("vpol=debug,vpol_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // diagnostics go to stderr so script output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
