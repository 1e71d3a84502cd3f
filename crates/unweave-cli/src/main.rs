//! unweave: read an obfuscated script, run the rewrite engine to fixpoint,
//! write the readable result next to the input.

mod args;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use args::CliArgs;
use unweave_passes::{deobfuscate, Config};

fn main() {
    let args = CliArgs::parse();
    init_logging(&args);
    if let Err(err) = run(&args) {
        eprintln!("unweave: {err:#}");
        std::process::exit(1);
    }
}

fn init_logging(args: &CliArgs) {
    let default_level = if args.quiet {
        "error"
    } else if args.verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &CliArgs) -> Result<()> {
    let source = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;

    let config = Config {
        max_iterations: args.max_iterations,
        clean: args.clean,
    };
    let output = deobfuscate(&source, &config)
        .with_context(|| format!("deobfuscating {}", args.input.display()))?;

    let path = args.output_path();
    std::fs::write(&path, output).with_context(|| format!("writing {}", path.display()))?;
    info!(output = %path.display(), "done");
    Ok(())
}
