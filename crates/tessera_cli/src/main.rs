mod args;
mod format;
mod runner;

use std::process;

use anyhow::Result;
use args::{Args, Command};
use clap::Parser;
use runner::{default_config, run_check, run_explain, ExplainRequest};
use tracing::debug;

fn main() {
    if let Err(e) = run() {
        eprintln!("tessera: error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    tessera_observability::init_tracing(&args.log);
    debug!(command = ?args.command, "tessera starting");

    let output = match &args.command {
        Command::Check { rule } => run_check(rule)?,
        Command::Explain {
            rule,
            statement,
            params,
            hint,
            config,
            format,
        } => run_explain(&ExplainRequest {
            rule,
            statement,
            params: params.as_deref(),
            hint: hint.as_deref(),
            config: config.as_deref(),
            format: *format,
        })?,
        Command::DefaultConfig => default_config()?,
    };
    print!("{output}");
    Ok(())
}
