use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// tessera: sharding rule checker and statement planner
#[derive(Debug, Parser)]
#[command(
    name = "tessera",
    about = "Validate sharding rules and explain how statements are routed and rewritten",
    version
)]
pub struct Args {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load and validate a rule document
    Check {
        /// Rule document (TOML)
        #[arg(long)]
        rule: PathBuf,
    },

    /// Route and rewrite one bound statement
    Explain {
        /// Rule document (TOML)
        #[arg(long)]
        rule: PathBuf,

        /// Bound statement as inline JSON or a path to a JSON file
        #[arg(long)]
        statement: String,

        /// Parameters as a JSON array, e.g. '[7, "paid"]'
        #[arg(long)]
        params: Option<String>,

        /// Hint context as inline JSON or a path to a JSON file
        #[arg(long)]
        hint: Option<String>,

        /// Props file (TOML); defaults apply when absent
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Print the default props document
    DefaultConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
