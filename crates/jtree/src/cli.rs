use std::io::Write;

use clap::{Parser, Subcommand};

use crate::commands::{
    InspectArgs, SaveArgs, SchemaArgs, SearchArgs, run_inspect, run_save, run_schema, run_search,
};
use crate::error::Result;

#[derive(Debug, Parser)]
#[command(
    name = "jtree",
    about = "Inspect, search and re-save schema-driven JSON tree documents",
    version
)]
pub struct Cli {
    /// Log model events at debug level (overridden by JTREE_LOG).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print document summary and the visible row outline.
    Inspect(InspectArgs),

    /// Load a document and write it back, optionally purged or stripped.
    Save(SaveArgs),

    /// List cells whose text matches a pattern.
    Search(SearchArgs),

    /// Print the column schema declared by `_headers_`.
    Schema(SchemaArgs),
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    crate::logging::init(cli.verbose);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run(cli, &mut out)
}

pub fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    match cli.command {
        Commands::Inspect(args) => run_inspect(&args, out),
        Commands::Save(args) => run_save(&args, out),
        Commands::Search(args) => run_search(&args, out),
        Commands::Schema(args) => run_schema(&args, out),
    }
}
