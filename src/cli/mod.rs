use anyhow::Result;
use clap::{Parser, Subcommand};

// CLI Commands (cmd_ prefix)
mod cmd_clone;
mod cmd_compare;
mod cmd_copy_recommend;
mod cmd_delete;
mod cmd_export;
mod cmd_indexes;
mod cmd_no_results;
mod cmd_update;

// Helper modules (no cmd_ prefix)
mod logger;
mod progress;
mod utils;

use utils::Connection;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Format custom help template with grouped commands
fn format_help_template() -> &'static str {
    concat!(
        "{about-with-newline}\n\n",
        "{usage-heading}\n  {usage}\n\n",
        "Options:\n{options}\n\n",
        "Discovery:\n",
        "  indexes     List primary indexes and discover attributes\n",
        "  compare     Compare searchable attributes, facets or rules across indexes\n",
        "  no-results  Top searches that returned no results\n",
        "\n",
        "Records:\n",
        "  export      Export records to CSV\n",
        "  update      Partially update records from a CSV table or field list\n",
        "  delete      Delete records (irreversible)\n",
        "\n",
        "Indexes:\n",
        "  clone       Copy settings, rules, synonyms and objects to other indexes\n",
        "  copy-recommend  Copy recommend rules of one model to other indexes\n",
        "\n",
        "Credentials are read from --app-id/--api-key or IDXSYNC_APP_ID/IDXSYNC_API_KEY.\n",
        "See 'idxsync <COMMAND> --help' for more information on a specific command.\n"
    )
}

#[derive(Parser)]
#[command(bin_name = "idxsync")]
#[command(version = VERSION)]
#[command(about = concat!("idxsync v", env!("CARGO_PKG_VERSION"), " - bulk operations on hosted search indexes"))]
#[command(long_about = concat!(
    "idxsync v", env!("CARGO_PKG_VERSION"), " - bulk operations on hosted search indexes\n\n",
    "Resolve records by identifier or attribute, then export, update, delete\n",
    "or clone them across one or more indexes. Targets are processed one at\n",
    "a time; a failing target never stops the others."
))]
#[command(propagate_version = true)]
#[command(help_template = format_help_template())]
pub struct Cli {
    #[command(flatten)]
    connection: Connection,

    /// Suppress progress output
    #[arg(long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Indexes(cmd_indexes::IndexesCommand),
    Export(cmd_export::ExportCommand),
    Update(cmd_update::UpdateCommand),
    Delete(cmd_delete::DeleteCommand),
    Clone(cmd_clone::CloneCommand),
    CopyRecommend(cmd_copy_recommend::CopyRecommendCommand),
    Compare(cmd_compare::CompareCommand),
    NoResults(cmd_no_results::NoResultsCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger based on verbosity flags
    logger::init_logger(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Indexes(cmd) => cmd_indexes::run(cmd, &cli.connection, cli.quiet),
        Commands::Export(cmd) => cmd_export::run(cmd, &cli.connection, cli.quiet),
        Commands::Update(cmd) => cmd_update::run(cmd, &cli.connection, cli.quiet),
        Commands::Delete(cmd) => cmd_delete::run(cmd, &cli.connection, cli.quiet),
        Commands::Clone(cmd) => cmd_clone::run(cmd, &cli.connection, cli.quiet),
        Commands::CopyRecommend(cmd) => cmd_copy_recommend::run(cmd, &cli.connection, cli.quiet),
        Commands::Compare(cmd) => cmd_compare::run(cmd, &cli.connection, cli.quiet),
        Commands::NoResults(cmd) => cmd_no_results::run(cmd, &cli.connection, cli.quiet),
    };

    // Credentials only live for the duration of one command
    cli.connection.forget();
    result
}
