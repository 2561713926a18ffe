// Compare command - one configuration facet across indexes
use super::progress::ActivitySpinner;
use super::utils::Connection;
use anyhow::{Context, Result};
use clap::Args;
use idxsync::{Classification, Comparison, ConfigDiffEngine, DiffRow, Facet};

#[derive(Args)]
#[command(
    about = "Compare searchable attributes, facets or rules across indexes",
    long_about = "Fetch one configuration facet from every index and align the entries\n\
                  row by row. The first index is the base; every other index is marked\n\
                  against it:\n  \
                    + present here but not in the base\n  \
                    - present in the base but missing here\n\n\
                  Attribute rows are ordered case-insensitively; unordered(x) is shown\n\
                  as 'x - Unordered'. By default only rows with a difference are shown.",
    after_help = "Examples:\n  \
            # Searchable attributes of three locales\n  \
            idxsync compare products_fr products_en products_de\n\n  \
            # Facets, every row\n  \
            idxsync compare products_fr products_en --facet facets --all\n\n  \
            # Rules as JSON\n  \
            idxsync compare products_fr products_en --facet rules --json"
)]
pub struct CompareCommand {
    /// Indexes to compare; the first one is the base
    #[arg(required = true, num_args = 2.., value_name = "INDEX")]
    pub indexes: Vec<String>,

    /// What to compare: searchable, facets or rules
    #[arg(short, long, default_value = "searchable")]
    pub facet: Facet,

    /// Show every row, not only rows that differ
    #[arg(short, long)]
    pub all: bool,

    /// Print the comparison as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(cmd: CompareCommand, connection: &Connection, quiet: bool) -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async { run_async(cmd, connection, quiet).await })
}

async fn run_async(cmd: CompareCommand, connection: &Connection, quiet: bool) -> Result<()> {
    let (store, config, clients) = connection.connect()?;
    let spinner = ActivitySpinner::new(quiet || cmd.json);
    let log = spinner.progress_log();

    let engine = ConfigDiffEngine::new(clients.source(), &config, &log);
    let comparison = engine.compare(&cmd.indexes, cmd.facet, !cmd.all).await;
    spinner.finish();
    store.clear();
    let comparison = comparison.context("Comparison failed")?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&comparison)?);
        return Ok(());
    }
    print_comparison(&comparison, cmd.all);
    Ok(())
}

fn print_comparison(comparison: &Comparison, all: bool) {
    println!("Comparing {} of:", comparison.facet);
    for (pos, (index, config)) in comparison.indexes.iter().zip(&comparison.configs).enumerate() {
        let label = if pos == 0 {
            format!("{} (base)", index)
        } else {
            index.clone()
        };
        println!("  {:<40} {} entries", label, config.len());
    }
    println!();

    if comparison.rows.is_empty() {
        if all {
            println!("No entries configured.");
        } else {
            println!("✓ No differences");
        }
        return;
    }

    for row in &comparison.rows {
        print_row(row);
    }

    let differing = comparison.rows.iter().filter(|r| r.has_difference()).count();
    println!("{} rows, {} with differences", comparison.rows.len(), differing);
}

fn print_row(row: &DiffRow) {
    println!("{}", row.display_key);
    for cell in &row.cells {
        let marker = match cell.classification {
            Classification::Base => "=",
            Classification::Added => "+",
            Classification::Removed => "-",
            Classification::Unchanged => " ",
        };
        let mut lines = cell.display().lines();
        let first = lines.next().unwrap_or("");
        println!("  {} {:<28} {}", marker, cell.index_name, first);
        for line in lines {
            println!("    {:<28} {}", "", line);
        }
    }
    println!();
}
