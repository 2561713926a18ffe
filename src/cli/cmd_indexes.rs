// Index catalog command
use super::utils::Connection;
use anyhow::{Context, Result};
use clap::Args;

#[derive(Args)]
#[command(
    about = "List primary indexes and discover attributes",
    long_about = "List the primary indexes of the application (replicas are skipped),\n\
                  optionally narrowed by a case-insensitive search. With --attributes,\n\
                  read the distinct attribute of one index and the attribute names found\n\
                  in a sample of its records.",
    after_help = "Examples:\n  \
            # All primary indexes\n  \
            idxsync indexes\n\n  \
            # Indexes whose name contains 'prod'\n  \
            idxsync indexes prod\n\n  \
            # Attribute names of one index\n  \
            idxsync indexes --attributes products_fr"
)]
pub struct IndexesCommand {
    /// Only show indexes whose name contains this text
    pub query: Option<String>,

    /// Maximum number of names to print (0 = all)
    #[arg(short = 'n', long, default_value = "0")]
    pub limit: usize,

    /// Discover the attributes of this index instead of listing
    #[arg(long, value_name = "INDEX", conflicts_with = "query")]
    pub attributes: Option<String>,
}

pub fn run(cmd: IndexesCommand, connection: &Connection, _quiet: bool) -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async { run_async(cmd, connection).await })
}

async fn run_async(cmd: IndexesCommand, connection: &Connection) -> Result<()> {
    let (store, config, clients) = connection.connect()?;
    let client = clients.source();

    if let Some(index) = cmd.attributes {
        let discovery = idxsync::discover_attributes(client, &config, &index)
            .await
            .with_context(|| format!("Failed to inspect index {}", index))?;
        store.clear();

        println!("Index:               {}", discovery.index);
        println!(
            "Distinct attribute:  {}",
            discovery.distinct_attribute.as_deref().unwrap_or("(none)")
        );
        println!("Records sampled:     {}", discovery.sampled);
        println!();
        if discovery.attributes.is_empty() {
            println!("No attributes found (index is empty?)");
        }
        for attribute in &discovery.attributes {
            println!("  {}", attribute);
        }
        return Ok(());
    }

    let names = idxsync::list_primary_indexes(client, &config)
        .await
        .context("Failed to list indexes")?;
    store.clear();

    let limit = if cmd.limit == 0 { usize::MAX } else { cmd.limit };
    let matches = idxsync::suggest(&names, cmd.query.as_deref().unwrap_or(""), limit);
    for name in &matches {
        println!("{}", name);
    }
    log::info!("{} of {} primary indexes shown", matches.len(), names.len());
    Ok(())
}
