// Export command - resolved records to CSV files
use super::progress::ActivitySpinner;
use super::utils::{self, Connection, SelectionArgs};
use anyhow::{Context, Result};
use clap::{Args, ValueHint};
use idxsync::{BatchMutator, ExportRequest, MutationTarget, Operation, Outcome};
use std::path::PathBuf;

#[derive(Args)]
#[command(
    about = "Export records to CSV",
    long_about = "Resolve records in each index and write one semicolon-delimited CSV\n\
                  file per index, named export_<index>_<YYYY-MM-DD>.csv. Columns are the\n\
                  sorted union of all attributes unless --columns is given. Line breaks\n\
                  and repeated whitespace inside values are collapsed to one space.\n\n\
                  If any index matches nothing, no file is written.",
    after_help = "Examples:\n  \
            # Export two records by objectID\n  \
            idxsync export products --values \"123,456\"\n\n  \
            # Export every record sharing a distinct-attribute value\n  \
            idxsync export products_fr products_en --values-file skus.txt --by-distinct\n\n  \
            # Export by filter, selected columns only\n  \
            idxsync export products --filter brand:acme --columns objectID,title,price\n\n  \
            # Write to a specific file\n  \
            idxsync export products --values 123 -o /tmp/out.csv"
)]
pub struct ExportCommand {
    /// Indexes to export from
    #[arg(required = true, value_name = "INDEX")]
    pub indexes: Vec<String>,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Comma-separated columns, in output order
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Output file (single index only)
    #[arg(short, long, value_hint = ValueHint::FilePath, conflicts_with = "dir")]
    pub output: Option<PathBuf>,

    /// Directory for generated files
    #[arg(long, value_hint = ValueHint::DirPath, default_value = ".")]
    pub dir: PathBuf,

    /// Print CSV to stdout instead of writing files
    #[arg(long, conflicts_with_all = ["output", "dir"])]
    pub stdout: bool,
}

pub fn run(cmd: ExportCommand, connection: &Connection, quiet: bool) -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async { run_async(cmd, connection, quiet).await })
}

async fn run_async(cmd: ExportCommand, connection: &Connection, quiet: bool) -> Result<()> {
    if cmd.output.is_some() && cmd.indexes.len() > 1 {
        anyhow::bail!("--output takes a single index; use --dir for several");
    }

    let request = ExportRequest::new(cmd.selection.selection()?).columns(
        cmd.columns
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect(),
    );
    let targets: Vec<MutationTarget> = cmd.indexes.iter().map(MutationTarget::primary).collect();

    let (store, config, clients) = connection.connect()?;
    let spinner = ActivitySpinner::new(quiet || cmd.stdout);
    let mutator = BatchMutator::new(clients, config, spinner.progress_log());

    let outcome = mutator.apply(Operation::Export(request), &targets).await;
    spinner.finish();
    store.clear();

    let Outcome::Exported(files) = outcome? else {
        anyhow::bail!("export produced no files");
    };

    for file in &files {
        if cmd.stdout {
            print!("{}", file.content);
            continue;
        }
        let path = match &cmd.output {
            Some(path) => path.clone(),
            None => cmd.dir.join(&file.filename),
        };
        utils::write_output(&path, &file.content)
            .with_context(|| format!("Failed to save export of {}", file.index_name))?;
        if !quiet {
            println!(
                "✓ {:<32} {} rows, {} columns, {} → {}",
                file.index_name,
                idxsync::format::format_number(file.rows),
                file.columns.len(),
                idxsync::format::format_bytes(file.content.len() as u64),
                utils::display_path(&path).display()
            );
        }
    }
    Ok(())
}
