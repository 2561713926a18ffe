// Delete command - irreversible record deletion
use super::progress::ActivitySpinner;
use super::utils::{self, Connection, SelectionArgs};
use anyhow::Result;
use clap::Args;
use idxsync::{BatchMutator, MutationTarget, Operation, Outcome, Selection};

#[derive(Args)]
#[command(
    about = "Delete records (irreversible)",
    long_about = "Resolve records in each index and delete them. Every index is\n\
                  resolved before anything is deleted; an index that matches nothing\n\
                  is reported and left alone. Deleted records cannot be recovered.",
    after_help = "Examples:\n  \
            # Delete two records by objectID (asks for confirmation)\n  \
            idxsync delete products --values \"123 456\"\n\n  \
            # Delete every variant of two products in both languages\n  \
            idxsync delete products_fr products_en --values \"G1,G2\" --by-distinct --yes"
)]
pub struct DeleteCommand {
    /// Indexes to delete from
    #[arg(required = true, value_name = "INDEX")]
    pub indexes: Vec<String>,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

pub fn run(cmd: DeleteCommand, connection: &Connection, quiet: bool) -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async { run_async(cmd, connection, quiet).await })
}

async fn run_async(cmd: DeleteCommand, connection: &Connection, quiet: bool) -> Result<()> {
    let selection = cmd.selection.selection()?;
    let prompt = format!(
        "Delete {} from {}? This cannot be undone",
        describe(&selection),
        cmd.indexes.join(", ")
    );
    if !utils::confirm(&prompt, cmd.yes)? {
        println!("Aborted; nothing was deleted.");
        return Ok(());
    }

    let targets: Vec<MutationTarget> = cmd.indexes.iter().map(MutationTarget::primary).collect();
    let (store, config, clients) = connection.connect()?;
    let spinner = ActivitySpinner::new(quiet);
    let mutator = BatchMutator::new(clients, config, spinner.progress_log());

    let operation = Operation::Delete {
        selection,
        confirmed: true,
    };
    let outcome = mutator.apply(operation, &targets).await;
    spinner.finish();
    store.clear();

    match outcome? {
        Outcome::Mutated(report) => utils::print_report("delete", &report, spinner.elapsed()),
        Outcome::Exported(_) => anyhow::bail!("unexpected export outcome"),
    }
}

fn describe(selection: &Selection) -> String {
    match selection {
        Selection::Values { raw, .. } => format!("records matching {} value(s)", raw.len()),
        Selection::Filters { clauses, .. } => {
            let filters: Vec<String> = clauses.iter().map(ToString::to_string).collect();
            format!("records matching {}", filters.join(" AND "))
        }
    }
}
