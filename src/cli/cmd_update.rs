// Update command - partial updates from a CSV table or a field list
use super::progress::ActivitySpinner;
use super::utils::{self, Connection, SelectionArgs};
use anyhow::{Context, Result};
use clap::{Args, ValueHint};
use idxsync::{
    BatchMutator, ColumnSchema, MutationTarget, Operation, Outcome, ResolutionMode, UpdateRequest,
    UpdateTable,
};
use std::path::PathBuf;

#[derive(Args)]
#[command(
    about = "Partially update records from a CSV table or field list",
    long_about = "Merge fields into existing records. Records that do not exist are\n\
                  never created.\n\n\
                  With --file, the first CSV column holds objectIDs (or attribute values\n\
                  with --by-attribute/--by-distinct) and every other column is a field.\n\
                  An empty cell sets the field to null; a cell missing from a short row\n\
                  leaves the field untouched. Cell types are inferred (true/false,\n\
                  numbers, JSON arrays/objects) unless declared with --type.\n\n\
                  Without --file, the --set fields are applied to every selected record.",
    after_help = "Examples:\n  \
            # Table keyed by objectID\n  \
            idxsync update products --file prices.csv\n\n  \
            # Table keyed by the distinct attribute, 'sku' kept as text\n  \
            idxsync update products --file prices.csv --by-distinct --type sku=string\n\n  \
            # Same fields on every record matching a filter\n  \
            idxsync update products_fr products_en --filter brand:acme --set on_sale=true"
)]
pub struct UpdateCommand {
    /// Indexes to update
    #[arg(required = true, value_name = "INDEX")]
    pub indexes: Vec<String>,

    /// CSV table (first column = key); "-" reads stdin
    #[arg(short, long, value_hint = ValueHint::FilePath, conflicts_with_all = ["set", "values", "values_file", "filters"])]
    pub file: Option<PathBuf>,

    /// Column type declaration, e.g. price=number (auto, string, number, boolean, json)
    #[arg(long = "type", value_name = "COLUMN=TYPE")]
    pub types: Vec<String>,

    /// Field to set on every selected record, e.g. stock=0 (repeatable)
    #[arg(long, value_name = "FIELD=VALUE")]
    pub set: Vec<String>,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

pub fn run(cmd: UpdateCommand, connection: &Connection, quiet: bool) -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async { run_async(cmd, connection, quiet).await })
}

async fn run_async(cmd: UpdateCommand, connection: &Connection, quiet: bool) -> Result<()> {
    let request = build_request(&cmd, connection)?;
    let targets: Vec<MutationTarget> = cmd.indexes.iter().map(MutationTarget::primary).collect();

    let (store, config, clients) = connection.connect()?;
    let spinner = ActivitySpinner::new(quiet);
    let mutator = BatchMutator::new(clients, config, spinner.progress_log());

    let outcome = mutator.apply(Operation::PartialUpdate(request), &targets).await;
    spinner.finish();
    store.clear();

    match outcome? {
        Outcome::Mutated(report) => utils::print_report("update", &report, spinner.elapsed()),
        Outcome::Exported(_) => anyhow::bail!("unexpected export outcome"),
    }
}

fn build_request(cmd: &UpdateCommand, connection: &Connection) -> Result<UpdateRequest> {
    let Some(path) = &cmd.file else {
        if cmd.set.is_empty() {
            anyhow::bail!("nothing to update: pass --file or at least one --set");
        }
        let fields = utils::parse_assignments(&cmd.set)?;
        return Ok(UpdateRequest::uniform(cmd.selection.selection()?, fields));
    };

    let schema = ColumnSchema::parse_declarations(&cmd.types)?;
    let content = utils::read_input(path)?;
    let table = UpdateTable::parse(&content, connection.config().csv_delimiter, &schema)
        .with_context(|| format!("Failed to parse {}", utils::display_path(path).display()))?;
    log::debug!(
        "{} rows, key column '{}', fields {:?}",
        table.rows.len(),
        table.key_column,
        table.columns
    );

    let mode = if cmd.selection.by_distinct {
        ResolutionMode::by_distinct()
    } else if let Some(attribute) = &cmd.selection.by_attribute {
        ResolutionMode::by_attribute(attribute)
    } else {
        ResolutionMode::ByIdentifier
    };
    Ok(UpdateRequest::table(table, mode))
}
