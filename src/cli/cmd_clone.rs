// Clone command - copy one index onto several targets
use super::progress::ActivitySpinner;
use super::utils::{self, Connection};
use anyhow::Result;
use clap::Args;
use idxsync::{BatchMutator, CopyPhases, CopyRequest, MutationTarget, Operation, Outcome};

#[derive(Args)]
#[command(
    about = "Copy settings, rules, synonyms and objects to other indexes",
    long_about = "Read the source index once, then write it onto each target in four\n\
                  phases: settings (replicas excluded), rules, synonyms, objects. Rules\n\
                  and synonyms on the target are replaced.\n\n\
                  Targets are written one at a time. If a phase fails, the remaining\n\
                  phases for that target are skipped and the next target is processed;\n\
                  phases already applied are not rolled back.\n\n\
                  With --dest-app-id/--dest-api-key the targets live in another\n\
                  application; the source is always read with the primary credentials.",
    after_help = "Examples:\n  \
            # Copy everything to two indexes\n  \
            idxsync clone products products_staging products_test\n\n  \
            # Records only\n  \
            idxsync clone products products_backup --objects-only --yes\n\n  \
            # Configuration only, into another application\n  \
            idxsync clone products products --skip-objects \\\n    \
              --dest-app-id OTHERAPP --dest-api-key $OTHER_KEY"
)]
pub struct CloneCommand {
    /// Source index
    pub source: String,

    /// Target indexes (overwritten)
    #[arg(required = true, value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Do not copy index settings
    #[arg(long, help_heading = "Phases")]
    pub skip_settings: bool,

    /// Do not copy rules
    #[arg(long, help_heading = "Phases")]
    pub skip_rules: bool,

    /// Do not copy synonyms
    #[arg(long, help_heading = "Phases")]
    pub skip_synonyms: bool,

    /// Do not copy records
    #[arg(long, help_heading = "Phases")]
    pub skip_objects: bool,

    /// Copy records only (same as skipping settings, rules and synonyms)
    #[arg(long, conflicts_with_all = ["skip_settings", "skip_rules", "skip_synonyms", "skip_objects"], help_heading = "Phases")]
    pub objects_only: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl CloneCommand {
    fn phases(&self) -> CopyPhases {
        if self.objects_only {
            return CopyPhases::objects_only();
        }
        CopyPhases {
            settings: !self.skip_settings,
            rules: !self.skip_rules,
            synonyms: !self.skip_synonyms,
            objects: !self.skip_objects,
        }
    }
}

pub fn run(cmd: CloneCommand, connection: &Connection, quiet: bool) -> Result<()> {
    // Create tokio runtime for async operations
    tokio::runtime::Runtime::new()?.block_on(async { run_async(cmd, connection, quiet).await })
}

async fn run_async(cmd: CloneCommand, connection: &Connection, quiet: bool) -> Result<()> {
    let (store, config, clients) = connection.connect()?;
    let cross_tenant = clients.is_cross_tenant();
    let targets: Vec<MutationTarget> = cmd
        .targets
        .iter()
        .map(|name| {
            if cross_tenant {
                MutationTarget::secondary(name)
            } else {
                MutationTarget::primary(name)
            }
        })
        .collect();

    let target_list: Vec<String> = targets.iter().map(ToString::to_string).collect();
    let prompt = format!(
        "Overwrite {} with the content of {}?",
        target_list.join(", "),
        cmd.source
    );
    if !utils::confirm(&prompt, cmd.yes)? {
        store.clear();
        println!("Aborted; no index was modified.");
        return Ok(());
    }

    let request = CopyRequest::new(&cmd.source).phases(cmd.phases());
    let spinner = ActivitySpinner::new(quiet);
    let mutator = BatchMutator::new(clients, config, spinner.progress_log());

    let operation = Operation::FullCopy {
        request,
        confirmed: true,
    };
    let outcome = mutator.apply(operation, &targets).await;
    spinner.finish();
    store.clear();

    match outcome? {
        Outcome::Mutated(report) => utils::print_report("clone", &report, spinner.elapsed()),
        Outcome::Exported(_) => anyhow::bail!("unexpected export outcome"),
    }
}
