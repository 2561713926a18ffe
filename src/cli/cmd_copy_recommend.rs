// Copy-recommend command - push one model's recommend rules to other indexes
use super::progress::ActivitySpinner;
use super::utils::{self, Connection};
use anyhow::Result;
use clap::Args;
use idxsync::{
    BatchMutator, MutationTarget, Operation, Outcome, RecommendCopyMode, RecommendCopyRequest,
    RecommendModel,
};

#[derive(Args)]
#[command(
    about = "Copy recommend rules of one model to other indexes",
    long_about = "Read every recommend rule of one model from the source index and\n\
                  save them on each target. By default rules are merged: a rule with\n\
                  the same objectID is overwritten and the target's other rules stay.\n\
                  With --replace the target's rules for the model are deleted first.\n\n\
                  Targets are written one at a time; a failing target does not stop\n\
                  the others.",
    after_help = "Examples:\n  \
            # Merge related-products rules into two indexes\n  \
            idxsync copy-recommend products_fr products_de products_it\n\n  \
            # Make the target's bought-together rules match the source\n  \
            idxsync copy-recommend products_fr products_de -m bought-together --replace"
)]
pub struct CopyRecommendCommand {
    /// Source index
    pub source: String,

    /// Target indexes
    #[arg(required = true, value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Recommendation model (related-products, bought-together, looking-similar, trending-items)
    #[arg(short = 'm', long, default_value = "related-products")]
    pub model: String,

    /// Delete the targets' rules for the model before copying
    #[arg(long)]
    pub replace: bool,

    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl CopyRecommendCommand {
    fn request(&self) -> Result<RecommendCopyRequest> {
        let model: RecommendModel = self.model.parse()?;
        let mode = if self.replace {
            RecommendCopyMode::Replace
        } else {
            RecommendCopyMode::Merge
        };
        Ok(RecommendCopyRequest::new(&self.source, model).mode(mode))
    }
}

pub fn run(cmd: CopyRecommendCommand, connection: &Connection, quiet: bool) -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async { run_async(cmd, connection, quiet).await })
}

async fn run_async(cmd: CopyRecommendCommand, connection: &Connection, quiet: bool) -> Result<()> {
    let request = cmd.request()?;
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

    // merging never removes anything, only replace asks
    if request.mode == RecommendCopyMode::Replace {
        let target_list: Vec<String> = targets.iter().map(ToString::to_string).collect();
        let prompt = format!(
            "Delete the {} rules of {} and replace them with those of {}?",
            request.model,
            target_list.join(", "),
            cmd.source
        );
        if !utils::confirm(&prompt, cmd.yes)? {
            store.clear();
            println!("Aborted; no index was modified.");
            return Ok(());
        }
    }

    let spinner = ActivitySpinner::new(quiet);
    let mutator = BatchMutator::new(clients, config, spinner.progress_log());
    let operation = Operation::CopyRecommendRules {
        request,
        confirmed: true,
    };
    let outcome = mutator.apply(operation, &targets).await;
    spinner.finish();
    store.clear();

    match outcome? {
        Outcome::Mutated(report) => {
            utils::print_report("recommend copy", &report, spinner.elapsed())
        }
        Outcome::Exported(_) => anyhow::bail!("unexpected export outcome"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        cmd: CopyRecommendCommand,
    }

    #[test]
    fn test_model_and_mode_flags() {
        let cli = TestCli::parse_from(["copy-recommend", "src", "a", "b"]);
        let request = cli.cmd.request().unwrap();
        assert_eq!(request.model, RecommendModel::RelatedProducts);
        assert_eq!(request.mode, RecommendCopyMode::Merge);
        assert_eq!(cli.cmd.targets, vec!["a", "b"]);

        let cli = TestCli::parse_from([
            "copy-recommend",
            "src",
            "dst",
            "-m",
            "bought-together",
            "--replace",
        ]);
        let request = cli.cmd.request().unwrap();
        assert_eq!(request.model, RecommendModel::BoughtTogether);
        assert_eq!(request.mode, RecommendCopyMode::Replace);

        let cli = TestCli::parse_from(["copy-recommend", "src", "dst", "--model", "similar-ish"]);
        assert!(cli.cmd.request().is_err());
        assert!(TestCli::try_parse_from(["copy-recommend", "src"]).is_err());
    }
}
