// No-results command - frequent searches that found nothing
use super::progress::ActivitySpinner;
use super::utils::{self, Connection};
use anyhow::{Context, Result};
use clap::{Args, ValueHint};
use idxsync::constants;
use idxsync::{HttpAnalyticsClient, SearchStat};
use std::path::PathBuf;

#[derive(Args)]
#[command(
    about = "Top searches that returned no results",
    long_about = "Fetch the most frequent searches of the last N days that returned\n\
                  zero hits on an index. Blank searches are ignored.",
    after_help = "Examples:\n  \
            # Last 7 days, US analytics region\n  \
            idxsync no-results products\n\n  \
            # Last 30 days, EU region, saved as CSV\n  \
            idxsync no-results products --region de --days 30 --csv no_results.csv"
)]
pub struct NoResultsCommand {
    /// Index to analyze
    pub index: String,

    /// Analytics region of the application
    #[arg(long, default_value = constants::DEFAULT_ANALYTICS_REGION)]
    pub region: String,

    /// Number of days to look back
    #[arg(long, default_value_t = constants::DEFAULT_ANALYTICS_DAYS, value_parser = clap::value_parser!(u32).range(1..=365))]
    pub days: u32,

    /// Show at most N searches (0 = all)
    #[arg(short = 'n', long, default_value = "0")]
    pub limit: usize,

    /// Also write the list as CSV
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub csv: Option<PathBuf>,
}

pub fn run(cmd: NoResultsCommand, connection: &Connection, quiet: bool) -> Result<()> {
    tokio::runtime::Runtime::new()?.block_on(async { run_async(cmd, connection, quiet).await })
}

async fn run_async(cmd: NoResultsCommand, connection: &Connection, quiet: bool) -> Result<()> {
    let store = connection.store()?;
    let config = connection.config();
    let client = HttpAnalyticsClient::new(store.primary()?, &cmd.region, &config)?;

    let spinner = ActivitySpinner::new(quiet);
    let log = spinner.progress_log();
    let today = chrono::Utc::now().date_naive();
    let searches =
        idxsync::top_no_result_searches(&client, &config, &log, &cmd.index, cmd.days, today).await;
    spinner.finish();
    store.clear();
    let searches = searches.context("Failed to fetch analytics")?;

    if let Some(path) = &cmd.csv {
        utils::write_output(path, &render_csv(&searches, config.csv_delimiter)?)?;
        log::info!("wrote {}", utils::display_path(path).display());
    }

    let shown = if cmd.limit == 0 {
        searches.len()
    } else {
        cmd.limit.min(searches.len())
    };
    if shown == 0 {
        println!("No searches without results in the last {} days.", cmd.days);
        return Ok(());
    }

    println!("{:>8}  Search", "Count");
    for stat in &searches[..shown] {
        println!(
            "{:>8}  {}",
            idxsync::format::format_number(stat.count),
            idxsync::format::truncate(&stat.search, 80)
        );
    }
    if shown < searches.len() {
        println!("... {} more", searches.len() - shown);
    }
    Ok(())
}

fn render_csv(searches: &[SearchStat], delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(["search", "count"])?;
    for stat in searches {
        let count = stat.count.to_string();
        writer.write_record([stat.search.as_str(), count.as_str()])?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("{}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_csv() {
        let searches = vec![
            SearchStat { search: "red; shoes".into(), count: 12, nb_hits: 0 },
            SearchStat { search: "hat".into(), count: 3, nb_hits: 0 },
        ];
        assert_eq!(
            render_csv(&searches, b';').unwrap(),
            "search;count\n\"red; shoes\";12\nhat;3\n"
        );
    }
}
