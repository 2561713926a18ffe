// Shared utility functions for CLI commands

use anyhow::{Context, Result};
use clap::{Args, ValueHint};
use idxsync::{
    CellValue, ClientPair, CredentialStore, Credentials, EngineConfig, FilterClause,
    OperationReport, RawValueList, Selection, TargetStatus,
};
use serde_json::{Map, Value};
use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection flags shared by every command
#[derive(Args, Clone, Default)]
pub struct Connection {
    /// Application id
    #[arg(long, env = "IDXSYNC_APP_ID", global = true, help_heading = "Connection")]
    pub app_id: Option<String>,

    /// API key (needs write access for update, delete and clone)
    #[arg(
        long,
        env = "IDXSYNC_API_KEY",
        hide_env_values = true,
        global = true,
        help_heading = "Connection"
    )]
    pub api_key: Option<String>,

    /// Application id of a second tenant that clone targets are written to
    #[arg(long, env = "IDXSYNC_DEST_APP_ID", global = true, help_heading = "Connection")]
    pub dest_app_id: Option<String>,

    /// API key of the second tenant
    #[arg(
        long,
        env = "IDXSYNC_DEST_API_KEY",
        hide_env_values = true,
        global = true,
        help_heading = "Connection"
    )]
    pub dest_api_key: Option<String>,

    /// Attempts for read calls before giving up
    #[arg(long, default_value_t = idxsync::constants::DEFAULT_READ_ATTEMPTS, global = true, help_heading = "Connection")]
    pub read_attempts: u32,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = idxsync::constants::HTTP_TIMEOUT_SECS, global = true, help_heading = "Connection")]
    pub timeout: u64,
}

impl Connection {
    /// Build the session credential store from the flags
    pub fn store(&self) -> Result<CredentialStore> {
        let (Some(app_id), Some(api_key)) = (&self.app_id, &self.api_key) else {
            anyhow::bail!(
                "credentials are missing: pass --app-id and --api-key or set IDXSYNC_APP_ID and IDXSYNC_API_KEY"
            );
        };
        let store = CredentialStore::with_primary(Credentials::new(app_id, api_key)?);

        match (&self.dest_app_id, &self.dest_api_key) {
            (Some(app_id), Some(api_key)) => store.set_destination(Credentials::new(app_id, api_key)?),
            (None, None) => {}
            _ => anyhow::bail!("--dest-app-id and --dest-api-key must be given together"),
        }
        Ok(store)
    }

    pub fn config(&self) -> EngineConfig {
        EngineConfig::builder()
            .read_attempts(self.read_attempts)
            .http_timeout(Duration::from_secs(self.timeout))
            .build()
    }

    /// Store and connected clients in one step
    pub fn connect(&self) -> Result<(CredentialStore, EngineConfig, ClientPair)> {
        let store = self.store()?;
        let config = self.config();
        let clients = idxsync::connect(&store, &config).context("Failed to create API clients")?;
        Ok((store, config, clients))
    }

    /// Drop the keys held by the parsed flags
    pub fn forget(mut self) {
        self.api_key = None;
        self.dest_api_key = None;
    }
}

/// How records are selected: pasted values or attribute filters
#[derive(Args, Clone, Default)]
pub struct SelectionArgs {
    /// Values to look up, separated by commas, semicolons, pipes, spaces or newlines
    #[arg(long, conflicts_with = "values_file", help_heading = "Selection")]
    pub values: Option<String>,

    /// Read values from a file ("-" for stdin)
    #[arg(long, value_hint = ValueHint::FilePath, help_heading = "Selection")]
    pub values_file: Option<PathBuf>,

    /// Match values against this attribute instead of objectID
    #[arg(long, value_name = "ATTRIBUTE", conflicts_with = "by_distinct", help_heading = "Selection")]
    pub by_attribute: Option<String>,

    /// Match values against the index's distinct attribute
    #[arg(long, help_heading = "Selection")]
    pub by_distinct: bool,

    /// attribute:value filter; repeat to combine with AND
    #[arg(long = "filter", value_name = "ATTR:VALUE", conflicts_with_all = ["values", "values_file"], help_heading = "Selection")]
    pub filters: Vec<String>,

    /// With --filter, keep one record per distinct attribute value
    #[arg(long, requires = "filters", help_heading = "Selection")]
    pub distinct: bool,
}

impl SelectionArgs {
    pub fn is_filter(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn selection(&self) -> Result<Selection> {
        if self.is_filter() {
            let clauses = self
                .filters
                .iter()
                .map(|f| FilterClause::parse(f))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Selection::Filters {
                clauses,
                distinct: self.distinct,
            });
        }

        let raw = RawValueList::parse(&read_values(self.values.as_deref(), self.values_file.as_deref())?);
        Ok(if self.by_distinct {
            Selection::attribute(raw, None)
        } else if let Some(attribute) = &self.by_attribute {
            Selection::attribute(raw, Some(attribute.clone()))
        } else {
            Selection::ids(raw)
        })
    }
}

/// Inline values, or the content of a file ("-" reads stdin)
pub fn read_values(inline: Option<&str>, file: Option<&Path>) -> Result<String> {
    match (inline, file) {
        (Some(values), _) => Ok(values.to_string()),
        (None, Some(path)) => read_input(path),
        (None, None) => {
            anyhow::bail!("no values given: use --values, --values-file or --filter")
        }
    }
}

pub fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Failed to read stdin")?;
        return Ok(content);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", display_path(path).display()))
}

/// Write `content` to `path`, creating parent directories
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", display_path(parent).display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", display_path(path).display()))
}

/// Parse `name=value` assignments into a field map; values are typed like table cells
pub fn parse_assignments(assignments: &[String]) -> Result<Map<String, Value>> {
    let mut fields = Map::new();
    for assignment in assignments {
        let Some((name, value)) = assignment.split_once('=') else {
            anyhow::bail!("Invalid assignment '{}': expected name=value", assignment);
        };
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Invalid assignment '{}': empty field name", assignment);
        }
        fields.insert(name.to_string(), CellValue::parse(value).into_json());
    }
    Ok(fields)
}

/// Ask before an irreversible operation; non-interactive sessions must pass --yes
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    use dialoguer::{Confirm, theme::ColorfulTheme};

    if assume_yes {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        log::warn!("not a terminal; pass --yes to confirm");
        return Ok(false);
    }
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| anyhow::anyhow!("Failed to read user input: {}", e))
}

/// Print per-target results and a summary line; fails when any target failed
pub fn print_report(label: &str, report: &OperationReport, elapsed: Duration) -> Result<()> {
    println!();
    for result in &report.results {
        match &result.status {
            TargetStatus::Success => println!(
                "  ✓ {:<32} {} records",
                result.target.to_string(),
                idxsync::format::format_number(result.records_affected)
            ),
            TargetStatus::Failure(reason) => {
                println!("  ✗ {:<32} {}", result.target.to_string(), reason)
            }
        }
    }
    println!();
    println!(
        "{}: {} ({} records across {} targets in {})",
        label,
        report.status,
        idxsync::format::format_number(report.records_affected()),
        report.results.len(),
        idxsync::format::format_std_duration_auto(elapsed)
    );

    let failed = report.failures().count();
    if failed > 0 {
        anyhow::bail!("{} of {} targets failed", failed, report.results.len());
    }
    Ok(())
}

/// Display path relative to the current directory when possible
pub fn display_path(path: &Path) -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(Path::to_path_buf))
        .unwrap_or_else(|| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_assignments() {
        let fields = parse_assignments(&[
            "price=12.5".to_string(),
            "active=true".to_string(),
            "note=".to_string(),
            "title=a=b".to_string(),
        ])
        .unwrap();
        assert_eq!(fields["price"], json!(12.5));
        assert_eq!(fields["active"], json!(true));
        assert_eq!(fields["note"], Value::Null);
        assert_eq!(fields["title"], json!("a=b"));

        assert!(parse_assignments(&["novalue".to_string()]).is_err());
        assert!(parse_assignments(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_write_output_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("export.csv");
        write_output(&path, "objectID\n1\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "objectID\n1\n");
        assert_eq!(read_input(&path).unwrap(), "objectID\n1\n");
    }

    #[test]
    fn test_io_errors_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("prices.csv");
        let err = read_input(&missing).unwrap_err();
        assert!(format!("{:#}", err).contains("prices.csv"));

        let blocked = dir.path().join("file");
        std::fs::write(&blocked, "x").unwrap();
        let err = write_output(&blocked.join("out.csv"), "objectID\n").unwrap_err();
        assert!(format!("{:#}", err).contains("file"));
    }

    #[test]
    fn test_selection_modes() {
        let args = SelectionArgs {
            values: Some("a, b".into()),
            ..Default::default()
        };
        assert!(matches!(args.selection().unwrap(), Selection::Values { .. }));

        let args = SelectionArgs {
            filters: vec!["brand:acme".into()],
            distinct: true,
            ..Default::default()
        };
        match args.selection().unwrap() {
            Selection::Filters { clauses, distinct } => {
                assert_eq!(clauses.len(), 1);
                assert!(distinct);
            }
            _ => panic!("expected filters"),
        }

        assert!(SelectionArgs::default().selection().is_err());
    }

    #[test]
    fn test_connection_requires_pairs() {
        let conn = Connection {
            app_id: Some("APP".into()),
            ..Default::default()
        };
        assert!(conn.store().is_err());

        let conn = Connection {
            app_id: Some("APP".into()),
            api_key: Some("key".into()),
            dest_app_id: Some("OTHER".into()),
            ..Default::default()
        };
        assert!(conn.store().is_err());

        let conn = Connection {
            app_id: Some("APP".into()),
            api_key: Some("key".into()),
            ..Default::default()
        };
        assert!(conn.store().unwrap().is_connected());
    }
}
