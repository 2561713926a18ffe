//! Batch mutation engine
//!
//! Every operation follows the same shape: resolve the full target set up
//! front (read-only, any error aborts before the first write), then mutate
//! targets strictly one after another. A failed write is recorded against its
//! target and the run moves on.

mod copy;
mod delete;
mod export;
mod recommend;
mod update;

pub use copy::{CopyPhase, CopyPhases, CopyRequest};
pub use recommend::{RecommendCopyMode, RecommendCopyRequest};
pub use export::{ExportFile, ExportRequest, cell_text, render_csv, union_columns};
pub use update::{UpdatePayload, UpdateRequest};

use crate::client::{ClientPair, IndexClient, Record};
use crate::config::EngineConfig;
use crate::credentials::Tenant;
use crate::error::{EngineError, EngineResult};
use crate::progress::ProgressLog;
use crate::resolver::Selection;
use std::fmt;
use std::sync::Arc;

/// An index on a given tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationTarget {
    pub index_name: String,
    pub tenant: Tenant,
}

impl MutationTarget {
    pub fn primary(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            tenant: Tenant::Primary,
        }
    }

    pub fn secondary(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            tenant: Tenant::Secondary,
        }
    }
}

impl fmt::Display for MutationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tenant {
            Tenant::Primary => write!(f, "{}", self.index_name),
            Tenant::Secondary => write!(f, "{} (destination)", self.index_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetStatus {
    Success,
    Failure(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    pub target: MutationTarget,
    pub status: TargetStatus,
    pub records_affected: usize,
    /// Clone phases applied to this target before it finished or failed
    pub completed_phases: Vec<CopyPhase>,
}

impl MutationResult {
    pub fn success(target: MutationTarget, records_affected: usize) -> Self {
        Self {
            target,
            status: TargetStatus::Success,
            records_affected,
            completed_phases: Vec::new(),
        }
    }

    pub fn failure(target: MutationTarget, reason: impl Into<String>) -> Self {
        Self {
            target,
            status: TargetStatus::Failure(reason.into()),
            records_affected: 0,
            completed_phases: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TargetStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Completed,
    CompletedWithFailures,
    /// Every target succeeded but nothing was touched anywhere
    NothingMatched,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationStatus::Completed => "completed",
            OperationStatus::CompletedWithFailures => "completed with partial failures",
            OperationStatus::NothingMatched => "nothing matched",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationReport {
    pub results: Vec<MutationResult>,
    pub status: OperationStatus,
}

impl OperationReport {
    pub fn from_results(results: Vec<MutationResult>) -> Self {
        let status = if results.iter().any(|r| !r.is_success()) {
            OperationStatus::CompletedWithFailures
        } else if results
            .iter()
            .all(|r| r.records_affected == 0 && r.completed_phases.is_empty())
        {
            OperationStatus::NothingMatched
        } else {
            OperationStatus::Completed
        };
        Self { results, status }
    }

    pub fn records_affected(&self) -> usize {
        self.results.iter().map(|r| r.records_affected).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &MutationResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}

/// Applied to every record before it is exported or copied
pub type RecordTransform = Arc<dyn Fn(Record) -> Record + Send + Sync>;

/// One operation for [`BatchMutator::apply`]
#[derive(Debug, Clone)]
pub enum Operation {
    Export(ExportRequest),
    PartialUpdate(UpdateRequest),
    Delete {
        selection: Selection,
        confirmed: bool,
    },
    FullCopy {
        request: CopyRequest,
        confirmed: bool,
    },
    CopyRecommendRules {
        request: RecommendCopyRequest,
        confirmed: bool,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Export(_) => "export",
            Operation::PartialUpdate(_) => "update",
            Operation::Delete { .. } => "delete",
            Operation::FullCopy { .. } => "clone",
            Operation::CopyRecommendRules { .. } => "recommend copy",
        }
    }
}

/// What [`BatchMutator::apply`] produced
#[derive(Debug, Clone)]
pub enum Outcome {
    Exported(Vec<ExportFile>),
    Mutated(OperationReport),
}

pub struct BatchMutator {
    clients: ClientPair,
    config: EngineConfig,
    log: ProgressLog,
    transform: Option<RecordTransform>,
}

impl BatchMutator {
    pub fn new(clients: ClientPair, config: EngineConfig, log: ProgressLog) -> Self {
        Self {
            clients,
            config,
            log,
            transform: None,
        }
    }

    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(Record) -> Record + Send + Sync + 'static,
    {
        self.transform = Some(Arc::new(transform));
        self
    }

    pub fn log(&self) -> &ProgressLog {
        &self.log
    }

    /// Dispatch `operation` over `targets`
    pub async fn apply(
        &self,
        operation: Operation,
        targets: &[MutationTarget],
    ) -> EngineResult<Outcome> {
        log::debug!("{} over {} target(s)", operation.name(), targets.len());
        match operation {
            Operation::Export(request) => self.export(targets, &request).await.map(Outcome::Exported),
            Operation::PartialUpdate(request) => {
                self.update(targets, &request).await.map(Outcome::Mutated)
            }
            Operation::Delete {
                selection,
                confirmed,
            } => self
                .delete(targets, &selection, confirmed)
                .await
                .map(Outcome::Mutated),
            Operation::FullCopy { request, confirmed } => self
                .clone_index(targets, &request, confirmed)
                .await
                .map(Outcome::Mutated),
            Operation::CopyRecommendRules { request, confirmed } => self
                .copy_recommend_rules(targets, &request, confirmed)
                .await
                .map(Outcome::Mutated),
        }
    }

    fn client(&self, tenant: Tenant) -> &dyn IndexClient {
        self.clients.for_tenant(tenant)
    }

    fn apply_transform(&self, records: Vec<Record>) -> Vec<Record> {
        match &self.transform {
            Some(transform) => records.into_iter().map(|r| transform(r)).collect(),
            None => records,
        }
    }

    /// Copying an index onto itself is refused; across tenants the same name is
    /// a different index
    fn reject_source_as_target(&self, source: &str, targets: &[MutationTarget]) -> EngineResult<()> {
        let cross_tenant = self.clients.is_cross_tenant();
        match targets.iter().find(|t| {
            t.index_name == source && (t.tenant == Tenant::Primary || !cross_tenant)
        }) {
            Some(same) => Err(EngineError::validation(format!(
                "target '{}' is the source index",
                same.index_name
            ))),
            None => Ok(()),
        }
    }

    /// Log a resolution error on the error channel and hand it back
    fn fatal(&self, error: EngineError) -> EngineError {
        self.log.error(error.to_string());
        error
    }

    fn finish(&self, operation: &str, results: Vec<MutationResult>) -> OperationReport {
        let report = OperationReport::from_results(results);
        let message = format!(
            "{} {}: {} record(s) across {} target(s)",
            operation,
            report.status,
            report.records_affected(),
            report.results.len()
        );
        match report.status {
            OperationStatus::CompletedWithFailures => self.log.info(None, message),
            OperationStatus::NothingMatched => self.log.notice(None, message),
            OperationStatus::Completed => self.log.success(None, message),
        }
        report
    }
}

fn require_targets(targets: &[MutationTarget]) -> EngineResult<()> {
    if targets.is_empty() {
        return Err(EngineError::empty_input("target indexes"));
    }
    if let Some(blank) = targets.iter().find(|t| t.index_name.trim().is_empty()) {
        return Err(EngineError::validation(format!(
            "target index name is blank ({:?})",
            blank.tenant
        )));
    }
    Ok(())
}
