// Full copy (clone) - settings, rules, synonyms, then objects
use super::{
    BatchMutator, MutationResult, MutationTarget, OperationReport, TargetStatus, require_targets,
};
use crate::client::{
    BrowseParams, IndexClient, IndexSettings, Record, Rule, Synonym, collect_objects,
    collect_rules, collect_synonyms,
};
use crate::error::{EngineError, EngineResult};
use crate::retry::with_read_retry;
use std::fmt;

/// Clone phases in the order they are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CopyPhase {
    Settings,
    Rules,
    Synonyms,
    Objects,
}

impl CopyPhase {
    pub const ALL: [CopyPhase; 4] = [
        CopyPhase::Settings,
        CopyPhase::Rules,
        CopyPhase::Synonyms,
        CopyPhase::Objects,
    ];
}

impl fmt::Display for CopyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CopyPhase::Settings => "settings",
            CopyPhase::Rules => "rules",
            CopyPhase::Synonyms => "synonyms",
            CopyPhase::Objects => "objects",
        };
        f.write_str(s)
    }
}

/// Which phases run; all of them by default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyPhases {
    pub settings: bool,
    pub rules: bool,
    pub synonyms: bool,
    pub objects: bool,
}

impl Default for CopyPhases {
    fn default() -> Self {
        Self {
            settings: true,
            rules: true,
            synonyms: true,
            objects: true,
        }
    }
}

impl CopyPhases {
    /// Data-only copy: records, no configuration
    pub fn objects_only() -> Self {
        Self {
            settings: false,
            rules: false,
            synonyms: false,
            objects: true,
        }
    }

    pub fn is_enabled(&self, phase: CopyPhase) -> bool {
        match phase {
            CopyPhase::Settings => self.settings,
            CopyPhase::Rules => self.rules,
            CopyPhase::Synonyms => self.synonyms,
            CopyPhase::Objects => self.objects,
        }
    }

    pub fn any(&self) -> bool {
        CopyPhase::ALL.iter().any(|p| self.is_enabled(*p))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CopyRequest {
    pub source_index: String,
    pub phases: CopyPhases,
}

impl CopyRequest {
    pub fn new(source_index: impl Into<String>) -> Self {
        Self {
            source_index: source_index.into(),
            phases: CopyPhases::default(),
        }
    }

    pub fn phases(mut self, phases: CopyPhases) -> Self {
        self.phases = phases;
        self
    }
}

/// Everything read from the source before the first write
#[derive(Default)]
struct SourceSnapshot {
    settings: Option<IndexSettings>,
    rules: Vec<Rule>,
    synonyms: Vec<Synonym>,
    objects: Vec<Record>,
}

impl BatchMutator {
    /// Clone `request.source_index` onto every target.
    ///
    /// The source is read once, up front. A phase failure stops that target
    /// only; phases it already applied stay applied.
    pub async fn clone_index(
        &self,
        targets: &[MutationTarget],
        request: &CopyRequest,
        confirmed: bool,
    ) -> EngineResult<OperationReport> {
        if !confirmed {
            return Err(self.fatal(EngineError::destructive("clone")));
        }
        self.validate_copy(targets, request).map_err(|e| self.fatal(e))?;

        let mut snapshot = self
            .read_source(&request.source_index, request.phases)
            .await
            .map_err(|e| self.fatal(e))?;
        let objects = self.apply_transform(std::mem::take(&mut snapshot.objects));

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let result = self
                .copy_to(target, request.phases, &snapshot, &objects)
                .await;
            results.push(result);
        }

        Ok(self.finish("clone", results))
    }

    fn validate_copy(&self, targets: &[MutationTarget], request: &CopyRequest) -> EngineResult<()> {
        if request.source_index.trim().is_empty() {
            return Err(EngineError::validation("a source index is required"));
        }
        require_targets(targets)?;
        if !request.phases.any() {
            return Err(EngineError::validation("at least one clone phase must be enabled"));
        }
        self.reject_source_as_target(&request.source_index, targets)
    }

    async fn read_source(&self, index: &str, phases: CopyPhases) -> EngineResult<SourceSnapshot> {
        let source = self.clients.source();
        let mut snapshot = SourceSnapshot::default();

        if phases.settings {
            let settings = with_read_retry(&self.config, "read settings", || {
                source.get_settings(index)
            })
            .await?;
            snapshot.settings = Some(settings);
        }
        if phases.rules {
            snapshot.rules =
                with_read_retry(&self.config, "read rules", || collect_rules(source, index)).await?;
        }
        if phases.synonyms {
            snapshot.synonyms = with_read_retry(&self.config, "read synonyms", || {
                collect_synonyms(source, index)
            })
            .await?;
        }
        if phases.objects {
            let params = BrowseParams::default();
            snapshot.objects = with_read_retry(&self.config, "read objects", || {
                collect_objects(source, index, &params)
            })
            .await?;
        }

        self.log.info(
            Some(index),
            format!(
                "source read: {} rules, {} synonyms, {} objects",
                snapshot.rules.len(),
                snapshot.synonyms.len(),
                snapshot.objects.len()
            ),
        );
        Ok(snapshot)
    }

    async fn copy_to(
        &self,
        target: &MutationTarget,
        phases: CopyPhases,
        snapshot: &SourceSnapshot,
        objects: &[Record],
    ) -> MutationResult {
        let writer = self.client(target.tenant);
        let index = target.index_name.as_str();
        let mut result = MutationResult::success(target.clone(), 0);

        for phase in CopyPhase::ALL {
            if !phases.is_enabled(phase) {
                self.log.info(Some(index), format!("{} skipped", phase));
                continue;
            }
            match self.copy_phase(writer, index, phase, snapshot, objects).await {
                Ok(0) => {
                    self.log
                        .notice(Some(index), format!("nothing to copy for {}", phase));
                }
                Ok(count) => {
                    self.log
                        .success(Some(index), format!("{} copied ({})", phase, count));
                    result.completed_phases.push(phase);
                    if phase == CopyPhase::Objects {
                        result.records_affected = count;
                    }
                }
                Err(e) => {
                    let reason = format!("{} phase failed: {}", phase, e);
                    self.log.target_failure(index, reason.clone());
                    result.status = TargetStatus::Failure(reason);
                    break;
                }
            }
        }
        result
    }

    /// Write one phase; returns how many items were written
    async fn copy_phase(
        &self,
        writer: &dyn IndexClient,
        index: &str,
        phase: CopyPhase,
        snapshot: &SourceSnapshot,
        objects: &[Record],
    ) -> EngineResult<usize> {
        match phase {
            CopyPhase::Settings => match &snapshot.settings {
                Some(settings) if !settings.0.is_empty() => {
                    let stripped = settings.without_replicas();
                    writer.set_settings(index, &stripped).await?;
                    Ok(stripped.0.len())
                }
                _ => Ok(0),
            },
            CopyPhase::Rules if snapshot.rules.is_empty() => Ok(0),
            CopyPhase::Rules => {
                writer.save_rules(index, &snapshot.rules, true).await?;
                Ok(snapshot.rules.len())
            }
            CopyPhase::Synonyms if snapshot.synonyms.is_empty() => Ok(0),
            CopyPhase::Synonyms => {
                writer.save_synonyms(index, &snapshot.synonyms, true).await?;
                Ok(snapshot.synonyms.len())
            }
            CopyPhase::Objects if objects.is_empty() => Ok(0),
            CopyPhase::Objects => {
                writer.save_objects(index, objects).await?;
                Ok(objects.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        let names: Vec<String> = CopyPhase::ALL.iter().map(|p| p.to_string()).collect();
        assert_eq!(names, vec!["settings", "rules", "synonyms", "objects"]);
    }

    #[test]
    fn test_phase_toggles() {
        let phases = CopyPhases::objects_only();
        assert!(phases.is_enabled(CopyPhase::Objects));
        assert!(!phases.is_enabled(CopyPhase::Rules));
        assert!(phases.any());
        let none = CopyPhases {
            objects: false,
            ..phases
        };
        assert!(!none.any());
    }
}
