// Recommend rule copy - one model's rules from a source index onto many targets
use super::{BatchMutator, MutationResult, MutationTarget, OperationReport, require_targets};
use crate::client::{RecommendModel, RecommendRule, collect_recommend_rules};
use crate::error::{EngineError, EngineResult};
use crate::retry::with_read_retry;
use std::fmt;
use std::str::FromStr;

/// How copied rules meet the rules already on a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecommendCopyMode {
    /// Upsert by identifier, keep everything else
    #[default]
    Merge,
    /// Delete the target's rules for the model first
    Replace,
}

impl fmt::Display for RecommendCopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendCopyMode::Merge => f.write_str("merge"),
            RecommendCopyMode::Replace => f.write_str("replace"),
        }
    }
}

impl FromStr for RecommendCopyMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merge" => Ok(RecommendCopyMode::Merge),
            "replace" => Ok(RecommendCopyMode::Replace),
            other => Err(EngineError::validation(format!(
                "unknown copy mode '{}' (expected merge or replace)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendCopyRequest {
    pub source_index: String,
    pub model: RecommendModel,
    pub mode: RecommendCopyMode,
}

impl RecommendCopyRequest {
    pub fn new(source_index: impl Into<String>, model: RecommendModel) -> Self {
        Self {
            source_index: source_index.into(),
            model,
            mode: RecommendCopyMode::default(),
        }
    }

    pub fn mode(mut self, mode: RecommendCopyMode) -> Self {
        self.mode = mode;
        self
    }
}

impl BatchMutator {
    /// Copy the source's rules for `request.model` onto every target.
    ///
    /// Replace mode removes rules from the targets and needs `confirmed`.
    /// An empty source writes nothing and reports nothing matched.
    pub async fn copy_recommend_rules(
        &self,
        targets: &[MutationTarget],
        request: &RecommendCopyRequest,
        confirmed: bool,
    ) -> EngineResult<OperationReport> {
        if request.mode == RecommendCopyMode::Replace && !confirmed {
            return Err(self.fatal(EngineError::destructive("recommend rule replace")));
        }
        if request.source_index.trim().is_empty() {
            return Err(self.fatal(EngineError::validation("a source index is required")));
        }
        require_targets(targets).map_err(|e| self.fatal(e))?;
        self.reject_source_as_target(&request.source_index, targets)
            .map_err(|e| self.fatal(e))?;

        let source = self.clients.source();
        let rules = with_read_retry(&self.config, "read recommend rules", || {
            collect_recommend_rules(source, &request.source_index, request.model)
        })
        .await
        .map_err(|e| self.fatal(e))?;

        if rules.is_empty() {
            self.log.notice(
                Some(request.source_index.as_str()),
                format!("no {} rules to copy", request.model),
            );
            let results = targets
                .iter()
                .map(|t| MutationResult::success(t.clone(), 0))
                .collect();
            return Ok(self.finish("recommend copy", results));
        }
        self.log.info(
            Some(request.source_index.as_str()),
            format!("{} {} rule(s) read", rules.len(), request.model),
        );

        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            let index = target.index_name.as_str();
            match self.push_recommend_rules(target, request, &rules).await {
                Ok(count) => {
                    self.log.success(
                        Some(index),
                        format!("{} {} rule(s) copied ({})", count, request.model, request.mode),
                    );
                    results.push(MutationResult::success(target.clone(), count));
                }
                Err(e) => {
                    let reason = format!("recommend rule copy failed: {}", e);
                    self.log.target_failure(index, reason.clone());
                    results.push(MutationResult::failure(target.clone(), reason));
                }
            }
        }

        Ok(self.finish("recommend copy", results))
    }

    async fn push_recommend_rules(
        &self,
        target: &MutationTarget,
        request: &RecommendCopyRequest,
        rules: &[RecommendRule],
    ) -> EngineResult<usize> {
        let writer = self.client(target.tenant);
        let index = target.index_name.as_str();

        if request.mode == RecommendCopyMode::Replace {
            let existing = match with_read_retry(&self.config, "read target recommend rules", || {
                collect_recommend_rules(writer, index, request.model)
            })
            .await
            {
                Ok(existing) => existing,
                // a target that does not exist yet has nothing to clear
                Err(e) if e.is_not_found() => Vec::new(),
                Err(e) => return Err(e),
            };
            for rule in &existing {
                writer
                    .delete_recommend_rule(index, request.model, &rule.object_id)
                    .await?;
            }
            if !existing.is_empty() {
                self.log
                    .info(Some(index), format!("{} existing rule(s) removed", existing.len()));
            }
        }

        writer
            .save_recommend_rules(index, request.model, rules)
            .await?;
        Ok(rules.len())
    }
}
