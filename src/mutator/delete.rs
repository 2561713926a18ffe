// Delete - irreversible removal of resolved records
use super::{BatchMutator, MutationResult, MutationTarget, OperationReport, require_targets};
use crate::error::{EngineError, EngineResult};
use crate::resolver::{IdentifierResolver, Selection, identifiers_only};

impl BatchMutator {
    /// Delete the selected records from every target.
    ///
    /// Without `confirmed` nothing is resolved and nothing is sent.
    pub async fn delete(
        &self,
        targets: &[MutationTarget],
        selection: &Selection,
        confirmed: bool,
    ) -> EngineResult<OperationReport> {
        if !confirmed {
            return Err(self.fatal(EngineError::destructive("delete")));
        }
        require_targets(targets).map_err(|e| self.fatal(e))?;

        let ids_only = identifiers_only();
        let mut resolved = Vec::with_capacity(targets.len());
        for target in targets {
            let resolver = IdentifierResolver::new(self.client(target.tenant), &self.config, &self.log);
            let resolution = resolver
                .resolve_selection(&target.index_name, selection, Some(ids_only.as_slice()))
                .await
                .map_err(|e| self.fatal(e))?;
            resolved.push((target, resolution.ids()));
        }

        let mut results = Vec::with_capacity(resolved.len());
        for (target, ids) in resolved {
            let index = target.index_name.as_str();
            if ids.is_empty() {
                self.log.notice(Some(index), "nothing matched, no objects deleted");
                results.push(MutationResult::success(target.clone(), 0));
                continue;
            }

            self.log.info(Some(index), format!("deleting {} objects", ids.len()));
            match self.client(target.tenant).delete_objects(index, &ids).await {
                Ok(()) => {
                    self.log
                        .success(Some(index), format!("{} objects deleted", ids.len()));
                    results.push(MutationResult::success(target.clone(), ids.len()));
                }
                Err(e) => {
                    self.log.target_failure(index, e.to_string());
                    results.push(MutationResult::failure(target.clone(), e.to_string()));
                }
            }
        }

        Ok(self.finish("delete", results))
    }
}
