// Partial update - merge supplied fields into existing records, never create
use super::{BatchMutator, MutationResult, MutationTarget, OperationReport, require_targets};
use crate::client::Record;
use crate::constants;
use crate::error::{EngineError, EngineResult};
use crate::resolver::{IdentifierResolver, ResolutionMode, Selection, identifiers_only};
use crate::table::UpdateTable;
use crate::values::RawValueList;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub enum UpdatePayload {
    /// The same fields applied to every selected record
    Uniform {
        selection: Selection,
        fields: Map<String, Value>,
    },
    /// Per-row fields; the first column holds identifiers or attribute values
    Table {
        table: UpdateTable,
        mode: ResolutionMode,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRequest {
    pub payload: UpdatePayload,
}

impl UpdateRequest {
    pub fn uniform(selection: Selection, fields: Map<String, Value>) -> Self {
        Self {
            payload: UpdatePayload::Uniform { selection, fields },
        }
    }

    pub fn table(table: UpdateTable, mode: ResolutionMode) -> Self {
        Self {
            payload: UpdatePayload::Table { table, mode },
        }
    }

    fn validate(&self) -> EngineResult<()> {
        let columns: Vec<&String> = match &self.payload {
            UpdatePayload::Uniform { fields, .. } => {
                if fields.is_empty() {
                    return Err(EngineError::empty_input("update fields"));
                }
                fields.keys().collect()
            }
            UpdatePayload::Table { table, .. } => {
                if table.rows.is_empty() {
                    return Err(EngineError::empty_input("update rows"));
                }
                table.columns.iter().collect()
            }
        };
        if columns.iter().any(|c| c.as_str() == constants::OBJECT_ID) {
            return Err(EngineError::validation(format!(
                "'{}' cannot be updated",
                constants::OBJECT_ID
            )));
        }
        Ok(())
    }
}

/// Per-identifier payloads in first-seen order; later rows win on conflicts
#[derive(Default)]
struct UpdatePlan {
    updates: Vec<Record>,
    positions: HashMap<String, usize>,
}

impl UpdatePlan {
    fn merge(&mut self, object_id: &str, fields: &Map<String, Value>) {
        let pos = *self
            .positions
            .entry(object_id.to_string())
            .or_insert_with(|| {
                self.updates.push(Record::new(object_id));
                self.updates.len() - 1
            });
        let attributes = &mut self.updates[pos].attributes;
        for (name, value) in fields {
            attributes.insert(name.clone(), value.clone());
        }
    }
}

impl BatchMutator {
    /// Partial update over every target.
    ///
    /// Identifiers are checked against the index first, so unknown ones are
    /// dropped instead of being created. Empty cells are sent as null and
    /// columns missing from a row are not sent at all.
    pub async fn update(
        &self,
        targets: &[MutationTarget],
        request: &UpdateRequest,
    ) -> EngineResult<OperationReport> {
        require_targets(targets).map_err(|e| self.fatal(e))?;
        request.validate().map_err(|e| self.fatal(e))?;

        let mut plans = Vec::with_capacity(targets.len());
        for target in targets {
            let plan = self
                .plan_update(target, &request.payload)
                .await
                .map_err(|e| self.fatal(e))?;
            plans.push((target, plan));
        }

        let mut results = Vec::with_capacity(plans.len());
        for (target, plan) in plans {
            let index = target.index_name.as_str();
            if plan.updates.is_empty() {
                self.log.notice(Some(index), "no matching objects to update");
                results.push(MutationResult::success(target.clone(), 0));
                continue;
            }

            self.log
                .info(Some(index), format!("updating {} objects", plan.updates.len()));
            match self
                .client(target.tenant)
                .partial_update_objects(index, &plan.updates, false)
                .await
            {
                Ok(()) => {
                    self.log
                        .success(Some(index), format!("{} objects updated", plan.updates.len()));
                    results.push(MutationResult::success(target.clone(), plan.updates.len()));
                }
                Err(e) => {
                    self.log.target_failure(index, e.to_string());
                    results.push(MutationResult::failure(target.clone(), e.to_string()));
                }
            }
        }

        Ok(self.finish("update", results))
    }

    async fn plan_update(
        &self,
        target: &MutationTarget,
        payload: &UpdatePayload,
    ) -> EngineResult<UpdatePlan> {
        let index = target.index_name.as_str();
        let resolver = IdentifierResolver::new(self.client(target.tenant), &self.config, &self.log);
        let ids_only = identifiers_only();
        let mut plan = UpdatePlan::default();

        match payload {
            UpdatePayload::Uniform { selection, fields } => {
                let resolution = resolver
                    .resolve_selection(index, selection, Some(ids_only.as_slice()))
                    .await?;
                for id in resolution.ids() {
                    plan.merge(&id, fields);
                }
            }
            UpdatePayload::Table {
                table,
                mode: ResolutionMode::ByIdentifier,
            } => {
                let raw = RawValueList::from_values(table.keys());
                let resolution = resolver
                    .resolve(index, &raw, &ResolutionMode::ByIdentifier, Some(ids_only.as_slice()))
                    .await?;
                for id in &resolution.unmatched {
                    log::debug!("{}: skipping unknown identifier {}", index, id);
                }
                let existing: HashSet<String> = resolution.ids().into_iter().collect();
                for row in &table.rows {
                    if existing.contains(&row.key) {
                        plan.merge(&row.key, &row.fields);
                    }
                }
            }
            UpdatePayload::Table {
                table,
                mode: ResolutionMode::ByAttribute(explicit),
            } => {
                let attribute = resolver.resolve_attribute(index, explicit.as_deref()).await?;
                let mode = ResolutionMode::by_attribute(attribute);
                let mut matches: HashMap<String, Vec<String>> = HashMap::new();
                for key in RawValueList::from_values(table.keys()).deduplicated() {
                    let raw = RawValueList::from_values([key.as_str()]);
                    let resolution = resolver
                        .resolve(index, &raw, &mode, Some(ids_only.as_slice()))
                        .await?;
                    matches.insert(key, resolution.ids());
                }
                for row in &table.rows {
                    for id in matches.get(&row.key).into_iter().flatten() {
                        plan.merge(id, &row.fields);
                    }
                }
            }
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plan_merges_rows_for_same_id() {
        let mut plan = UpdatePlan::default();
        let first = json!({"price": 10, "color": "red"});
        let second = json!({"price": null});
        plan.merge("1", first.as_object().unwrap());
        plan.merge("2", first.as_object().unwrap());
        plan.merge("1", second.as_object().unwrap());
        assert_eq!(plan.updates.len(), 2);
        assert_eq!(plan.updates[0].object_id, "1");
        assert_eq!(plan.updates[0].get("price"), Some(Value::Null));
        assert_eq!(plan.updates[0].get("color"), Some(json!("red")));
    }

    #[test]
    fn test_validate_rejects_identifier_column() {
        let fields = json!({"objectID": "x"}).as_object().cloned().unwrap();
        let request = UpdateRequest::uniform(Selection::ids(RawValueList::parse("1")), fields);
        assert!(matches!(request.validate(), Err(EngineError::Validation { .. })));

        let request =
            UpdateRequest::uniform(Selection::ids(RawValueList::parse("1")), Map::new());
        assert!(matches!(request.validate(), Err(EngineError::EmptyInput { .. })));
    }
}
