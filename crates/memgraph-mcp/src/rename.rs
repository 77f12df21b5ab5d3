//! Entity rename as a three-stage sequence: create → relink → delete
//!
//! The store has no multi-operation transaction. Stages run strictly in order
//! so the new entity and its relations exist before the old entity goes away.
//! A failing stage stops the sequence and is reported with its stage name;
//! stages already applied stay applied.

use crate::invoker::ToolCaller;
use crate::store::MemoryStore;
use memgraph_core::{Entity, Error, RenameStage, Relation, Result};
use serde::Serialize;
use serde_json::json;
use tracing::info;

#[derive(Clone, Debug, Default)]
pub struct RenameRequest {
    pub from_name: String,
    pub to_name: String,
    /// Type for the renamed entity; defaults to the source's type.
    pub to_type: Option<String>,
}

impl RenameRequest {
    pub fn new(from_name: impl Into<String>, to_name: impl Into<String>) -> Self {
        Self {
            from_name: from_name.into(),
            to_name: to_name.into(),
            to_type: None,
        }
    }

    pub fn with_type(mut self, to_type: impl Into<String>) -> Self {
        self.to_type = Some(to_type.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameOutcome {
    pub created_relations: usize,
}

impl<C: ToolCaller> MemoryStore<C> {
    pub async fn rename_entity(&self, request: RenameRequest) -> Result<RenameOutcome> {
        let from = present(&request.from_name)
            .ok_or_else(|| Error::validation("fromName must be a non-empty string"))?;
        let to = present(&request.to_name)
            .ok_or_else(|| Error::validation("toName must be a non-empty string"))?;
        if from == to {
            return Err(Error::validation("fromName and toName must be different."));
        }

        let graph = self.read_graph().await?;
        let source = graph
            .entity(from)
            .ok_or_else(|| Error::not_found(format!("Entity not found: {}", from)))?;
        if graph.contains(to) {
            return Err(Error::conflict(format!("Target entity already exists: {}", to)));
        }

        let mut target = Entity::new(to).with_observations(source.observations.clone().unwrap_or_default());
        target.entity_type = request
            .to_type
            .as_deref()
            .and_then(present)
            .map(String::from)
            .or_else(|| source.entity_type.clone());

        let relinked: Vec<Relation> = graph
            .relations_touching(from)
            .map(|r| r.renamed(from, to))
            .collect();

        info!(from, to, relations = relinked.len(), "renaming entity");

        self.call("create_entities", json!({ "entities": [target] }))
            .await
            .map_err(|e| Error::rename_failed(RenameStage::CreateEntity, &e))?;

        if !relinked.is_empty() {
            self.call("create_relations", json!({ "relations": relinked }))
                .await
                .map_err(|e| Error::rename_failed(RenameStage::CreateRelations, &e))?;
        }

        self.call("delete_entities", json!({ "entityNames": [from] }))
            .await
            .map_err(|e| Error::rename_failed(RenameStage::DeleteEntity, &e))?;

        info!(from, to, "rename complete");
        Ok(RenameOutcome {
            created_relations: relinked.len(),
        })
    }
}

/// Non-blank strings pass through untouched; names are matched exactly.
fn present(s: &str) -> Option<&str> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
