//! Typed graph operations over any [`ToolCaller`]
//!
//! Inputs are validated here, before anything reaches the store.

use crate::invoker::ToolCaller;
use memgraph_core::{normalize, CanonicalGraph, Entity, Error, Relation, Result};
use serde_json::{json, Value};
use tracing::debug;

pub struct MemoryStore<C> {
    caller: C,
}

impl<C: ToolCaller> MemoryStore<C> {
    pub fn new(caller: C) -> Self {
        Self { caller }
    }

    pub fn caller(&self) -> &C {
        &self.caller
    }

    pub(crate) async fn call(&self, tool: &str, arguments: Value) -> Result<Value> {
        self.caller.call_tool(tool, arguments).await
    }

    pub async fn read_graph(&self) -> Result<CanonicalGraph> {
        let raw = self.call("read_graph", json!({})).await?;
        let graph = normalize(raw);
        debug!(
            entities = graph.entities.len(),
            relations = graph.relations.len(),
            "read graph"
        );
        Ok(graph)
    }

    pub async fn open_nodes(&self, names: Vec<String>) -> Result<Value> {
        let names = required_names(names, "names")?;
        self.call("open_nodes", json!({ "names": names })).await
    }

    /// Blank queries short-circuit to an empty result.
    pub async fn search_nodes(&self, query: &str) -> Result<Value> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(json!([]));
        }
        self.call("search_nodes", json!({ "query": query })).await
    }

    pub async fn create_entities(&self, entities: Vec<Entity>) -> Result<()> {
        if entities.is_empty() {
            return Err(Error::validation("at least one entity is required"));
        }
        let entities = entities
            .into_iter()
            .map(|mut e| {
                e.name = required(&e.name, "entity name")?;
                Ok(e)
            })
            .collect::<Result<Vec<_>>>()?;
        self.call("create_entities", json!({ "entities": entities }))
            .await
            .map(drop)
    }

    pub async fn delete_entities(&self, names: Vec<String>) -> Result<()> {
        let names = required_names(names, "entityNames")?;
        self.call("delete_entities", json!({ "entityNames": names }))
            .await
            .map(drop)
    }

    pub async fn create_relations(&self, relations: Vec<Relation>) -> Result<()> {
        let relations = checked_relations(relations)?;
        self.call("create_relations", json!({ "relations": relations }))
            .await
            .map(drop)
    }

    pub async fn delete_relations(&self, relations: Vec<Relation>) -> Result<()> {
        let relations = checked_relations(relations)?;
        self.call("delete_relations", json!({ "relations": relations }))
            .await
            .map(drop)
    }

    /// Blank contents are dropped; at least one must remain.
    pub async fn add_observations(&self, entity_name: &str, contents: Vec<String>) -> Result<()> {
        let entity_name = required(entity_name, "entityName")?;
        let contents = non_blank(contents);
        if contents.is_empty() {
            return Err(Error::validation("at least one non-empty content string is required"));
        }
        self.call(
            "add_observations",
            json!({ "observations": [{ "entityName": entity_name, "contents": contents }] }),
        )
        .await
        .map(drop)
    }

    pub async fn delete_observations(&self, entity_name: &str, observations: Vec<String>) -> Result<()> {
        let entity_name = required(entity_name, "entityName")?;
        let observations = non_blank(observations);
        if observations.is_empty() {
            return Err(Error::validation("at least one non-empty observation is required"));
        }
        self.call(
            "delete_observations",
            json!({ "deletions": [{ "entityName": entity_name, "observations": observations }] }),
        )
        .await
        .map(drop)
    }

    /// Replace one observation with another: delete, then add. Returns `false`
    /// when the two are identical and nothing was sent.
    pub async fn update_observation(&self, entity_name: &str, from: &str, to: &str) -> Result<bool> {
        let entity_name = required(entity_name, "entityName")?;
        let from = required(from, "from")?;
        let to = required(to, "to")?;
        if from == to {
            return Ok(false);
        }
        self.delete_observations(&entity_name, vec![from]).await?;
        self.add_observations(&entity_name, vec![to]).await?;
        Ok(true)
    }
}

fn required(value: &str, field: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("{} must be a non-empty string", field)));
    }
    Ok(value.to_string())
}

fn required_names(names: Vec<String>, field: &str) -> Result<Vec<String>> {
    if names.is_empty() {
        return Err(Error::validation(format!("{} must be a non-empty list of names", field)));
    }
    names.iter().map(|n| required(n, field)).collect()
}

fn non_blank(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn checked_relations(relations: Vec<Relation>) -> Result<Vec<Relation>> {
    if relations.is_empty() {
        return Err(Error::validation("at least one relation is required"));
    }
    relations
        .into_iter()
        .map(|mut r| {
            r.from = required(&r.from, "from")?;
            r.to = required(&r.to, "to")?;
            r.relation_type = required(&r.relation_type, "relationType")?;
            Ok(r)
        })
        .collect()
}
