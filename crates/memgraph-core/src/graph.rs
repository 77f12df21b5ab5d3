//! Canonical knowledge-graph shape and the normalizer that produces it.
//!
//! Stores export graphs in two conventions:
//!
//!   { "entities": [{ "name", "entityType", "observations" }], "relations": [{ "from", "to", "relationType" }] }
//!   { "nodes": [{ "id" | "name", "type" }], "edges": [{ "source", "target", "type" }] }
//!
//! `normalize` accepts either and never fails. Canonical arrays win; the
//! alternate arrays are consulted only when the canonical ones produce nothing,
//! independently for entities and relations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const ENTITY_FIELDS: &[&str] = &["name", "entityType", "observations"];
const RELATION_FIELDS: &[&str] = &["from", "to", "relationType"];

/// A uniquely-named node. Unknown store fields are kept in `extra`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "entityType", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: None,
            observations: None,
            extra: Map::new(),
        }
    }

    pub fn with_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn with_observations(mut self, observations: Vec<String>) -> Self {
        self.observations = Some(observations);
        self
    }
}

/// A typed directed edge between two entity names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub from: String,
    pub to: String,
    #[serde(rename = "relationType")]
    pub relation_type: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Relation {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
            extra: Map::new(),
        }
    }

    pub fn touches(&self, name: &str) -> bool {
        self.from == name || self.to == name
    }

    /// Copy of the core fields with every `old` endpoint replaced by `new`.
    pub fn renamed(&self, old: &str, new: &str) -> Relation {
        let swap = |endpoint: &str| {
            if endpoint == old {
                new.to_string()
            } else {
                endpoint.to_string()
            }
        };
        Relation::new(swap(&self.from), swap(&self.to), self.relation_type.clone())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CanonicalGraph {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
    /// The payload this graph was normalized from, kept for diagnostics.
    #[serde(skip)]
    pub raw: Value,
}

impl CanonicalGraph {
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entity(name).is_some()
    }

    pub fn relations_touching<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Relation> + 'a {
        self.relations.iter().filter(move |r| r.touches(name))
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }
}

/// Interpret any JSON value as a graph. Malformed entries are dropped.
pub fn normalize(raw: Value) -> CanonicalGraph {
    let mut entities = Vec::new();
    let mut relations = Vec::new();

    if let Some(obj) = raw.as_object() {
        entities = collect(obj.get("entities"), |e| entity_from(e, &["name"]));
        if entities.is_empty() {
            entities = collect(obj.get("nodes"), |n| entity_from(n, &["name", "id"]));
        }

        relations = collect(obj.get("relations"), |r| {
            relation_from(r, &["from"], &["to"])
        });
        if relations.is_empty() {
            relations = collect(obj.get("edges"), |e| {
                relation_from(e, &["from", "source"], &["to", "target"])
            });
        }
    }

    CanonicalGraph {
        entities,
        relations,
        raw,
    }
}

fn collect<T>(items: Option<&Value>, parse: impl Fn(&Map<String, Value>) -> Option<T>) -> Vec<T> {
    items
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_object).filter_map(parse).collect())
        .unwrap_or_default()
}

/// First key whose value is a non-blank string. The value is kept untrimmed.
fn first_non_blank(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    })
}

fn extra_fields(obj: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, _)| !known.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn entity_from(obj: &Map<String, Value>, name_keys: &[&str]) -> Option<Entity> {
    let name = first_non_blank(obj, name_keys)?;
    let observations = obj.get("observations").and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(|o| o.as_str().map(String::from))
            .collect()
    });

    Some(Entity {
        name,
        entity_type: first_non_blank(obj, &["entityType", "type"]),
        observations,
        extra: extra_fields(obj, ENTITY_FIELDS),
    })
}

fn relation_from(
    obj: &Map<String, Value>,
    from_keys: &[&str],
    to_keys: &[&str],
) -> Option<Relation> {
    Some(Relation {
        from: first_non_blank(obj, from_keys)?,
        to: first_non_blank(obj, to_keys)?,
        relation_type: first_non_blank(obj, &["relationType", "type"])?,
        extra: extra_fields(obj, RELATION_FIELDS),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renamed_rewrites_both_endpoints_of_a_self_loop() {
        let r = Relation::new("a", "a", "self").renamed("a", "b");
        assert_eq!(r, Relation::new("b", "b", "self"));
    }

    #[test]
    fn renamed_drops_extra_fields() {
        let mut r = Relation::new("a", "x", "knows");
        r.extra.insert("weight".into(), json!(3));
        assert!(r.renamed("a", "b").extra.is_empty());
    }

    #[test]
    fn blank_names_are_not_identities() {
        let g = normalize(json!({ "entities": [{ "name": "   " }] }));
        assert!(g.entities.is_empty());
    }
}
