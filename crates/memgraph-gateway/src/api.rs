//! Memory API handlers
//!
//! Bodies are read as loose JSON and coerced field by field: a field of the
//! wrong type counts as missing, and list entries that are not strings are
//! dropped (contents) or reject the request (name lists). Semantic validation
//! lives in `MemoryStore`.

use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use memgraph_core::{Entity, Error, Relation};
use memgraph_mcp::RenameRequest;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

type ApiResult = Result<Json<Value>, ApiError>;
type Body = Result<Json<Value>, JsonRejection>;

fn parse_body(body: Body) -> Result<Value, ApiError> {
    body.map(|Json(v)| v)
        .map_err(|_| ApiError(Error::validation("Invalid JSON body.")))
}

fn str_field<'a>(body: &'a Value, key: &str) -> &'a str {
    body.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Every entry must be a string, or the whole list is rejected.
fn string_list(body: &Value, key: &str) -> Option<Vec<String>> {
    body.get(key)?
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(String::from))
        .collect()
}

/// Non-string entries are dropped.
fn string_items(body: &Value, key: &str) -> Vec<String> {
    body.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

fn flag(params: &HashMap<String, String>, key: &str) -> bool {
    params.get(key).map(String::as_str) == Some("1")
}

fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

// ---------------------------------------------------------------------------
// graph / nodes / search
// ---------------------------------------------------------------------------

pub async fn read_graph(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let graph = state.store.read_graph().await?;
    let mut payload = serde_json::to_value(&graph)?;
    if flag(&params, "raw") {
        payload["raw"] = graph.raw.clone();
    }
    Ok(Json(json!({ "ok": true, "graph": payload })))
}

pub async fn open_nodes(State(state): State<Arc<AppState>>, body: Body) -> ApiResult {
    let body = parse_body(body)?;
    let names = string_list(&body, "names")
        .ok_or_else(|| ApiError::invalid_body(r#"{ "names": string[] }"#))?;
    let nodes = state.store.open_nodes(names).await?;
    Ok(Json(json!({ "ok": true, "nodes": nodes })))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    q: String,
}

pub async fn search_nodes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> ApiResult {
    let results = state.store.search_nodes(&params.q).await?;
    Ok(Json(json!({ "ok": true, "results": results })))
}

// ---------------------------------------------------------------------------
// entities
// ---------------------------------------------------------------------------

pub async fn create_entities(State(state): State<Arc<AppState>>, body: Body) -> ApiResult {
    let body = parse_body(body)?;
    let entities: Vec<Entity> = body
        .get("entities")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .ok_or_else(|| {
            ApiError::invalid_body(
                r#"{ "entities": [{ "name": string, "entityType"?: string, "observations"?: string[] }] }"#,
            )
        })?;
    state.store.create_entities(entities).await?;
    Ok(ok())
}

pub async fn delete_entities(State(state): State<Arc<AppState>>, body: Body) -> ApiResult {
    let body = parse_body(body)?;
    let names = string_list(&body, "entityNames")
        .ok_or_else(|| ApiError::invalid_body(r#"{ "entityNames": string[] }"#))?;
    state.store.delete_entities(names).await?;
    Ok(ok())
}

pub async fn rename_entity(State(state): State<Arc<AppState>>, body: Body) -> ApiResult {
    let body = parse_body(body)?;
    let request = RenameRequest {
        from_name: str_field(&body, "fromName").to_string(),
        to_name: str_field(&body, "toName").to_string(),
        to_type: body.get("toType").and_then(Value::as_str).map(String::from),
    };
    let outcome = state.store.rename_entity(request).await?;
    Ok(Json(json!({ "ok": true, "createdRelations": outcome.created_relations })))
}

// ---------------------------------------------------------------------------
// relations
// ---------------------------------------------------------------------------

fn relations_body(body: &Value) -> Result<Vec<Relation>, ApiError> {
    body.get("relations")
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .ok_or_else(|| {
            ApiError::invalid_body(r#"{ "relations": [{ "from": string, "to": string, "relationType": string }] }"#)
        })
}

pub async fn create_relations(State(state): State<Arc<AppState>>, body: Body) -> ApiResult {
    let relations = relations_body(&parse_body(body)?)?;
    state.store.create_relations(relations).await?;
    Ok(ok())
}

pub async fn delete_relations(State(state): State<Arc<AppState>>, body: Body) -> ApiResult {
    let relations = relations_body(&parse_body(body)?)?;
    state.store.delete_relations(relations).await?;
    Ok(ok())
}

// ---------------------------------------------------------------------------
// observations
// ---------------------------------------------------------------------------

pub async fn add_observations(State(state): State<Arc<AppState>>, body: Body) -> ApiResult {
    let body = parse_body(body)?;
    let entity_name = str_field(&body, "entityName");
    let contents = string_items(&body, "contents");
    state.store.add_observations(entity_name, contents).await?;
    Ok(ok())
}

pub async fn delete_observations(State(state): State<Arc<AppState>>, body: Body) -> ApiResult {
    let body = parse_body(body)?;
    let entity_name = str_field(&body, "entityName");
    let observations = string_items(&body, "observations");
    state.store.delete_observations(entity_name, observations).await?;
    Ok(ok())
}

pub async fn update_observation(State(state): State<Arc<AppState>>, body: Body) -> ApiResult {
    let body = parse_body(body)?;
    let entity_name = str_field(&body, "entityName");
    let from = str_field(&body, "from");
    let to = str_field(&body, "to");
    let changed = state.store.update_observation(entity_name, from, to).await?;
    Ok(Json(json!({ "ok": true, "changed": changed })))
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

/// `?reset=1` drops the current connection first; `?connect=1` forces a
/// connect attempt. Without `connect` this never spawns anything.
///
/// The config and connection snapshot are always returned. A config that
/// fails to load or a failed connect makes it a 500 carrying `error`.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let manager = &state.manager;
    if flag(&params, "reset") {
        manager.reset();
    }

    let (config, mut error) = match manager.config() {
        Ok(config) => (serde_json::to_value(config)?, None),
        Err(e) => (Value::Null, Some(e.to_string())),
    };

    let mut connection = None;
    if error.is_none() && flag(&params, "connect") {
        match manager.acquire().await {
            Ok(conn) => connection = Some(conn.status()),
            Err(e) => error = Some(e.to_string()),
        }
    }
    let connection = connection.or_else(|| manager.peek());

    let mut body = json!({
        "ok": error.is_none(),
        "config": config,
        "connected": connection.is_some(),
        "connection": connection,
    });
    match error {
        None => Ok(Json(body).into_response()),
        Some(message) => {
            body["error"] = json!(message);
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response())
        }
    }
}
