use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use revolve_domain::{ResourceId, TransitionId};
use revolve_engine::daemons;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

// ── Health ────────────────────────────────────────────────────────────────────

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn ready(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.store.list_resources().await?;
    Ok(StatusCode::OK)
}

// ── Reconcile ─────────────────────────────────────────────────────────────────

/// Runs one tick of both daemon loops inline and reports what happened.
/// Grounded on `nclav-api::handlers::post_reconcile`, generalized from a
/// one-shot document-driven reconcile to triggering the standing daemon
/// loop's two scan functions on demand.
pub async fn post_reconcile(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let scheduled = daemons::create_missing_transitions(&*state.store).await?;
    let submitted = daemons::submit_transition_tasks(&*state.store, &state.runner).await?;
    Ok(Json(json!({ "transitions_scheduled": scheduled, "transitions_submitted": submitted })))
}

// ── Resources ─────────────────────────────────────────────────────────────────

pub async fn list_resources(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let resources = state.store.list_resources().await?;
    Ok(Json(json!(resources)))
}

pub async fn get_resource(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let resource_id = ResourceId::new(&id);
    let resource = state
        .store
        .get_resource(&resource_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("resource '{id}' not found")))?;
    Ok(Json(json!(resource)))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<u32>,
}

pub async fn list_resource_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<EventsQuery>,
) -> Result<Json<Value>, ApiError> {
    let resource_id = ResourceId::new(&id);
    let events = state.store.list_resource_events(Some(&resource_id), q.limit.unwrap_or(100)).await?;
    Ok(Json(json!(events)))
}

// ── Transitions ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TransitionsQuery {
    pub resource_id: Option<String>,
}

pub async fn list_transitions(
    State(state): State<AppState>,
    Query(q): Query<TransitionsQuery>,
) -> Result<Json<Value>, ApiError> {
    let resource_id = q.resource_id.map(ResourceId::new);
    let transitions = state.store.list_transitions(resource_id.as_ref()).await?;
    Ok(Json(json!(transitions)))
}

pub async fn get_transition(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let transition_id = parse_transition_id(&id)?;
    let transition = state
        .store
        .get_transition(&transition_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("transition '{id}' not found")))?;
    Ok(Json(json!(transition)))
}

pub async fn list_transition_events(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let transition_id = parse_transition_id(&id)?;
    let events = state.store.list_transition_events(&transition_id).await?;
    Ok(Json(json!(events)))
}

fn parse_transition_id(raw: &str) -> Result<TransitionId, ApiError> {
    uuid::Uuid::parse_str(raw)
        .map(TransitionId)
        .map_err(|_| ApiError::bad_request(format!("invalid transition id: {raw}")))
}

// ── Status ────────────────────────────────────────────────────────────────────

pub async fn status(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let resources = state.store.list_resources().await?;
    let transitions = state.store.list_transitions(None).await?;

    let mut resources_by_state: HashMap<String, usize> = HashMap::new();
    for r in &resources {
        *resources_by_state.entry(r.state.to_string()).or_default() += 1;
    }
    let mut transitions_by_status: HashMap<String, usize> = HashMap::new();
    for t in &transitions {
        *transitions_by_status.entry(t.status.to_string()).or_default() += 1;
    }

    Ok(Json(json!({
        "resource_count": resources.len(),
        "resources_by_state": resources_by_state,
        "transition_count": transitions.len(),
        "transitions_by_status": transitions_by_status,
    })))
}
