//! Entity CRUD handlers: create, read, update, delete, list, page, batch.
//!
//! Every handler resolves the engine by path segment and renders the
//! standard envelope; unknown entities are a 404 like missing rows.

use crate::error::AppError;
use crate::page::{PageRequest, SortDirection, SortSpec};
use crate::response;
use crate::service::CrudEngine;
use crate::state::AppState;
use crate::storage::JsonObject;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

fn engine_for<'a>(state: &'a AppState, entity: &str) -> Result<&'a Arc<CrudEngine>, AppError> {
    state
        .registry
        .engine(entity)
        .ok_or_else(|| AppError::NotFound(format!("entity '{entity}'")))
}

fn body_to_map(value: Value) -> Result<JsonObject, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::Validation("body must be a JSON object".into())),
    }
}

fn sort_from(
    sort_by: Option<String>,
    sort_direction: Option<String>,
) -> Result<Option<SortSpec>, AppError> {
    let Some(field) = sort_by else {
        return Ok(None);
    };
    let direction = match sort_direction {
        Some(raw) => raw.parse::<SortDirection>().map_err(AppError::Validation)?,
        None => SortDirection::Asc,
    };
    Ok(Some(SortSpec { field, direction }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    sort_by: Option<String>,
    sort_direction: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    page: Option<u64>,
    size: Option<u64>,
    sort_by: Option<String>,
    sort_direction: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let engine = engine_for(&state, &entity)?;
    let stored = engine.create(body_to_map(body)?).await?;
    Ok(response::created(format!("{entity} created"), stored))
}

pub async fn create_batch(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let engine = engine_for(&state, &entity)?;
    let items = match body {
        Value::Array(arr) => {
            let mut out = Vec::with_capacity(arr.len());
            for v in arr {
                out.push(body_to_map(v)?);
            }
            out
        }
        _ => return Err(AppError::Validation("body must be a JSON array".into())),
    };
    let report = engine.create_batch(items).await?;
    Ok(response::ok(format!("{entity} batch processed"), report))
}

pub async fn list(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let engine = engine_for(&state, &entity)?;
    let sort = sort_from(query.sort_by, query.sort_direction)?;
    let rows = engine.find_all(sort).await?;
    Ok(response::ok(format!("{entity} list retrieved"), rows))
}

pub async fn page(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let engine = engine_for(&state, &entity)?;
    let size = query
        .size
        .unwrap_or(state.defaults.page_size)
        .min(state.defaults.max_page_size);
    let req = PageRequest {
        page: query.page.unwrap_or(0),
        size,
        sort: sort_from(query.sort_by, query.sort_direction)?,
    };
    let page = engine.find_page(req).await?;
    Ok(response::ok(format!("{entity} page retrieved"), page))
}

pub async fn count(
    State(state): State<AppState>,
    Path(entity): Path<String>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let engine = engine_for(&state, &entity)?;
    let n = engine.count().await?;
    Ok(response::ok(
        format!("{entity} counted"),
        serde_json::json!({ "count": n }),
    ))
}

pub async fn read(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let engine = engine_for(&state, &entity)?;
    let id = engine.parse_id(&id)?;
    let row = engine.find_by_id(&id).await?;
    Ok(response::ok(format!("{entity} retrieved"), row))
}

pub async fn exists(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let engine = engine_for(&state, &entity)?;
    let id = engine.parse_id(&id)?;
    let b = engine.exists(&id).await?;
    Ok(response::ok(
        format!("{entity} existence checked"),
        serde_json::json!({ "exists": b }),
    ))
}

pub async fn update(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let engine = engine_for(&state, &entity)?;
    let id = engine.parse_id(&id)?;
    let row = engine.update(&id, body_to_map(body)?).await?;
    Ok(response::ok(format!("{entity} updated"), row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let engine = engine_for(&state, &entity)?;
    let id = engine.parse_id(&id)?;
    engine.delete(&id).await?;
    Ok(response::ok_empty(format!("{entity} deleted")))
}
