use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tracing::instrument;

use super::Item;
use crate::{
    auth::require_bearer,
    error::{not_found, ApiError},
    state::AppState,
};

/// The same resource routes are mounted once per version; only the
/// authentication in front of them differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

impl ApiVersion {
    pub const ALL: [ApiVersion; 2] = [ApiVersion::V1, ApiVersion::V2];

    pub fn prefix(self) -> &'static str {
        match self {
            ApiVersion::V1 => "/api/v1",
            ApiVersion::V2 => "/api/v2",
        }
    }

    pub fn requires_bearer(self) -> bool {
        matches!(self, ApiVersion::V2)
    }
}

pub fn router(version: ApiVersion, state: AppState) -> Router<AppState> {
    let routes = Router::new()
        .route(
            "/:resource",
            get(list_items).post(create_item).fallback(not_found),
        )
        .route(
            "/:resource/:id",
            get(get_item)
                .put(update_item)
                .delete(delete_item)
                .fallback(not_found),
        );

    if version.requires_bearer() {
        routes.route_layer(middleware::from_fn_with_state(state, require_bearer))
    } else {
        routes
    }
}

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::Validation(format!("invalid id `{raw}`")))
}

#[instrument(skip(state))]
pub async fn list_items(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let Path(resource) = path?;
    let collection = state.collection(&resource)?;
    Ok(Json(collection.list(&state.db).await?))
}

#[instrument(skip(state))]
pub async fn get_item(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<Json<Item>, ApiError> {
    let Path((resource, id)) = path?;
    let collection = state.collection(&resource)?;
    let id = parse_id(&id)?;
    Ok(Json(collection.get(&state.db, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn create_item(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let Path(resource) = path?;
    let collection = state.collection(&resource)?;
    let Json(body) = payload?;
    Ok(Json(collection.create(&state.db, &body).await?))
}

#[instrument(skip(state, payload))]
pub async fn update_item(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let Path((resource, id)) = path?;
    let collection = state.collection(&resource)?;
    let id = parse_id(&id)?;
    let Json(body) = payload?;
    Ok(Json(collection.update(&state.db, id, &body).await?))
}

#[instrument(skip(state))]
pub async fn delete_item(
    State(state): State<AppState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path((resource, id)) = path?;
    let collection = state.collection(&resource)?;
    let id = parse_id(&id)?;
    collection.delete(&state.db, id).await?;
    Ok(StatusCode::OK)
}
