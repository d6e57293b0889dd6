//! Item CRUD, one-time tickets, and signed export URLs.
//!
//! Contract highlights:
//! - Creating a duplicate name is 409; the race between concurrent creates
//!   of the same name has exactly one winner.
//! - Updates carry the expected version; a stale version is 409.
//! - Deletes race to a single 204; later attempts see 404.
//! - Tickets are consumable exactly once; the second consumer sees 409.
//! - Export URLs carry an HMAC signature; tampering yields 403.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::{bearer_token, map_json_rejection};
use crate::state::{AppState, AuthContext, ConsumeError, UpdateError};

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub version: u64,
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub sig: Option<String>,
}

/// `POST /items`
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<CreateItemRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => return map_json_rejection(rejection).into_response(),
    };
    if request.name.trim().is_empty() {
        return ApiError::unprocessable("item name is required").into_response();
    }

    let mut stores = state.stores.lock().await;
    let auth = match authorize(&headers, &stores) {
        Ok(auth) => auth,
        Err(err) => return err.into_response(),
    };

    match stores.create_item(request.name.trim(), auth.user_id) {
        Ok((id, item)) => (
            StatusCode::CREATED,
            Json(json!({ "id": id, "name": item.name, "version": item.version })),
        )
            .into_response(),
        Err(()) => ApiError::conflict(state.detail(
            "item name already exists",
            "IntegrityError: duplicate key value violates unique constraint \
             \"items_name_key\" in /app/models/item.py",
        ))
        .into_response(),
    }
}

/// `GET /items/{id}`
pub async fn get_item(State(state): State<Arc<AppState>>, Path(id): Path<u64>) -> Response {
    let stores = state.stores.lock().await;
    match stores.item(id) {
        Some(item) => (
            StatusCode::OK,
            Json(json!({
                "id": id,
                "name": item.name,
                "version": item.version,
                "owner": item.owner,
            })),
        )
            .into_response(),
        None => item_not_found(&state).into_response(),
    }
}

/// `PUT /items/{id}`
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    payload: Result<Json<UpdateItemRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(json) => json,
        Err(rejection) => return map_json_rejection(rejection).into_response(),
    };

    let mut stores = state.stores.lock().await;
    if let Err(err) = authorize(&headers, &stores) {
        return err.into_response();
    }

    match stores.update_item(id, request.version, request.name.as_deref()) {
        Ok(item) => (
            StatusCode::OK,
            Json(json!({ "id": id, "name": item.name, "version": item.version })),
        )
            .into_response(),
        Err(UpdateError::NotFound) => item_not_found(&state).into_response(),
        Err(UpdateError::VersionConflict) => {
            ApiError::conflict("version conflict").into_response()
        }
    }
}

/// `DELETE /items/{id}`
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    let mut stores = state.stores.lock().await;
    if let Err(err) = authorize(&headers, &stores) {
        return err.into_response();
    }

    if stores.delete_item(id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        item_not_found(&state).into_response()
    }
}

/// `GET /items/{id}/export_url` — hand out a signed export link.
pub async fn export_url(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    let stores = state.stores.lock().await;
    if let Err(err) = authorize(&headers, &stores) {
        return err.into_response();
    }
    if stores.item(id).is_none() {
        return item_not_found(&state).into_response();
    }

    let sig = state.export_signature(id);
    (
        StatusCode::OK,
        Json(json!({ "url": format!("/items/{id}/export?sig={sig}") })),
    )
        .into_response()
}

/// `GET /items/{id}/export` — the signature is the only credential here.
pub async fn export_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let expected = state.export_signature(id);
    if query.sig.as_deref() != Some(expected.as_str()) {
        return ApiError::forbidden("invalid export signature").into_response();
    }

    let stores = state.stores.lock().await;
    match stores.item(id) {
        Some(item) => (
            StatusCode::OK,
            Json(json!({ "id": id, "name": item.name, "version": item.version })),
        )
            .into_response(),
        None => item_not_found(&state).into_response(),
    }
}

/// `POST /tickets`
pub async fn create_ticket(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let mut stores = state.stores.lock().await;
    if let Err(err) = authorize(&headers, &stores) {
        return err.into_response();
    }
    let id = stores.create_ticket();
    (StatusCode::CREATED, Json(json!({ "id": id }))).into_response()
}

/// `POST /tickets/{id}/consume`
pub async fn consume_ticket(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> Response {
    let mut stores = state.stores.lock().await;
    if let Err(err) = authorize(&headers, &stores) {
        return err.into_response();
    }

    match stores.consume_ticket(id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "detail": "consumed" }))).into_response(),
        Err(ConsumeError::AlreadyConsumed) => {
            ApiError::conflict("ticket already consumed").into_response()
        }
        Err(ConsumeError::NotFound) => {
            ApiError::not_found("ticket not found").into_response()
        }
    }
}

fn authorize(
    headers: &HeaderMap,
    stores: &crate::state::Stores,
) -> Result<AuthContext, ApiError> {
    let token = bearer_token(headers).ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    stores
        .authenticate(&token)
        .ok_or_else(|| ApiError::unauthorized("invalid bearer token"))
}

fn item_not_found(state: &AppState) -> ApiError {
    ApiError::not_found(state.detail(
        "item not found",
        "item not found: Traceback (most recent call last): File \"/app/routes/items.py\", line 42",
    ))
}
