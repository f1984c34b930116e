//! Component I — HTTP Surface.
//!
//! Wires the routes in §6 onto the execution pipeline (G) and config store
//! (H). `/api/query/data` streams `application/x-ndjson`, backed by the
//! pipeline's bounded-channel row stream so a slow client throttles row
//! production rather than buffering unboundedly.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::StreamExt;

use crate::config_store::ConfigStore;
use crate::model::{DatabaseDescriptor, QueryRequest};
use crate::pipeline::QueryPipeline;
use crate::registry::ConnectionRegistry;
use crate::schema_cache::SchemaCache;

use super::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<QueryPipeline>,
    pub config_store: Arc<dyn ConfigStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub schema_cache: Arc<SchemaCache>,
}

pub struct AppServer {
    pub router: Router,
}

impl AppServer {
    pub fn new(state: AppState) -> Self {
        let router = Router::new()
            .route("/api/query/data", post(query_data))
            .route("/api/query/count", post(query_count))
            .route("/api/query/delete", post(query_delete))
            .route("/api/query/schema", post(query_schema))
            .route("/api/configs", get(list_configs).post(create_config))
            .route(
                "/api/configs/{id}",
                get(get_config).put(update_config).delete(delete_config),
            )
            .with_state(state);
        Self { router }
    }
}

async fn query_data(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Response, ApiError> {
    let rows = state.pipeline.data(request).await?;
    let body_stream = rows.map(|item| match item {
        Ok(line) => Ok::<_, std::io::Error>(Bytes::from(format!("{line}\n"))),
        Err(e) => Err(std::io::Error::other(e.to_string())),
    });
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(body_stream))
        .expect("static headers/status always build a valid response"))
}

async fn query_count(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let value = state.pipeline.count(&request).await?;
    Ok(Json(serde_json::json!({ "value": value })))
}

async fn query_delete(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<u64>, ApiError> {
    let rows_deleted = state.pipeline.delete(&request).await?;
    if rows_deleted == 0 {
        return Err(ApiError::not_found("no rows matched the delete filter"));
    }
    Ok(Json(rows_deleted))
}

async fn query_schema(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<std::collections::HashMap<String, String>>, ApiError> {
    let schema = state.pipeline.schema(&request).await?;
    Ok(Json(schema))
}

async fn list_configs(
    State(state): State<AppState>,
) -> Result<Json<Vec<DatabaseDescriptor>>, ApiError> {
    let configs = state.config_store.list_all().await?;
    Ok(Json(configs))
}

async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DatabaseDescriptor>, ApiError> {
    let config = state
        .config_store
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no descriptor with id {id}")))?;
    Ok(Json(config))
}

async fn create_config(
    State(state): State<AppState>,
    Json(descriptor): Json<DatabaseDescriptor>,
) -> Result<Json<DatabaseDescriptor>, ApiError> {
    state.registry.verify_descriptor(&descriptor).await?;
    let created = state.config_store.insert(descriptor).await?;
    Ok(Json(created))
}

async fn update_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(descriptor): Json<DatabaseDescriptor>,
) -> Result<Json<DatabaseDescriptor>, ApiError> {
    state.registry.verify_descriptor(&descriptor).await?;
    let updated = state
        .config_store
        .update(&id, descriptor)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("no descriptor with id {id}")))?;
    state.registry.invalidate(&id).await;
    state.schema_cache.invalidate_descriptor(&id);
    Ok(Json(updated))
}

async fn delete_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state.config_store.delete(&id).await?;
    if !deleted {
        return Err(ApiError::not_found(format!("no descriptor with id {id}")));
    }
    state.registry.invalidate(&id).await;
    state.schema_cache.invalidate_descriptor(&id);
    Ok(StatusCode::NO_CONTENT)
}
