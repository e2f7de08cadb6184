//! HTTP handlers for the gateway operations.
//! Validates request shapes, then delegates to `GatewayService`; all
//! storage semantics live in the service layer.

use crate::{
    errors::AppError,
    keys,
    models::entry::{DirectoryListing, IngestReceipt},
    services::gateway_service::GatewayService,
};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Query params for `GET /b2/folders`.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Virtual directory path; missing or empty means the bucket root.
    pub path: Option<String>,
}

/// Request body for `POST /b2/ingest`.
#[derive(Debug, Deserialize)]
pub struct IngestReq {
    pub url: String,
    #[serde(default)]
    pub folder: String,
    pub file_name: Option<String>,
    pub display_name: Option<String>,
}

/// Request body for `POST /b2/folders` and `DELETE /b2/folders`.
#[derive(Debug, Deserialize)]
pub struct FolderReq {
    pub path: String,
}

/// Request body for `DELETE /b2/files`.
#[derive(Debug, Deserialize)]
pub struct DeleteFileReq {
    pub file_id: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct CreateFolderResp {
    pub folder_key: String,
}

/// GET `/b2/folders?path=` — one-level directory listing.
pub async fn list_directory(
    State(service): State<GatewayService>,
    Query(q): Query<ListQuery>,
) -> Result<Json<DirectoryListing>, AppError> {
    let path = q.path.unwrap_or_default();
    info!("list `{}`", path);
    let listing = service.list(&path).await?;
    Ok(Json(listing))
}

/// POST `/b2/ingest` — fetch a remote URL into the bucket.
pub async fn ingest_file(
    State(service): State<GatewayService>,
    Json(req): Json<IngestReq>,
) -> Result<(StatusCode, Json<IngestReceipt>), AppError> {
    let url = req.url.trim();
    if url.is_empty() {
        return Err(AppError::bad_request("url is required"));
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(AppError::bad_request("url must be http or https"));
    }

    info!("ingest `{}` into `{}`", url, req.folder);
    let receipt = service
        .ingest(
            url,
            &req.folder,
            req.file_name.as_deref(),
            req.display_name.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST `/b2/folders` — create a virtual folder via its placeholder.
pub async fn create_folder(
    State(service): State<GatewayService>,
    Json(req): Json<FolderReq>,
) -> Result<(StatusCode, Json<CreateFolderResp>), AppError> {
    if keys::normalize_folder_path(&req.path).is_empty() {
        return Err(AppError::bad_request("folder path is required"));
    }

    info!("create folder `{}`", req.path);
    let folder_key = service.create_folder(&req.path).await?;
    Ok((StatusCode::CREATED, Json(CreateFolderResp { folder_key })))
}

/// DELETE `/b2/folders` — remove a folder and all members.
pub async fn delete_folder(
    State(service): State<GatewayService>,
    Json(req): Json<FolderReq>,
) -> Result<impl IntoResponse, AppError> {
    if keys::normalize_folder_path(&req.path).is_empty() {
        return Err(AppError::bad_request("folder path is required"));
    }

    info!("delete folder `{}`", req.path);
    service.delete_folder(&req.path).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE `/b2/files` — remove one file by id + key.
pub async fn delete_file(
    State(service): State<GatewayService>,
    Json(req): Json<DeleteFileReq>,
) -> Result<impl IntoResponse, AppError> {
    if req.file_id.trim().is_empty() || req.key.trim().is_empty() {
        return Err(AppError::bad_request("file_id and key are required"));
    }

    info!("delete file `{}` ({})", req.key, req.file_id);
    service.delete_file(&req.file_id, &req.key).await?;
    Ok(StatusCode::NO_CONTENT)
}
