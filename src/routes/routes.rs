//! Defines routes for the gateway's file-tree operations.
//!
//! ## Structure
//! - **Folder endpoints**
//!   - `GET    /b2/folders?path=` — one-level listing (child folders + files)
//!   - `POST   /b2/folders` — create a virtual folder
//!   - `DELETE /b2/folders` — delete a folder and all its members
//!
//! - **File endpoints**
//!   - `POST   /b2/ingest` — fetch a remote URL into the bucket
//!   - `DELETE /b2/files` — delete one file by id + key
//!
//! Paths are carried as query/body values, never as URL segments, so nested
//! virtual paths like `photos/2025` need no wildcard routing.

use crate::{
    handlers::{
        gateway_handlers::{
            create_folder, delete_file, delete_folder, ingest_file, list_directory,
        },
        health_handlers::{healthz, readyz},
    },
    services::gateway_service::GatewayService,
};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Build and return the router for all gateway routes.
///
/// The router carries shared state (`GatewayService`) to all handlers.
pub fn routes() -> Router<GatewayService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Folder endpoints
        .route(
            "/b2/folders",
            get(list_directory).post(create_folder).delete(delete_folder),
        )
        // File endpoints
        .route("/b2/ingest", post(ingest_file))
        .route("/b2/files", delete(delete_file))
}
