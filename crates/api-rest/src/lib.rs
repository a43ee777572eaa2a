//! # API REST
//!
//! REST API implementation for MedForms.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, multipart uploads)
//!
//! Uses `api-shared` for the request and response bodies and `medforms-store` for storage.

#![warn(rust_2018_idioms)]

mod handlers;

use api_shared::{
    DeleteTemplateRes, DocumentRes, HealthRes, ListTemplatesRes, SaveTemplateRes, SearchHit,
    SearchRes, SignatureRole, Signatures, SignaturesRes, TemplateRecord, UploadSignatureRes,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use medforms_core::CoreConfig;
use medforms_store::{FileStore, StoreResult};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use handlers::UploadSignatureForm;

/// Address the server binds when `MEDFORMS_ADDR` is unset.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";

/// Slack on top of the signature ceiling for multipart framing.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Application state shared across REST API handlers
#[derive(Clone)]
pub struct AppState {
    cfg: Arc<CoreConfig>,
    store: Arc<FileStore>,
}

impl AppState {
    /// Opens the file store under the configured data directory.
    pub fn new(cfg: Arc<CoreConfig>) -> StoreResult<Self> {
        let store = Arc::new(FileStore::open(&cfg)?);
        Ok(Self { cfg, store })
    }

    pub fn store(&self) -> &Arc<FileStore> {
        &self.store
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_templates,
        handlers::save_template,
        handlers::delete_template,
        handlers::save_document,
        handlers::print_document,
        handlers::download,
        handlers::upload_signature,
        handlers::get_signatures,
        handlers::search_patients,
    ),
    components(schemas(
        HealthRes,
        TemplateRecord,
        ListTemplatesRes,
        SaveTemplateRes,
        DeleteTemplateRes,
        DocumentRes,
        SignatureRole,
        UploadSignatureForm,
        UploadSignatureRes,
        Signatures,
        SignaturesRes,
        SearchHit,
        SearchRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full router: API routes, Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    let upload_limit = state
        .cfg
        .signature_max_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);
    let upload_limit = usize::try_from(upload_limit).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/templates",
            get(handlers::list_templates).post(handlers::save_template),
        )
        .route("/api/templates/:id", delete(handlers::delete_template))
        .route("/api/save-document", post(handlers::save_document))
        .route("/api/print-document", post(handlers::print_document))
        .route("/api/download/:filename", get(handlers::download))
        .route(
            "/api/upload-signature",
            post(handlers::upload_signature).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/get-signatures", get(handlers::get_signatures))
        .route("/api/search-patients", get(handlers::search_patients))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Listen address from an optional `MEDFORMS_ADDR` value.
pub fn listen_addr_from_env_value(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
}
