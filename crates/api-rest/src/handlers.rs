//! Request handlers.
//!
//! Every handler answers with its JSON response body, `success: false` plus an `error`
//! message on failure, and a status code that matches.

use crate::AppState;
use api_shared::{
    DeleteTemplateRes, DocumentRes, HealthRes, HealthService, ListTemplatesRes, SaveTemplateRes,
    SearchRes, SignatureRole, SignaturesRes, UploadSignatureRes,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use medforms_core::{FieldStore, FormsError, PersistenceService};
use medforms_store::{FileStore, StoreError};
use serde::Deserialize;
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

type Reply<T> = (StatusCode, Json<T>);

fn status_for(err: &FormsError) -> StatusCode {
    match err {
        FormsError::Validation(_)
        | FormsError::InvalidInput(_)
        | FormsError::UnknownField { .. }
        | FormsError::UnknownDocumentType(_)
        | FormsError::Text(_) => StatusCode::BAD_REQUEST,
        FormsError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn log_failure(action: &str, err: &FormsError) {
    if status_for(err).is_server_error() {
        tracing::error!("{action} failed: {err}");
    } else {
        tracing::warn!("{action} rejected: {err}");
    }
}

/// Multipart body of `POST /api/upload-signature`.
#[derive(Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct UploadSignatureForm {
    /// PNG, JPEG or GIF image.
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    /// Which signature the image is for. Defaults to `doctor`.
    #[serde(rename = "type")]
    role: Option<SignatureRole>,
}

#[derive(Deserialize, IntoParams)]
pub struct SearchParams {
    /// Case-insensitive search text.
    q: Option<String>,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/api/templates",
    responses(
        (status = 200, description = "Stored templates", body = ListTemplatesRes),
        (status = 500, description = "Templates could not be read", body = ListTemplatesRes)
    )
)]
pub async fn list_templates(State(state): State<AppState>) -> Reply<ListTemplatesRes> {
    match PersistenceService::list_templates(state.store().as_ref()).await {
        Ok(res) => (StatusCode::OK, Json(res)),
        Err(e) => {
            log_failure("list templates", &e);
            (
                status_for(&e),
                Json(ListTemplatesRes {
                    success: false,
                    templates: Vec::new(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/templates",
    request_body(content = BTreeMap<String, String>, description = "Form fields plus `template_name` and `document_type`"),
    responses(
        (status = 200, description = "Template saved", body = SaveTemplateRes),
        (status = 500, description = "Template could not be written", body = SaveTemplateRes)
    )
)]
pub async fn save_template(
    State(state): State<AppState>,
    Json(data): Json<FieldStore>,
) -> Reply<SaveTemplateRes> {
    match PersistenceService::save_template(state.store().as_ref(), data).await {
        Ok(res) => (StatusCode::OK, Json(res)),
        Err(e) => {
            log_failure("save template", &e);
            (
                status_for(&e),
                Json(SaveTemplateRes {
                    success: false,
                    error: Some(e.to_string()),
                    ..Default::default()
                }),
            )
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/templates/{id}",
    params(("id" = String, Path, description = "Template id, the stored file name without `.json`")),
    responses(
        (status = 200, description = "Template deleted", body = DeleteTemplateRes),
        (status = 400, description = "Unsafe id", body = DeleteTemplateRes),
        (status = 404, description = "No such template", body = DeleteTemplateRes)
    )
)]
pub async fn delete_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Reply<DeleteTemplateRes> {
    match PersistenceService::delete_template(state.store().as_ref(), &id).await {
        Ok(res) if res.success => (StatusCode::OK, Json(res)),
        Ok(res) => (StatusCode::NOT_FOUND, Json(res)),
        Err(e) => {
            log_failure("delete template", &e);
            (
                status_for(&e),
                Json(DeleteTemplateRes {
                    success: false,
                    message: None,
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

fn document_reply(action: &str, result: Result<DocumentRes, FormsError>) -> Reply<DocumentRes> {
    match result {
        Ok(res) => (StatusCode::OK, Json(res)),
        Err(e) => {
            log_failure(action, &e);
            (
                status_for(&e),
                Json(DocumentRes {
                    success: false,
                    error: Some(e.to_string()),
                    ..Default::default()
                }),
            )
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/save-document",
    request_body(content = BTreeMap<String, String>, description = "Form fields plus `document_type` and `filename`"),
    responses(
        (status = 200, description = "Document saved", body = DocumentRes),
        (status = 500, description = "Document could not be written", body = DocumentRes)
    )
)]
pub async fn save_document(
    State(state): State<AppState>,
    Json(data): Json<FieldStore>,
) -> Reply<DocumentRes> {
    let result = PersistenceService::save_document(state.store().as_ref(), data).await;
    document_reply("save document", result)
}

#[utoipa::path(
    post,
    path = "/api/print-document",
    request_body(content = BTreeMap<String, String>, description = "Form fields plus `document_type`"),
    responses(
        (status = 200, description = "Print copy written", body = DocumentRes),
        (status = 500, description = "Print copy could not be written", body = DocumentRes)
    )
)]
pub async fn print_document(
    State(state): State<AppState>,
    Json(data): Json<FieldStore>,
) -> Reply<DocumentRes> {
    let result = PersistenceService::print_document(state.store().as_ref(), data).await;
    document_reply("print document", result)
}

#[utoipa::path(
    get,
    path = "/api/download/{filename}",
    params(("filename" = String, Path, description = "Stored document file name")),
    responses(
        (status = 200, description = "The stored document", content_type = "application/json"),
        (status = 400, description = "Unsafe file name", body = DocumentRes),
        (status = 404, description = "No such document", body = DocumentRes)
    )
)]
pub async fn download(State(state): State<AppState>, Path(filename): Path<String>) -> Response {
    let store = FileStore::clone(state.store());
    let name = filename.clone();
    let result = tokio::task::spawn_blocking(move || store.read_document(&name)).await;

    let (status, error) = match result {
        Ok(Ok(bytes)) => {
            let disposition = if filename.is_ascii() && !filename.contains('"') {
                format!("attachment; filename=\"{filename}\"")
            } else {
                "attachment".to_string()
            };
            return (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/json".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response();
        }
        Ok(Err(StoreError::DocumentNotFound(_))) => {
            (StatusCode::NOT_FOUND, "file not found".to_string())
        }
        Ok(Err(e @ StoreError::InvalidName(_))) => (StatusCode::BAD_REQUEST, e.to_string()),
        Ok(Err(e)) => {
            tracing::error!("download failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            tracing::error!("download task failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    };
    let body = DocumentRes {
        success: false,
        error: Some(error),
        ..Default::default()
    };
    (status, Json(body)).into_response()
}

#[utoipa::path(
    post,
    path = "/api/upload-signature",
    request_body(content = UploadSignatureForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Signature stored", body = UploadSignatureRes),
        (status = 400, description = "Missing or unacceptable file", body = UploadSignatureRes)
    )
)]
pub async fn upload_signature(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Reply<UploadSignatureRes> {
    let rejected = |status: StatusCode, error: String| {
        tracing::warn!("signature upload rejected: {error}");
        (
            status,
            Json(UploadSignatureRes {
                success: false,
                error: Some(error),
                ..Default::default()
            }),
        )
    };

    let mut file: Option<Vec<u8>> = None;
    let mut role = SignatureRole::Doctor;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return rejected(e.status(), e.body_text()),
        };
        match field.name() {
            Some("file") => match field.bytes().await {
                Ok(bytes) => file = Some(bytes.to_vec()),
                Err(e) => return rejected(e.status(), e.body_text()),
            },
            Some("type") => {
                let text = match field.text().await {
                    Ok(text) => text,
                    Err(e) => return rejected(e.status(), e.body_text()),
                };
                role = match text.trim().parse() {
                    Ok(role) => role,
                    Err(e) => return rejected(StatusCode::BAD_REQUEST, e),
                };
            }
            _ => {}
        }
    }

    let Some(bytes) = file.filter(|b| !b.is_empty()) else {
        return rejected(StatusCode::BAD_REQUEST, "no file selected".into());
    };

    match state
        .store()
        .blocking(move |store| store.store_signature(role, bytes))
        .await
    {
        Ok(stored) => (
            StatusCode::OK,
            Json(UploadSignatureRes {
                success: true,
                base64: Some(stored.image.to_data_uri()),
                filename: Some(stored.filename),
                error: None,
            }),
        ),
        Err(e) => {
            log_failure("upload signature", &e);
            (
                status_for(&e),
                Json(UploadSignatureRes {
                    success: false,
                    error: Some(e.to_string()),
                    ..Default::default()
                }),
            )
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/get-signatures",
    responses(
        (status = 200, description = "Stored Form №100 signatures as data URIs", body = SignaturesRes)
    )
)]
pub async fn get_signatures(State(state): State<AppState>) -> Reply<SignaturesRes> {
    match PersistenceService::get_signatures(state.store().as_ref()).await {
        Ok(res) => (StatusCode::OK, Json(res)),
        Err(e) => {
            log_failure("get signatures", &e);
            (status_for(&e), Json(SignaturesRes::default()))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/search-patients",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching documents and templates", body = SearchRes)
    )
)]
pub async fn search_patients(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Reply<SearchRes> {
    let query = params.q.unwrap_or_default();
    match PersistenceService::search_patients(state.store().as_ref(), &query).await {
        Ok(res) => (StatusCode::OK, Json(res)),
        Err(e) => {
            log_failure("search", &e);
            (
                status_for(&e),
                Json(SearchRes {
                    success: false,
                    results: Vec::new(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
