//! The persistence seam.
//!
//! The core never stores anything itself. Templates, documents, signatures and search
//! all go through a [`PersistenceService`], which may be the file-backed store in
//! `medforms-store`, an HTTP client, or an in-memory fake in tests.
//!
//! Implementations return `Err(FormsError::Persistence)` for transport failures and an
//! `Ok` response with `success: false` when the backend itself refused the request.
//! Callers treat both the same way.

use crate::fields::FieldStore;
use crate::FormsResult;
use api_shared::{
    DeleteTemplateRes, DocumentRes, ListTemplatesRes, SaveTemplateRes, SearchRes, SignatureRole,
    SignaturesRes,
};
use async_trait::async_trait;

#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn list_templates(&self) -> FormsResult<ListTemplatesRes>;

    /// `data` carries the form fields plus `document_type` and `template_name`.
    async fn save_template(&self, data: FieldStore) -> FormsResult<SaveTemplateRes>;

    async fn delete_template(&self, id: &str) -> FormsResult<DeleteTemplateRes>;

    /// `data` carries the form fields plus `document_type` and `filename`.
    async fn save_document(&self, data: FieldStore) -> FormsResult<DocumentRes>;

    async fn print_document(&self, data: FieldStore) -> FormsResult<DocumentRes>;

    /// Best-effort: callers log failures and carry on.
    async fn upload_signature(&self, bytes: Vec<u8>, role: SignatureRole) -> FormsResult<()>;

    async fn get_signatures(&self) -> FormsResult<SignaturesRes>;

    async fn search_patients(&self, query: &str) -> FormsResult<SearchRes>;
}
