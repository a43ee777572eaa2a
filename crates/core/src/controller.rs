//! The session controller.
//!
//! [`FormsController`] owns one [`DocumentSession`] and drives the selector, the template
//! engine, the persistence service and the presentation surface on its behalf. Every
//! user-facing operation reports its outcome through
//! [`PresentationSurface::show_message`] as well as its return value.
//!
//! Async operations build their payload from the session before the first `.await`.
//! Responses are applied in the order they resolve; a slow search can overwrite the
//! results of a newer one.

use crate::config::CoreConfig;
use crate::constants::{DATE_FORMAT, FILENAME_KEY};
use crate::fields::{names, DocumentType};
use crate::persistence::PersistenceService;
use crate::presentation::{MessageKind, PresentationSurface};
use crate::selector::{Activation, DocumentTypeSelector, MergeOutcome};
use crate::session::{today, DocumentSession};
use crate::signature::SignatureImage;
use crate::sync::SyncOutcome;
use crate::templates::{ApplyReport, Template, TemplateEngine, TemplateId};
use crate::{FormsError, FormsResult};
use api_shared::{DocumentRes, SearchHit, SignatureRole};
use chrono::NaiveDate;
use std::sync::Arc;

const MERGE_MESSAGE: &str = "Medical record data copied into Form №100";

/// The form field an uploaded signature image is written to.
pub fn signature_field(role: SignatureRole) -> (DocumentType, &'static str) {
    match role {
        SignatureRole::Doctor => (DocumentType::Form100, names::DOCTOR_SIGNATURE_IMAGE),
        SignatureRole::Stamp => (DocumentType::Form100, names::STAMP_IMAGE),
        SignatureRole::Head => (DocumentType::Form100, names::HEAD_SIGNATURE_IMAGE),
        SignatureRole::MrDoctor => (DocumentType::MedicalRecord, names::DOCTOR_SIGNATURE_IMAGE),
    }
}

pub struct FormsController<P: ?Sized, S> {
    cfg: Arc<CoreConfig>,
    session: DocumentSession,
    selector: DocumentTypeSelector,
    engine: TemplateEngine<P>,
    persistence: Arc<P>,
    surface: S,
}

impl<P, S> FormsController<P, S>
where
    P: PersistenceService + ?Sized,
    S: PresentationSurface,
{
    pub fn new(cfg: Arc<CoreConfig>, persistence: Arc<P>, surface: S) -> Self {
        Self::with_session(cfg, persistence, surface, DocumentSession::new())
    }

    pub fn with_session(
        cfg: Arc<CoreConfig>,
        persistence: Arc<P>,
        surface: S,
        session: DocumentSession,
    ) -> Self {
        Self {
            cfg,
            session,
            selector: DocumentTypeSelector::new(),
            engine: TemplateEngine::new(persistence.clone()),
            persistence,
            surface,
        }
    }

    pub fn session(&self) -> &DocumentSession {
        &self.session
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn report<T>(&self, result: FormsResult<T>, success: impl FnOnce(&T) -> String) -> FormsResult<T> {
        match &result {
            Ok(value) => self.surface.show_message(MessageKind::Success, &success(value)),
            Err(e) => self.surface.show_message(MessageKind::Error, &error_text(e)),
        }
        result
    }

    /// A user edit. Notifies the field synchronizer.
    pub fn edit_field(
        &mut self,
        document_type: DocumentType,
        field: &str,
        value: &str,
    ) -> FormsResult<SyncOutcome> {
        self.session.edit_field(document_type, field, value)
    }

    pub fn activate(&mut self, document_type: DocumentType) -> Activation {
        let activation = self.selector.activate(&mut self.session, document_type);
        if let Some(MergeOutcome::Merged(_)) = &activation.merge {
            self.surface.show_message(MessageKind::Success, MERGE_MESSAGE);
        }
        activation
    }

    pub fn clear_form(&mut self) {
        self.selector.clear_form(&mut self.session, today());
        self.surface.show_message(MessageKind::Success, "Form cleared");
    }

    /// Default filename offered when saving: the patient's name with whitespace runs
    /// replaced by `_`, followed by the date.
    pub fn suggested_filename(&self, today: NaiveDate) -> String {
        let date = today.format(DATE_FORMAT);
        let patient = self.session.active_form().value(names::PATIENT_NAME).trim();
        if patient.is_empty() {
            return format!("document_{date}");
        }
        let joined = patient.split_whitespace().collect::<Vec<_>>().join("_");
        format!("{joined}_{date}")
    }

    pub async fn save_document(&mut self, filename: &str) -> FormsResult<DocumentRes> {
        let result = self.save_document_inner(filename).await;
        self.report(result, |res| {
            format!("Saved {}", res.filename.as_deref().unwrap_or("document"))
        })
    }

    async fn save_document_inner(&self, filename: &str) -> FormsResult<DocumentRes> {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(FormsError::Validation("enter a file name".into()));
        }

        let mut payload = self.session.active_form().snapshot();
        payload.insert(FILENAME_KEY, filename);

        let res = self.persistence.save_document(payload).await?;
        ensure_success(res.success, res.error.as_deref(), "document was not saved")?;
        tracing::info!(filename = ?res.filename, "document saved");
        Ok(res)
    }

    pub async fn print_document(&mut self) -> FormsResult<DocumentRes> {
        let payload = self.session.active_form().snapshot();
        let result = async {
            let res = self.persistence.print_document(payload).await?;
            ensure_success(res.success, res.error.as_deref(), "document was not rendered")?;
            Ok::<_, FormsError>(res)
        }
        .await;
        self.report(result, |_| "Document ready".to_string())
    }

    /// Saves the active form as a template, then refreshes the template list.
    pub async fn save_template(&mut self, name: &str) -> FormsResult<TemplateId> {
        let document_type = self.session.current_document_type();
        let fields = self.session.active_form().snapshot();
        let result = self.engine.save_template(name, document_type, fields).await;
        let result = self.report(result, |_| "Template saved".to_string());
        if result.is_ok() {
            // A failed refresh already reported itself.
            let _ = self.load_templates().await;
        }
        result
    }

    pub async fn load_templates(&self) -> FormsResult<Vec<Template>> {
        match self.engine.list_templates().await {
            Ok(templates) => {
                self.surface.render_templates(&templates);
                Ok(templates)
            }
            Err(e) => {
                self.surface.show_message(MessageKind::Error, &error_text(&e));
                Err(e)
            }
        }
    }

    /// Looks the template up in a fresh listing and applies it.
    pub async fn use_template(&mut self, id: &str) -> FormsResult<ApplyReport> {
        let template = match self.engine.find_template(id).await {
            Ok(template) => template,
            Err(e) => {
                self.surface.show_message(MessageKind::Error, &error_text(&e));
                return Err(e);
            }
        };

        let result = self.engine.apply_template(&mut self.session, &template);
        if let Ok(ApplyReport {
            merge: Some(MergeOutcome::Merged(_)),
            ..
        }) = &result
        {
            self.surface.show_message(MessageKind::Success, MERGE_MESSAGE);
        }
        self.report(result, |_| format!("Template loaded: {}", template.name))
    }

    /// Deletes a template, then refreshes the template list.
    pub async fn delete_template(&mut self, id: &str) -> FormsResult<bool> {
        let result = self.engine.delete_template(id).await;
        match &result {
            Ok(true) => self.surface.show_message(MessageKind::Success, "Deleted"),
            Ok(false) => self
                .surface
                .show_message(MessageKind::Error, "Error: template could not be deleted"),
            Err(e) => self.surface.show_message(MessageKind::Error, &error_text(e)),
        }
        // A failed refresh already reported itself.
        let _ = self.load_templates().await;
        result
    }

    /// Validates an image and writes it into the role's signature field as a `data:` URI.
    ///
    /// Storing the image with the service is best-effort: a failure is logged and the
    /// field keeps the image.
    pub async fn upload_signature(
        &mut self,
        role: SignatureRole,
        bytes: Vec<u8>,
    ) -> FormsResult<()> {
        let image = match SignatureImage::from_upload(bytes, self.cfg.signature_max_bytes()) {
            Ok(image) => image,
            Err(e) => {
                self.surface.show_message(MessageKind::Error, &error_text(&e));
                return Err(e);
            }
        };

        let (document_type, field) = signature_field(role);
        self.session
            .form_mut(document_type)
            .set(field, image.to_data_uri());
        self.surface.show_message(MessageKind::Success, "Uploaded");

        if let Err(e) = self
            .persistence
            .upload_signature(image.into_bytes(), role)
            .await
        {
            tracing::warn!(%role, "signature not stored: {}", e);
        }
        Ok(())
    }

    pub fn clear_signature(&mut self, role: SignatureRole) {
        let (document_type, field) = signature_field(role);
        self.session.form_mut(document_type).set(field, "");
    }

    /// Fills the Form №100 signature fields from stored images. Returns how many were set.
    ///
    /// Failures are logged, never shown.
    pub async fn load_saved_signatures(&mut self) -> usize {
        let res = match self.persistence.get_signatures().await {
            Ok(res) if res.success => res,
            Ok(_) => return 0,
            Err(e) => {
                tracing::warn!("could not load saved signatures: {}", e);
                return 0;
            }
        };

        let stored = [
            (SignatureRole::Doctor, res.signatures.doctor),
            (SignatureRole::Stamp, res.signatures.stamp),
            (SignatureRole::Head, res.signatures.head),
        ];
        let mut filled = 0;
        for (role, uri) in stored {
            let Some(uri) = uri.filter(|u| !u.is_empty()) else {
                continue;
            };
            let (document_type, field) = signature_field(role);
            if self.session.form_mut(document_type).set(field, uri) {
                filled += 1;
            }
        }
        filled
    }

    /// Searches saved documents and templates and renders the hits.
    pub async fn search(&self, query: &str) -> FormsResult<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            self.surface.render_search_results(&[]);
            return Ok(Vec::new());
        }

        let result = async {
            let res = self.persistence.search_patients(query).await?;
            ensure_success(res.success, res.error.as_deref(), "search failed")?;
            Ok::<_, FormsError>(res.results)
        }
        .await;

        match result {
            Ok(results) => {
                self.surface.render_search_results(&results);
                Ok(results)
            }
            Err(e) => {
                self.surface.show_message(MessageKind::Error, &error_text(&e));
                Err(e)
            }
        }
    }
}

fn ensure_success(success: bool, error: Option<&str>, fallback: &str) -> FormsResult<()> {
    if success {
        Ok(())
    } else {
        Err(FormsError::Persistence(error.unwrap_or(fallback).to_string()))
    }
}

fn error_text(e: &FormsError) -> String {
    format!("Error: {e}")
}
