//! Saving, listing, applying and deleting templates.
//!
//! A template is a named snapshot of one form's values. Saving sends the snapshot to the
//! [`PersistenceService`]; applying replays a stored snapshot onto the matching form.
//!
//! ## Application rules
//!
//! - The template's document type is activated first, and fields are written only once
//!   the selector has handed back its [`FormReady`] signal.
//! - The structural keys `document_type`, `template_name` and `created` describe the
//!   template itself and are never written into a form.
//! - Keys the target form does not expose are ignored. A payload may carry fields of the
//!   other document type.
//! - Date fields go through the date setter; everything else is assigned verbatim.
//! - Application is a programmatic write: it does not trigger field synchronisation and
//!   does not touch derived-field flags.

use crate::constants::{CREATED_KEY, DOCUMENT_TYPE_KEY, STRUCTURAL_KEYS, TEMPLATE_NAME_KEY};
use crate::fields::{Assignment, DocumentType, FieldStore};
use crate::persistence::PersistenceService;
use crate::selector::{DocumentTypeSelector, FormReady, MergeOutcome};
use crate::session::DocumentSession;
use crate::{FormsError, FormsResult};
use api_shared::TemplateRecord;
use chrono::{DateTime, NaiveDateTime};
use medforms_types::NonEmptyText;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    pub document_type: DocumentType,
    /// The stored payload, structural keys included.
    pub fields: FieldStore,
    pub created_at: Option<NaiveDateTime>,
}

impl TryFrom<TemplateRecord> for Template {
    type Error = FormsError;

    fn try_from(record: TemplateRecord) -> Result<Self, Self::Error> {
        let fields = FieldStore::from(record.data);

        let declared = if record.document_type.trim().is_empty() {
            fields.value(DOCUMENT_TYPE_KEY).to_string()
        } else {
            record.document_type
        };
        let document_type = declared.parse::<DocumentType>()?;

        let created = if record.created.is_empty() {
            fields.value(CREATED_KEY)
        } else {
            record.created.as_str()
        };
        let created_at = parse_timestamp(created);

        let name = if record.name.trim().is_empty() {
            fields.value(TEMPLATE_NAME_KEY).to_string()
        } else {
            record.name
        };

        Ok(Self {
            id: TemplateId(record.id),
            name,
            document_type,
            fields,
            created_at,
        })
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// What happened when a template was applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: Vec<String>,
    /// Date fields whose value could not be parsed and was stored verbatim.
    pub date_fallbacks: Vec<String>,
    /// Keys the target form does not expose.
    pub ignored: Vec<String>,
    /// Set when activating Form №100 ran the medical-record merge first.
    pub merge: Option<MergeOutcome>,
}

pub struct TemplateEngine<P: ?Sized> {
    persistence: Arc<P>,
    selector: DocumentTypeSelector,
}

impl<P: PersistenceService + ?Sized> TemplateEngine<P> {
    pub fn new(persistence: Arc<P>) -> Self {
        Self {
            persistence,
            selector: DocumentTypeSelector::new(),
        }
    }

    /// Stores `fields` as a new template called `name`.
    ///
    /// # Errors
    ///
    /// - `FormsError::Validation` if `name` is blank; the service is not called.
    /// - `FormsError::Persistence` if the service fails, refuses, or returns no id.
    pub async fn save_template(
        &self,
        name: &str,
        document_type: DocumentType,
        fields: FieldStore,
    ) -> FormsResult<TemplateId> {
        let name = NonEmptyText::new(name)
            .map_err(|_| FormsError::Validation("template name is required".into()))?;

        let mut payload = fields;
        payload.insert(DOCUMENT_TYPE_KEY, document_type.as_str());
        payload.insert(TEMPLATE_NAME_KEY, name.as_str());

        let res = self.persistence.save_template(payload).await?;
        if !res.success {
            return Err(FormsError::Persistence(
                res.error.unwrap_or_else(|| "template was not saved".into()),
            ));
        }
        let id = res
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| FormsError::Persistence("service returned no template id".into()))?;

        tracing::info!(template_id = %id, %document_type, "template saved");
        Ok(TemplateId(id))
    }

    /// Fetches every stored template. Records with an unknown document type are skipped.
    pub async fn list_templates(&self) -> FormsResult<Vec<Template>> {
        let res = self.persistence.list_templates().await?;
        if !res.success {
            return Err(FormsError::Persistence(
                res.error
                    .unwrap_or_else(|| "templates could not be listed".into()),
            ));
        }

        let mut templates = Vec::with_capacity(res.templates.len());
        for record in res.templates {
            let id = record.id.clone();
            match Template::try_from(record) {
                Ok(template) => templates.push(template),
                Err(e) => tracing::warn!("skipping template {}: {}", id, e),
            }
        }
        Ok(templates)
    }

    /// Fetches a fresh list and returns the template with `id`.
    pub async fn find_template(&self, id: &str) -> FormsResult<Template> {
        self.list_templates()
            .await?
            .into_iter()
            .find(|t| t.id.as_str() == id)
            .ok_or_else(|| FormsError::TemplateNotFound(id.to_string()))
    }

    /// Activates the template's document and writes its fields into it.
    pub fn apply_template(
        &self,
        session: &mut DocumentSession,
        template: &Template,
    ) -> FormsResult<ApplyReport> {
        let activation = self.selector.activate(session, template.document_type);
        let mut report = apply_fields(activation.ready, session, &template.fields)?;
        report.merge = activation.merge;
        Ok(report)
    }

    /// Deletes a template. Returns whether the service reported a deletion.
    ///
    /// A refusal (for example an unknown id) is logged, not raised. Only a transport
    /// failure is an error.
    pub async fn delete_template(&self, id: &str) -> FormsResult<bool> {
        let res = self.persistence.delete_template(id).await?;
        if res.success {
            tracing::info!(template_id = id, "template deleted");
        } else {
            tracing::warn!(
                template_id = id,
                "delete reported failure: {}",
                res.error.as_deref().unwrap_or("unknown reason")
            );
        }
        Ok(res.success)
    }
}

/// Writes `fields` into the form `ready` was issued for.
///
/// # Errors
///
/// Returns `FormsError::InvalidInput` if another document was activated after `ready`
/// was issued.
pub fn apply_fields(
    ready: FormReady,
    session: &mut DocumentSession,
    fields: &FieldStore,
) -> FormsResult<ApplyReport> {
    if session.current_document_type() != ready.document_type() {
        return Err(FormsError::InvalidInput(format!(
            "{} is no longer the active document",
            ready.document_type()
        )));
    }

    let form = session.form_mut(ready.document_type());
    let mut report = ApplyReport::default();

    for (key, value) in fields.iter() {
        if STRUCTURAL_KEYS.contains(&key) {
            continue;
        }
        match form.assign(key, value) {
            Some(Assignment::DateFallback) => {
                report.date_fallbacks.push(key.to_string());
                report.applied.push(key.to_string());
            }
            Some(_) => report.applied.push(key.to_string()),
            None => report.ignored.push(key.to_string()),
        }
    }

    tracing::debug!(
        applied = report.applied.len(),
        ignored = report.ignored.len(),
        "template fields applied"
    );
    Ok(report)
}
