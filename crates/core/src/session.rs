//! The in-memory state of one editing session.
//!
//! A [`DocumentSession`] owns both forms, knows which one is current, and tracks the
//! metadata of derived fields. It is created when the editor opens and is never
//! persisted directly; saving a document or template is the only way its values
//! outlive it.
//!
//! Every mutation goes through `&mut DocumentSession`, so a flag check and the write
//! it guards can never be interleaved with another edit.

use crate::fields::{DocumentType, Form, FormSchema};
use crate::sync::{FieldChange, FieldFlags, FieldObserver, FieldRef, FieldSynchronizer, SyncOutcome};
use crate::{FormsError, FormsResult};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Today's date in local time, used for date defaults.
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[derive(Debug, Clone)]
pub struct DocumentSession {
    current: DocumentType,
    medical_record: Form,
    form_100: Form,
    synchronizer: FieldSynchronizer,
    derived_flags: BTreeMap<FieldRef, FieldFlags>,
}

impl DocumentSession {
    /// Creates a session with the standard schemas, the medical record active.
    pub fn new() -> Self {
        Self::new_on(today())
    }

    /// Like [`DocumentSession::new`] with an explicit date for `today` defaults.
    pub fn new_on(today: NaiveDate) -> Self {
        Self {
            current: DocumentType::MedicalRecord,
            medical_record: Form::new(FormSchema::standard(DocumentType::MedicalRecord), today),
            form_100: Form::new(FormSchema::standard(DocumentType::Form100), today),
            synchronizer: FieldSynchronizer::default(),
            derived_flags: BTreeMap::new(),
        }
    }

    /// Creates a session over custom schemas.
    ///
    /// # Errors
    ///
    /// Returns `FormsError::InvalidInput` if a schema is declared for the wrong document type.
    pub fn with_schemas(
        medical_record: FormSchema,
        form_100: FormSchema,
        today: NaiveDate,
    ) -> FormsResult<Self> {
        for (schema, expected) in [
            (&medical_record, DocumentType::MedicalRecord),
            (&form_100, DocumentType::Form100),
        ] {
            if schema.document_type() != expected {
                return Err(FormsError::InvalidInput(format!(
                    "schema for {} declared as {}",
                    expected,
                    schema.document_type()
                )));
            }
        }

        Ok(Self {
            current: DocumentType::MedicalRecord,
            medical_record: Form::new(medical_record, today),
            form_100: Form::new(form_100, today),
            synchronizer: FieldSynchronizer::default(),
            derived_flags: BTreeMap::new(),
        })
    }

    pub fn current_document_type(&self) -> DocumentType {
        self.current
    }

    /// Only the selector switches documents; it owns the side effects of a switch.
    pub(crate) fn set_current(&mut self, document_type: DocumentType) {
        self.current = document_type;
    }

    pub fn form(&self, document_type: DocumentType) -> &Form {
        match document_type {
            DocumentType::MedicalRecord => &self.medical_record,
            DocumentType::Form100 => &self.form_100,
        }
    }

    pub fn form_mut(&mut self, document_type: DocumentType) -> &mut Form {
        match document_type {
            DocumentType::MedicalRecord => &mut self.medical_record,
            DocumentType::Form100 => &mut self.form_100,
        }
    }

    pub fn active_form(&self) -> &Form {
        self.form(self.current)
    }

    pub fn active_form_mut(&mut self) -> &mut Form {
        self.form_mut(self.current)
    }

    pub fn synchronizer(&self) -> FieldSynchronizer {
        self.synchronizer
    }

    /// Metadata of a derived field; all-false when never touched.
    pub fn flags(&self, field: FieldRef) -> FieldFlags {
        self.derived_flags.get(&field).copied().unwrap_or_default()
    }

    pub(crate) fn flags_mut(&mut self, field: FieldRef) -> &mut FieldFlags {
        self.derived_flags.entry(field).or_default()
    }

    /// Applies a user edit and notifies the synchronizer.
    ///
    /// Programmatic writes (merge, template application) use [`Form::set`] directly and
    /// are not observed.
    ///
    /// # Errors
    ///
    /// Returns `FormsError::UnknownField` if the form has no field called `field`.
    pub fn edit_field(
        &mut self,
        document_type: DocumentType,
        field: &str,
        value: &str,
    ) -> FormsResult<SyncOutcome> {
        if !self.form_mut(document_type).set(field, value) {
            return Err(FormsError::UnknownField {
                document_type,
                field: field.to_string(),
            });
        }

        let synchronizer = self.synchronizer;
        Ok(synchronizer.on_field_changed(
            self,
            &FieldChange {
                document_type,
                field,
                value,
            },
        ))
    }

    /// Resets the active form to its defaults and clears all derived-field metadata.
    pub fn clear_active(&mut self, today: NaiveDate) {
        self.active_form_mut().reset(today);
        self.derived_flags.clear();
        tracing::debug!("cleared {}", self.current);
    }
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{names, FieldSpec};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date")
    }

    #[test]
    fn test_new_session_starts_on_medical_record() {
        let session = DocumentSession::new_on(day());
        assert_eq!(session.current_document_type(), DocumentType::MedicalRecord);
        assert_eq!(
            session.active_form().document_type(),
            DocumentType::MedicalRecord
        );
        assert_eq!(
            session.form(DocumentType::Form100).value(names::DOCUMENT_DATE),
            "2024-03-15"
        );
    }

    #[test]
    fn test_edit_field_rejects_unknown_field() {
        let mut session = DocumentSession::new_on(day());
        let err = session
            .edit_field(DocumentType::MedicalRecord, "main_diagnosis", "J18")
            .expect_err("medical record has no main_diagnosis");
        assert!(matches!(err, FormsError::UnknownField { .. }));
    }

    #[test]
    fn test_edit_field_on_unobserved_field() {
        let mut session = DocumentSession::new_on(day());
        let outcome = session
            .edit_field(DocumentType::MedicalRecord, names::PATIENT_NAME, "Nino")
            .expect("edit");
        assert_eq!(outcome, SyncOutcome::Ignored);
        assert_eq!(
            session.form(DocumentType::MedicalRecord).value(names::PATIENT_NAME),
            "Nino"
        );
    }

    #[test]
    fn test_with_schemas_checks_document_types() {
        let mr = FormSchema::new(DocumentType::MedicalRecord, [FieldSpec::text("a")]);
        let wrong = FormSchema::new(DocumentType::MedicalRecord, [FieldSpec::text("b")]);
        let err = DocumentSession::with_schemas(mr, wrong, day()).expect_err("mismatch");
        assert!(matches!(err, FormsError::InvalidInput(_)));
    }

    #[test]
    fn test_clear_active_leaves_other_form_alone() {
        let mut session = DocumentSession::new_on(day());
        session
            .edit_field(DocumentType::MedicalRecord, names::PATIENT_NAME, "Nino")
            .expect("edit");
        session
            .edit_field(DocumentType::Form100, names::PATIENT_NAME, "Nino")
            .expect("edit");

        session.clear_active(day());

        assert_eq!(
            session.form(DocumentType::MedicalRecord).value(names::PATIENT_NAME),
            ""
        );
        assert_eq!(
            session.form(DocumentType::Form100).value(names::PATIENT_NAME),
            "Nino"
        );
    }
}
