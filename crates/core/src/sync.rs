//! Card number → registration number propagation.
//!
//! The Form №100 registration number follows the medical record's card number until a
//! clinician types into it. From then on the typed value wins until the form is cleared.
//! The same rule works for any source/derived pair via [`FieldSynchronizer::new`].

use crate::fields::{names, DocumentType};
use crate::session::DocumentSession;

/// Addresses one field of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldRef {
    pub document_type: DocumentType,
    pub name: &'static str,
}

impl FieldRef {
    pub const fn new(document_type: DocumentType, name: &'static str) -> Self {
        Self {
            document_type,
            name,
        }
    }
}

/// Metadata tracked next to a derived field's value. Not part of any saved payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldFlags {
    pub auto_filled: bool,
    pub manual_edited: bool,
}

/// A user edit, delivered after the value has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldChange<'a> {
    pub document_type: DocumentType,
    pub field: &'a str,
    pub value: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The derived field took the source value.
    Propagated,
    /// The derived field holds a value the rule must not overwrite.
    Preserved,
    /// A direct edit of the derived field; it is now manual.
    MarkedManual,
    /// One of the two fields is missing from its form; the rule is inert.
    NotApplicable,
    /// The change was on a field the synchronizer does not watch.
    Ignored,
}

/// Receiver of user-edit notifications.
pub trait FieldObserver {
    fn on_field_changed(&self, session: &mut DocumentSession, change: &FieldChange<'_>)
        -> SyncOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSynchronizer {
    source: FieldRef,
    derived: FieldRef,
}

impl FieldSynchronizer {
    pub const fn new(source: FieldRef, derived: FieldRef) -> Self {
        Self { source, derived }
    }

    pub fn source(&self) -> FieldRef {
        self.source
    }

    pub fn derived(&self) -> FieldRef {
        self.derived
    }

    fn is_wired(&self, session: &DocumentSession) -> bool {
        session
            .form(self.source.document_type)
            .has_field(self.source.name)
            && session
                .form(self.derived.document_type)
                .has_field(self.derived.name)
    }

    /// Propagates a new source value into the derived field.
    ///
    /// The derived field is overwritten when it is empty, or when it was last written by
    /// this rule and never edited by hand.
    pub fn on_source_field_changed(
        &self,
        session: &mut DocumentSession,
        source_value: &str,
    ) -> SyncOutcome {
        if !self.is_wired(session) {
            return SyncOutcome::NotApplicable;
        }

        let flags = session.flags(self.derived);
        let current = session
            .form(self.derived.document_type)
            .value(self.derived.name);

        if !current.is_empty() && !(flags.auto_filled && !flags.manual_edited) {
            tracing::debug!(
                field = self.derived.name,
                manual = flags.manual_edited,
                "derived field preserved"
            );
            return SyncOutcome::Preserved;
        }

        session
            .form_mut(self.derived.document_type)
            .set(self.derived.name, source_value);
        session.flags_mut(self.derived).auto_filled = true;
        SyncOutcome::Propagated
    }

    /// Marks the derived field as manually edited. Sticky until the form is cleared.
    pub fn on_derived_field_edited(&self, session: &mut DocumentSession) -> SyncOutcome {
        if !self.is_wired(session) {
            return SyncOutcome::NotApplicable;
        }
        session.flags_mut(self.derived).manual_edited = true;
        SyncOutcome::MarkedManual
    }
}

impl FieldObserver for FieldSynchronizer {
    fn on_field_changed(
        &self,
        session: &mut DocumentSession,
        change: &FieldChange<'_>,
    ) -> SyncOutcome {
        let target = (change.document_type, change.field);
        if target == (self.source.document_type, self.source.name) {
            self.on_source_field_changed(session, change.value)
        } else if target == (self.derived.document_type, self.derived.name) {
            self.on_derived_field_edited(session)
        } else {
            SyncOutcome::Ignored
        }
    }
}

impl Default for FieldSynchronizer {
    /// Medical record card number drives the Form №100 registration number.
    fn default() -> Self {
        Self::new(
            FieldRef::new(DocumentType::MedicalRecord, names::CARD_NUMBER),
            FieldRef::new(DocumentType::Form100, names::REGISTRATION_NUMBER),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldSpec, FormSchema};
    use chrono::NaiveDate;

    const REG: FieldRef = FieldRef::new(DocumentType::Form100, names::REGISTRATION_NUMBER);

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date")
    }

    fn registration(session: &DocumentSession) -> &str {
        session
            .form(DocumentType::Form100)
            .value(names::REGISTRATION_NUMBER)
    }

    fn type_card_number(session: &mut DocumentSession, value: &str) -> SyncOutcome {
        session
            .edit_field(DocumentType::MedicalRecord, names::CARD_NUMBER, value)
            .expect("card_number edit")
    }

    #[test]
    fn test_card_number_fills_empty_registration() {
        let mut session = DocumentSession::new_on(day());

        assert_eq!(type_card_number(&mut session, "MR-1"), SyncOutcome::Propagated);
        assert_eq!(registration(&session), "MR-1");
        assert!(session.flags(REG).auto_filled);
        assert!(!session.flags(REG).manual_edited);
    }

    #[test]
    fn test_auto_filled_registration_keeps_following() {
        let mut session = DocumentSession::new_on(day());

        for value in ["1", "12", "123", "1234"] {
            assert_eq!(type_card_number(&mut session, value), SyncOutcome::Propagated);
            assert_eq!(registration(&session), value);
        }
    }

    #[test]
    fn test_manual_edit_wins_until_reset() {
        let mut session = DocumentSession::new_on(day());
        type_card_number(&mut session, "MR-1");

        let outcome = session
            .edit_field(DocumentType::Form100, names::REGISTRATION_NUMBER, "REG-77")
            .expect("registration edit");
        assert_eq!(outcome, SyncOutcome::MarkedManual);

        for value in ["MR-2", "MR-3", "x"] {
            assert_eq!(type_card_number(&mut session, value), SyncOutcome::Preserved);
            assert_eq!(registration(&session), "REG-77");
        }

        // Clearing Form №100 resets both the value and the flags.
        session.set_current(DocumentType::Form100);
        session.clear_active(day());
        assert_eq!(session.flags(REG), FieldFlags::default());

        assert_eq!(type_card_number(&mut session, "MR-4"), SyncOutcome::Propagated);
        assert_eq!(registration(&session), "MR-4");
    }

    #[test]
    fn test_value_not_written_by_rule_is_preserved() {
        let mut session = DocumentSession::new_on(day());
        session
            .form_mut(DocumentType::Form100)
            .set(names::REGISTRATION_NUMBER, "FROM-TEMPLATE");

        assert_eq!(type_card_number(&mut session, "MR-1"), SyncOutcome::Preserved);
        assert_eq!(registration(&session), "FROM-TEMPLATE");
    }

    #[test]
    fn test_manually_emptied_registration_is_refilled() {
        let mut session = DocumentSession::new_on(day());
        session
            .edit_field(DocumentType::Form100, names::REGISTRATION_NUMBER, "")
            .expect("registration edit");

        assert_eq!(type_card_number(&mut session, "MR-9"), SyncOutcome::Propagated);
        assert_eq!(registration(&session), "MR-9");
        assert!(session.flags(REG).manual_edited, "manual flag stays set");

        // Once it holds a value again the manual flag protects it.
        assert_eq!(type_card_number(&mut session, "MR-10"), SyncOutcome::Preserved);
        assert_eq!(registration(&session), "MR-9");
    }

    #[test]
    fn test_synchronizer_is_inert_without_derived_field() {
        let mr = FormSchema::standard(DocumentType::MedicalRecord);
        let f100 = FormSchema::new(DocumentType::Form100, [FieldSpec::text(names::PATIENT_NAME)]);
        let mut session = DocumentSession::with_schemas(mr, f100, day()).expect("session");

        assert_eq!(type_card_number(&mut session, "MR-1"), SyncOutcome::NotApplicable);
        let sync = session.synchronizer();
        assert_eq!(sync.on_derived_field_edited(&mut session), SyncOutcome::NotApplicable);
        assert_eq!(session.flags(REG), FieldFlags::default());
    }

    #[test]
    fn test_custom_pair_uses_same_rule() {
        let sync = FieldSynchronizer::new(
            FieldRef::new(DocumentType::MedicalRecord, names::PATIENT_NAME),
            FieldRef::new(DocumentType::Form100, names::PATIENT_NAME),
        );
        let mut session = DocumentSession::new_on(day());

        let change = FieldChange {
            document_type: DocumentType::MedicalRecord,
            field: names::PATIENT_NAME,
            value: "Nino",
        };
        assert_eq!(sync.on_field_changed(&mut session, &change), SyncOutcome::Propagated);
        assert_eq!(
            session.form(DocumentType::Form100).value(names::PATIENT_NAME),
            "Nino"
        );
    }
}
