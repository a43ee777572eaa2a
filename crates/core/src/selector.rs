//! Switching between the medical record and Form №100.
//!
//! Activating a document only changes which form later operations target. Activating
//! Form №100 additionally copies selected medical-record fields across. The copy runs on
//! every activation, not just the first: each switch re-overwrites the mapped Form №100
//! fields with the current medical-record values, except `discharge_condition`, which is
//! only ever filled while empty.

use crate::fields::{names, DocumentType};
use crate::session::DocumentSession;
use chrono::NaiveDate;

/// Vital signs copied only when the medical record has a value.
const VITALS: [(&str, &str); 5] = [
    (names::TEMPERATURE, names::ADMISSION_TEMP),
    (names::BLOOD_PRESSURE, names::ADMISSION_BP),
    (names::HEART_RATE, names::ADMISSION_HR),
    (names::RESPIRATORY_RATE, names::ADMISSION_RR),
    (names::SPO2, names::ADMISSION_SPO2),
];

/// Proof that a document switch has completed and its form may be written.
///
/// Only [`DocumentTypeSelector::activate`] creates one.
#[derive(Debug, PartialEq, Eq)]
pub struct FormReady {
    document_type: DocumentType,
}

impl FormReady {
    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Activation {
    pub ready: FormReady,
    /// Set when the activation ran the Form №100 merge.
    pub merge: Option<MergeOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged(MergeReport),
    /// The medical record has no patient name; nothing was copied.
    NotApplicable,
}

/// Form №100 fields the merge wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub written: Vec<&'static str>,
}

impl MergeReport {
    pub fn wrote(&self, field: &str) -> bool {
        self.written.iter().any(|f| *f == field)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentTypeSelector;

impl DocumentTypeSelector {
    pub fn new() -> Self {
        Self
    }

    /// Makes `document_type` the current document. Never clears either form.
    pub fn activate(&self, session: &mut DocumentSession, document_type: DocumentType) -> Activation {
        session.set_current(document_type);

        let merge = match document_type {
            DocumentType::Form100 => Some(self.merge_if_needed(session)),
            DocumentType::MedicalRecord => None,
        };

        Activation {
            ready: FormReady { document_type },
            merge,
        }
    }

    /// Copies medical-record data into Form №100 when the medical record names a patient.
    pub fn merge_if_needed(&self, session: &mut DocumentSession) -> MergeOutcome {
        let source = session.form(DocumentType::MedicalRecord);
        if source.value(names::PATIENT_NAME).trim().is_empty() {
            tracing::debug!("medical record has no patient name, merge skipped");
            return MergeOutcome::NotApplicable;
        }

        let patient_name = source.value(names::PATIENT_NAME).to_string();
        let anamnesis = first_non_empty(&[
            source.value(names::ANAMNESIS),
            source.value(names::COMPLAINTS),
        ])
        .map(str::to_string);
        let main_diagnosis = compose_diagnosis(
            source.value(names::DIAGNOSIS_DESCRIPTION),
            source.value(names::ICD_CODE),
            source.value(names::PRELIMINARY_DIAGNOSIS),
        );
        let vitals: Vec<(&'static str, String)> = VITALS
            .iter()
            .filter(|(from, _)| !source.value(from).is_empty())
            .map(|(from, to)| (*to, source.value(from).to_string()))
            .collect();
        let general_condition = source.value(names::GENERAL_CONDITION).to_string();

        let target = session.form_mut(DocumentType::Form100);
        let mut report = MergeReport::default();

        if target.set(names::PATIENT_NAME, patient_name) {
            report.written.push(names::PATIENT_NAME);
        }
        if let Some(anamnesis) = anamnesis {
            if target.set(names::ANAMNESIS, anamnesis) {
                report.written.push(names::ANAMNESIS);
            }
        }
        if target.set(names::MAIN_DIAGNOSIS, main_diagnosis) {
            report.written.push(names::MAIN_DIAGNOSIS);
        }
        for (to, value) in vitals {
            if target.set(to, value) {
                report.written.push(to);
            }
        }
        if !general_condition.is_empty()
            && target.has_field(names::DISCHARGE_CONDITION)
            && target.value(names::DISCHARGE_CONDITION).is_empty()
        {
            target.set(names::DISCHARGE_CONDITION, general_condition);
            report.written.push(names::DISCHARGE_CONDITION);
        }

        tracing::debug!(fields = report.written.len(), "merged medical record into form 100");
        MergeOutcome::Merged(report)
    }

    /// Resets the current form to its defaults and clears derived-field flags.
    pub fn clear_form(&self, session: &mut DocumentSession, today: NaiveDate) {
        session.clear_active(today);
    }
}

fn first_non_empty<'a>(values: &[&'a str]) -> Option<&'a str> {
    values.iter().copied().find(|v| !v.is_empty())
}

/// Description and ICD code joined by a space, or the preliminary diagnosis when both
/// are empty.
fn compose_diagnosis(description: &str, icd_code: &str, preliminary: &str) -> String {
    let joined = [description, icd_code]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if joined.is_empty() {
        preliminary.to_string()
    } else {
        joined
    }
}
