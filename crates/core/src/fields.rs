//! Document types, form schemas and field stores.
//!
//! A [`Form`] is a [`FieldStore`] paired with the [`FormSchema`] of the document it
//! represents. The schema decides which names the form exposes and how each value is
//! written: date fields go through [`Form::set_date`], which normalises recognised date
//! spellings to `YYYY-MM-DD` and otherwise keeps the raw text.

use crate::constants::{DATE_FORMAT, DOCUMENT_TYPE_KEY};
use crate::{FormsError, FormsResult};
use api_shared::FieldMap;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field names the synchronisation and merge rules refer to.
pub mod names {
    pub const CARD_NUMBER: &str = "card_number";
    pub const REGISTRATION_NUMBER: &str = "registration_number";
    pub const PATIENT_NAME: &str = "patient_name";
    pub const COMPLAINTS: &str = "complaints";
    pub const ANAMNESIS: &str = "anamnesis";
    pub const ICD_CODE: &str = "icd_code";
    pub const DIAGNOSIS_DESCRIPTION: &str = "diagnosis_description";
    pub const PRELIMINARY_DIAGNOSIS: &str = "preliminary_diagnosis";
    pub const MAIN_DIAGNOSIS: &str = "main_diagnosis";
    pub const TEMPERATURE: &str = "temperature";
    pub const BLOOD_PRESSURE: &str = "blood_pressure";
    pub const HEART_RATE: &str = "heart_rate";
    pub const RESPIRATORY_RATE: &str = "respiratory_rate";
    pub const SPO2: &str = "spo2";
    pub const ADMISSION_TEMP: &str = "admission_temp";
    pub const ADMISSION_BP: &str = "admission_bp";
    pub const ADMISSION_HR: &str = "admission_hr";
    pub const ADMISSION_RR: &str = "admission_rr";
    pub const ADMISSION_SPO2: &str = "admission_spo2";
    pub const GENERAL_CONDITION: &str = "general_condition";
    pub const DISCHARGE_CONDITION: &str = "discharge_condition";
    pub const DOCUMENT_DATE: &str = "document_date";
    pub const DOCTOR_SIGNATURE_IMAGE: &str = "doctor_signature_image";
    pub const STAMP_IMAGE: &str = "stamp_image";
    pub const HEAD_SIGNATURE_IMAGE: &str = "head_signature_image";
}

/// The two clinical documents a session can edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "medical_record")]
    MedicalRecord,
    #[serde(rename = "form_100")]
    Form100,
}

impl DocumentType {
    pub const ALL: [DocumentType; 2] = [DocumentType::MedicalRecord, DocumentType::Form100];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::MedicalRecord => "medical_record",
            DocumentType::Form100 => "form_100",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DocumentType {
    type Err = FormsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "medical_record" => Ok(DocumentType::MedicalRecord),
            "form_100" => Ok(DocumentType::Form100),
            other => Err(FormsError::UnknownDocumentType(other.to_string())),
        }
    }
}

/// How a field's widget accepts values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Date,
    /// Hidden field holding a `data:` URI of an uploaded image.
    Signature,
}

/// Value a field takes when its form is created or reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Empty,
    Today,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub default: FieldDefault,
}

impl FieldSpec {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            default: FieldDefault::Empty,
        }
    }

    pub const fn date(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Date,
            default: FieldDefault::Empty,
        }
    }

    pub const fn date_today(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Date,
            default: FieldDefault::Today,
        }
    }

    pub const fn signature(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Signature,
            default: FieldDefault::Empty,
        }
    }
}

const MEDICAL_RECORD_FIELDS: &[FieldSpec] = &[
    FieldSpec::text(names::CARD_NUMBER),
    FieldSpec::text(names::PATIENT_NAME),
    FieldSpec::text("facility_name"),
    FieldSpec::text("department"),
    FieldSpec::text("doctor"),
    FieldSpec::date("initial_date"),
    FieldSpec::text(names::COMPLAINTS),
    FieldSpec::text(names::ANAMNESIS),
    FieldSpec::text("allergies"),
    FieldSpec::text(names::GENERAL_CONDITION),
    FieldSpec::text(names::TEMPERATURE),
    FieldSpec::text(names::BLOOD_PRESSURE),
    FieldSpec::text(names::HEART_RATE),
    FieldSpec::text(names::RESPIRATORY_RATE),
    FieldSpec::text(names::SPO2),
    FieldSpec::text("skin"),
    FieldSpec::text("edema"),
    FieldSpec::text("cardiovascular"),
    FieldSpec::text("respiratory"),
    FieldSpec::text("digestive"),
    FieldSpec::text("urinary"),
    FieldSpec::text("musculoskeletal"),
    FieldSpec::text("neurological"),
    FieldSpec::text(names::PRELIMINARY_DIAGNOSIS),
    FieldSpec::text(names::ICD_CODE),
    FieldSpec::text(names::DIAGNOSIS_DESCRIPTION),
    FieldSpec::text("initial_diagnosis"),
    FieldSpec::text("initial_narrative"),
    FieldSpec::text("investigations"),
    FieldSpec::text("medications"),
    FieldSpec::text("admission_status"),
    FieldSpec::date("discharge_note_date"),
    FieldSpec::text("discharge_doctor"),
    FieldSpec::text("discharge_narrative"),
    FieldSpec::text("doctor_signature"),
    FieldSpec::signature(names::DOCTOR_SIGNATURE_IMAGE),
];

const FORM_100_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("facility_name"),
    FieldSpec::text("facility_address"),
    FieldSpec::text("form_type"),
    FieldSpec::text(names::REGISTRATION_NUMBER),
    FieldSpec::text("recipient_name"),
    FieldSpec::text(names::PATIENT_NAME),
    FieldSpec::date("birth_date"),
    FieldSpec::text("personal_id"),
    FieldSpec::text("patient_address"),
    FieldSpec::text("occupation"),
    FieldSpec::text("identification_code"),
    FieldSpec::date("hospitalization_date"),
    FieldSpec::date("discharge_date"),
    FieldSpec::text(names::MAIN_DIAGNOSIS),
    FieldSpec::text("case_code"),
    FieldSpec::text("treatment_code"),
    FieldSpec::text("past_diseases"),
    FieldSpec::text(names::ANAMNESIS),
    FieldSpec::text("admission_status"),
    FieldSpec::text(names::ADMISSION_TEMP),
    FieldSpec::text(names::ADMISSION_BP),
    FieldSpec::text(names::ADMISSION_HR),
    FieldSpec::text(names::ADMISSION_RR),
    FieldSpec::text(names::ADMISSION_SPO2),
    FieldSpec::text("course_type"),
    FieldSpec::text("blood_analysis"),
    FieldSpec::text("biochemistry"),
    FieldSpec::text("instrumental"),
    FieldSpec::text("medications"),
    FieldSpec::text("transfer_to_hospital"),
    FieldSpec::text("discharge_status"),
    FieldSpec::text(names::DISCHARGE_CONDITION),
    FieldSpec::text("discharge_temp"),
    FieldSpec::text("discharge_bp"),
    FieldSpec::text("discharge_hr"),
    FieldSpec::text("discharge_rr"),
    FieldSpec::text("discharge_spo2"),
    FieldSpec::text("recommendations"),
    FieldSpec::text("attending_doctor"),
    FieldSpec::text("facility_head"),
    FieldSpec::date_today(names::DOCUMENT_DATE),
    FieldSpec::date("issue_date"),
    FieldSpec::signature(names::DOCTOR_SIGNATURE_IMAGE),
    FieldSpec::signature(names::STAMP_IMAGE),
    FieldSpec::signature(names::HEAD_SIGNATURE_IMAGE),
];

/// The set of fields a form exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSchema {
    document_type: DocumentType,
    fields: Vec<FieldSpec>,
}

impl FormSchema {
    /// Build a schema from an explicit field list. Later duplicates of a name are ignored.
    pub fn new(document_type: DocumentType, fields: impl IntoIterator<Item = FieldSpec>) -> Self {
        let mut unique: Vec<FieldSpec> = Vec::new();
        for spec in fields {
            if !unique.iter().any(|s| s.name == spec.name) {
                unique.push(spec);
            }
        }
        Self {
            document_type,
            fields: unique,
        }
    }

    /// The standard schema for `document_type`.
    pub fn standard(document_type: DocumentType) -> Self {
        let fields = match document_type {
            DocumentType::MedicalRecord => MEDICAL_RECORD_FIELDS,
            DocumentType::Form100 => FORM_100_FIELDS,
        };
        Self::new(document_type, fields.iter().copied())
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|s| s.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// Field name to value mapping of one document. Last write wins per key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldStore(BTreeMap<String, String>);

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// The value of `name`, or the empty string when absent.
    pub fn value(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a JSON object of string values.
    pub fn from_json(json: &str) -> FormsResult<Self> {
        serde_json::from_str(json).map_err(FormsError::Deserialization)
    }

    pub fn to_json_pretty(&self) -> FormsResult<String> {
        serde_json::to_string_pretty(self).map_err(FormsError::Serialization)
    }

    pub fn into_map(self) -> FieldMap {
        self.0
    }
}

impl From<FieldMap> for FieldStore {
    fn from(map: FieldMap) -> Self {
        Self(map)
    }
}

impl From<FieldStore> for FieldMap {
    fn from(store: FieldStore) -> Self {
        store.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// How a value ended up in a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Raw,
    /// A date field accepted the value through its date setter.
    Date,
    /// A date field could not parse the value and stored it verbatim.
    DateFallback,
}

/// A schema plus its current values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    schema: FormSchema,
    values: FieldStore,
}

impl Form {
    /// Creates a form with every field at its default.
    pub fn new(schema: FormSchema, today: NaiveDate) -> Self {
        let mut form = Self {
            schema,
            values: FieldStore::new(),
        };
        form.reset(today);
        form
    }

    pub fn document_type(&self) -> DocumentType {
        self.schema.document_type()
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.schema.has_field(name)
    }

    pub fn kind(&self, name: &str) -> Option<FieldKind> {
        self.schema.field(name).map(|s| s.kind)
    }

    pub fn value(&self, name: &str) -> &str {
        self.values.value(name)
    }

    pub fn values(&self) -> &FieldStore {
        &self.values
    }

    /// Raw assignment. Returns `false` when the form has no such field.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
        if !self.has_field(name) {
            return false;
        }
        self.values.insert(name, value);
        true
    }

    /// Sets a date through the date setter, falling back to raw assignment when the
    /// value is not a recognised date. Returns `None` when the form has no such field.
    pub fn set_date(&mut self, name: &str, value: &str) -> Option<Assignment> {
        if !self.has_field(name) {
            return None;
        }
        match parse_date(value) {
            Some(date) => {
                self.values.insert(name, date.format(DATE_FORMAT).to_string());
                Some(Assignment::Date)
            }
            None => {
                self.values.insert(name, value);
                Some(Assignment::DateFallback)
            }
        }
    }

    /// Type-aware assignment: date fields go through [`Form::set_date`], everything else
    /// is stored as given.
    pub fn assign(&mut self, name: &str, value: &str) -> Option<Assignment> {
        match self.kind(name)? {
            FieldKind::Date => self.set_date(name, value),
            FieldKind::Text | FieldKind::Signature => {
                self.values.insert(name, value);
                Some(Assignment::Raw)
            }
        }
    }

    /// Restores every field to its default value.
    pub fn reset(&mut self, today: NaiveDate) {
        let mut values = FieldStore::new();
        for spec in self.schema.fields() {
            let value = match spec.default {
                FieldDefault::Empty => String::new(),
                FieldDefault::Today => today.format(DATE_FORMAT).to_string(),
            };
            values.insert(spec.name, value);
        }
        self.values = values;
    }

    /// Owned copy of the form's values tagged with its document type.
    ///
    /// This is the payload every save, print and template request starts from.
    pub fn snapshot(&self) -> FieldStore {
        let mut data = self.values.clone();
        data.insert(DOCUMENT_TYPE_KEY, self.document_type().as_str());
        data
    }
}

/// Recognises the date spellings a date picker would accept.
fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    for format in [DATE_FORMAT, "%d.%m.%Y", "%d/%m/%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }

    None
}
