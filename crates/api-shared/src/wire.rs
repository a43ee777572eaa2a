//! JSON bodies of the persistence API.
//!
//! Every response carries a `success` flag; failures put a human-readable reason
//! into `error` rather than relying on the transport status alone. Optional
//! fields are omitted from the JSON when absent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Flat field-name to value mapping, the payload of every form-related request.
pub type FieldMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// A stored template as returned by the list endpoint.
///
/// `data` is the complete stored payload, including the structural keys
/// `document_type`, `template_name` and `created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TemplateRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub document_type: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub data: FieldMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ListTemplatesRes {
    pub success: bool,
    #[serde(default)]
    pub templates: Vec<TemplateRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SaveTemplateRes {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeleteTemplateRes {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of saving or printing a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DocumentRes {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default)]
    pub is_pdf: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Who a signature or stamp image belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignatureRole {
    /// Attending doctor on Form №100.
    Doctor,
    /// Facility stamp on Form №100.
    Stamp,
    /// Head of facility on Form №100.
    Head,
    /// Doctor on the medical record.
    #[serde(alias = "mrDoctor")]
    MrDoctor,
}

impl SignatureRole {
    pub const ALL: [SignatureRole; 4] = [
        SignatureRole::Doctor,
        SignatureRole::Stamp,
        SignatureRole::Head,
        SignatureRole::MrDoctor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureRole::Doctor => "doctor",
            SignatureRole::Stamp => "stamp",
            SignatureRole::Head => "head",
            SignatureRole::MrDoctor => "mr_doctor",
        }
    }
}

impl std::fmt::Display for SignatureRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SignatureRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "doctor" => Ok(SignatureRole::Doctor),
            "stamp" => Ok(SignatureRole::Stamp),
            "head" => Ok(SignatureRole::Head),
            "mr_doctor" | "mrDoctor" => Ok(SignatureRole::MrDoctor),
            other => Err(format!("unknown signature role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UploadSignatureRes {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Stored signature images as `data:` URIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Signatures {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SignaturesRes {
    pub success: bool,
    #[serde(default)]
    pub signatures: Signatures,
}

/// One search result: either a saved document file or a stored template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchHit {
    Document {
        name: String,
        path: String,
        date: String,
    },
    Template {
        name: String,
        id: String,
        patient: String,
        date: String,
    },
}

impl SearchHit {
    pub fn name(&self) -> &str {
        match self {
            SearchHit::Document { name, .. } | SearchHit::Template { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SearchRes {
    pub success: bool,
    #[serde(default)]
    pub results: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
