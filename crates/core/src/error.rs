use crate::fields::DocumentType;

#[derive(Debug, thiserror::Error)]
pub enum FormsError {
    /// A required user input (template name, filename, signature file) is missing or
    /// unacceptable. Raised before any persistence call.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The persistence service reported failure or could not be reached.
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown field {field} on {document_type}")]
    UnknownField {
        document_type: DocumentType,
        field: String,
    },
    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),
    #[error("template not found: {0}")]
    TemplateNotFound(String),
    #[error("invalid text: {0}")]
    Text(#[from] medforms_types::TextError),
    #[error("failed to serialize fields: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize fields: {0}")]
    Deserialization(serde_json::Error),
}

impl FormsError {
    /// Whether the error was raised before anything left the process.
    pub fn is_validation(&self) -> bool {
        matches!(self, FormsError::Validation(_) | FormsError::Text(_))
    }
}

pub type FormsResult<T> = std::result::Result<T, FormsError>;
