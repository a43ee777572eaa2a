//! Constants used throughout the MedForms core crate.
//!
//! Directory names, reserved payload keys and formatting strings live here so the
//! core, the file store and the HTTP layer agree on them.

/// Default data directory when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "medforms_data";

/// Directory name for saved documents.
pub const DOCUMENTS_DIR_NAME: &str = "documents";

/// Directory name for stored templates.
pub const TEMPLATES_DIR_NAME: &str = "saved_templates";

/// Directory name for uploaded signature and stamp images.
pub const SIGNATURES_DIR_NAME: &str = "signatures";

/// Upper bound on an uploaded signature image.
pub const DEFAULT_SIGNATURE_MAX_BYTES: u64 = 2 * 1024 * 1024;

/// Payload key carrying the document type of a snapshot.
pub const DOCUMENT_TYPE_KEY: &str = "document_type";

/// Payload key carrying a template's display name.
pub const TEMPLATE_NAME_KEY: &str = "template_name";

/// Payload key carrying a template's creation timestamp.
pub const CREATED_KEY: &str = "created";

/// Payload key carrying the requested document filename.
pub const FILENAME_KEY: &str = "filename";

/// Keys that describe a template rather than a form field. Never written into a form.
pub const STRUCTURAL_KEYS: [&str; 3] = [DOCUMENT_TYPE_KEY, TEMPLATE_NAME_KEY, CREATED_KEY];

/// Canonical date representation held by date fields.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Compact timestamp used in generated file and template names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
