//! MedForms File Store
//!
//! This crate is the file-backed [`PersistenceService`](medforms_core::PersistenceService)
//! used by the HTTP server and the CLI.
//!
//! ## Storage Layout
//!
//! Everything lives under the configured data directory:
//!
//! ```text
//! <data_dir>/
//! ├── documents/            # saved and printed form payloads
//! │   ├── Nino_Beridze_2024-03-15.json
//! │   └── print_20240315_090507.json
//! ├── saved_templates/      # one JSON object per template
//! │   └── ward_a_20240315_090507.json
//! └── signatures/           # at most one image per role
//!     ├── doctor_signature.png
//!     └── stamp_signature.jpg
//! ```
//!
//! ## Design Principles
//!
//! - Every name that arrives from outside is checked before it is joined onto a directory
//! - Template ids are derived from the template name and the save time, never supplied
//! - Unreadable files are skipped with a warning; one bad file never hides the rest
//!
//! ## Example Usage
//!
//! ```no_run
//! use medforms_core::CoreConfig;
//! use medforms_store::FileStore;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = CoreConfig::new(PathBuf::from("medforms_data"), 2 * 1024 * 1024)?;
//! let store = FileStore::open(&cfg)?;
//! for template in store.list_templates()? {
//!     println!("{} ({})", template.name, template.id);
//! }
//! # Ok(())
//! # }
//! ```

mod constants;
mod service;
mod store;

pub use store::{FileStore, StoredSignature};

use medforms_core::FormsError;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Data directory path exists but is not a directory
    #[error("Invalid data directory: {0}")]
    InvalidDataDirectory(String),

    /// A caller-supplied id or filename could escape its directory
    #[error("Invalid name: {0}")]
    InvalidName(String),

    /// Requested document does not exist
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Uploaded file is not an acceptable signature image
    #[error("Invalid signature image: {0}")]
    InvalidSignature(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the caller, not the store, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidName(_)
                | StoreError::DocumentNotFound(_)
                | StoreError::InvalidSignature(_)
        )
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for FormsError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidName(msg) | StoreError::DocumentNotFound(msg) => {
                FormsError::InvalidInput(msg)
            }
            StoreError::InvalidSignature(msg) => FormsError::Validation(msg),
            other => FormsError::Persistence(other.to_string()),
        }
    }
}
