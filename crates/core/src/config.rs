//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into services by `Arc`.
//! Nothing below reads environment variables itself; binaries read them and hand the raw
//! values to the `*_from_env_value` helpers.

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_SIGNATURE_MAX_BYTES, DOCUMENTS_DIR_NAME, SIGNATURES_DIR_NAME,
    TEMPLATES_DIR_NAME,
};
use crate::{FormsError, FormsResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    signature_max_bytes: u64,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(data_dir: PathBuf, signature_max_bytes: u64) -> FormsResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(FormsError::InvalidInput("data_dir cannot be empty".into()));
        }
        if signature_max_bytes == 0 {
            return Err(FormsError::InvalidInput(
                "signature_max_bytes must be greater than zero".into(),
            ));
        }

        Ok(Self {
            data_dir,
            signature_max_bytes,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join(DOCUMENTS_DIR_NAME)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.data_dir.join(TEMPLATES_DIR_NAME)
    }

    pub fn signatures_dir(&self) -> PathBuf {
        self.data_dir.join(SIGNATURES_DIR_NAME)
    }

    pub fn signature_max_bytes(&self) -> u64 {
        self.signature_max_bytes
    }
}

/// Resolve the data directory.
///
/// An override may name a directory that does not exist yet (the store creates it), but
/// must not name an existing regular file. Without an override `medforms_data/` relative
/// to the working directory is used.
pub fn resolve_data_dir(override_dir: Option<PathBuf>) -> FormsResult<PathBuf> {
    let Some(dir) = override_dir.filter(|d| !d.as_os_str().is_empty()) else {
        return Ok(PathBuf::from(DEFAULT_DATA_DIR));
    };

    if dir.exists() && !dir.is_dir() {
        return Err(FormsError::InvalidInput(format!(
            "MEDFORMS_DATA_DIR is not a directory: {}",
            dir.display()
        )));
    }

    Ok(dir)
}

/// Parse the signature size ceiling from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns the 2 MiB default.
pub fn signature_max_bytes_from_env_value(value: Option<String>) -> FormsResult<u64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_SIGNATURE_MAX_BYTES),
        Some(v) => match v.parse::<u64>() {
            Ok(0) | Err(_) => Err(FormsError::InvalidInput(format!(
                "MEDFORMS_SIGNATURE_MAX_BYTES must be a positive integer, got {v:?}"
            ))),
            Ok(n) => Ok(n),
        },
    }
}
