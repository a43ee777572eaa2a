//! Directory-backed storage of templates, documents and signature images.
//!
//! The [`FileStore`] methods here are synchronous and do plain `std::fs` I/O. The async
//! [`PersistenceService`](medforms_core::PersistenceService) implementation in
//! `service.rs` runs them on the blocking pool.
//!
//! # Templates
//!
//! A template is saved as `<id>.json` where the id is the template name lower-cased with
//! spaces turned into `_`, followed by `_<YYYYmmdd_HHMMSS>`. The stored object is the
//! payload as sent plus `created` and `template_name`.
//!
//! # Documents
//!
//! Documents are stored as the JSON payload they were built from. The requested filename
//! is reduced to letters, digits, `_`, `-` and spaces; a print request always writes a
//! fresh `print_<timestamp>.json`.
//!
//! # Signatures
//!
//! Each role keeps at most one image, `<role>_signature.<ext>`, with the extension taken
//! from the detected content. A new upload replaces every older variant of that role.

use crate::constants::{
    CREATED_FORMAT, DOWNLOAD_PATH_PREFIX, JSON_EXTENSION, PRINT_PREFIX, SEARCH_DATE_FORMAT,
    SIGNATURE_SUFFIX,
};
use crate::{StoreError, StoreResult};
use api_shared::{SearchHit, SignatureRole, Signatures, TemplateRecord};
use chrono::{DateTime, Local, NaiveDateTime};
use medforms_core::constants::{
    CREATED_KEY, DOCUMENT_TYPE_KEY, FILENAME_KEY, FILE_TIMESTAMP_FORMAT, TEMPLATE_NAME_KEY,
};
use medforms_core::fields::names;
use medforms_core::signature::{data_uri, mime_for_extension, SignatureImage, SIGNATURE_EXTENSIONS};
use medforms_core::validation::{document_file_stem, truncate_to_bytes, MAX_STEM_BYTES};
use medforms_core::{CoreConfig, FieldStore};
use medforms_types::FileStem;
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions removed when a role's signature is replaced. Includes spellings older
/// uploads may have used.
const STALE_SIGNATURE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

/// A signature image written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSignature {
    pub filename: String,
    pub image: SignatureImage,
}

/// Storage rooted at one data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    documents_dir: PathBuf,
    templates_dir: PathBuf,
    signatures_dir: PathBuf,
    signature_max_bytes: u64,
}

impl FileStore {
    /// Opens the store, creating the data directory and its subdirectories when missing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if:
    /// - The data directory path exists but is not a directory
    /// - A subdirectory cannot be created (I/O)
    pub fn open(cfg: &CoreConfig) -> StoreResult<Self> {
        let data_dir = cfg.data_dir();
        if data_dir.exists() && !data_dir.is_dir() {
            return Err(StoreError::InvalidDataDirectory(format!(
                "Path is not a directory: {}",
                data_dir.display()
            )));
        }

        let store = Self {
            documents_dir: cfg.documents_dir(),
            templates_dir: cfg.templates_dir(),
            signatures_dir: cfg.signatures_dir(),
            signature_max_bytes: cfg.signature_max_bytes(),
        };

        for dir in [
            &store.documents_dir,
            &store.templates_dir,
            &store.signatures_dir,
        ] {
            fs::create_dir_all(dir).map_err(|e| {
                io_error(e, format!("Failed to create directory {}", dir.display()))
            })?;
        }

        tracing::debug!(data_dir = %data_dir.display(), "file store opened");
        Ok(store)
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn signatures_dir(&self) -> &Path {
        &self.signatures_dir
    }

    // ---- templates -------------------------------------------------------------------

    /// Writes a new template and returns its record.
    pub fn save_template(&self, mut data: FieldStore, now: NaiveDateTime) -> StoreResult<TemplateRecord> {
        let timestamp = now.format(FILE_TIMESTAMP_FORMAT).to_string();
        let name = match data.get(TEMPLATE_NAME_KEY).map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("template_{timestamp}"),
        };
        let id = checked_name(&format!("{}_{}", template_id_stem(&name), timestamp))?;

        data.insert(CREATED_KEY, now.format(CREATED_FORMAT).to_string());
        data.insert(TEMPLATE_NAME_KEY, name);

        let path = self.json_path(&self.templates_dir, id.as_str());
        write_json(&path, &data)?;

        tracing::info!(template_id = id.as_str(), "template stored");
        Ok(template_record(id.as_str().to_string(), data))
    }

    /// Every readable template, sorted by id.
    pub fn list_templates(&self) -> StoreResult<Vec<TemplateRecord>> {
        let mut records: Vec<TemplateRecord> = self
            .read_templates()?
            .into_iter()
            .map(|(id, data)| template_record(id, data))
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    /// Removes `<id>.json`. Returns `false` when no such template exists.
    pub fn delete_template(&self, id: &str) -> StoreResult<bool> {
        let id = checked_name(id)?;
        let path = self.json_path(&self.templates_dir, id.as_str());
        if !path.is_file() {
            return Ok(false);
        }

        fs::remove_file(&path)
            .map_err(|e| io_error(e, format!("Failed to delete template {}", path.display())))?;
        tracing::info!(template_id = id.as_str(), "template deleted");
        Ok(true)
    }

    // ---- documents -------------------------------------------------------------------

    /// Writes a document payload under its sanitised filename. Returns the file name.
    pub fn save_document(&self, data: &FieldStore, now: NaiveDateTime) -> StoreResult<String> {
        let stem = document_file_stem(data.value(FILENAME_KEY), now)
            .map_err(|e| StoreError::InvalidName(e.to_string()))?;
        self.write_document(stem.as_str(), data)
    }

    /// Writes a print payload as `print_<timestamp>.json`. Returns the file name.
    pub fn print_document(&self, data: &FieldStore, now: NaiveDateTime) -> StoreResult<String> {
        let stem = format!("{}_{}", PRINT_PREFIX, now.format(FILE_TIMESTAMP_FORMAT));
        self.write_document(&stem, data)
    }

    fn write_document(&self, stem: &str, data: &FieldStore) -> StoreResult<String> {
        let path = self.json_path(&self.documents_dir, stem);
        write_json(&path, data)?;

        let filename = format!("{stem}.{JSON_EXTENSION}");
        tracing::info!(
            filename = %filename,
            document_type = data.value(DOCUMENT_TYPE_KEY),
            "document stored"
        );
        Ok(filename)
    }

    /// Reads a stored document by its file name.
    pub fn read_document(&self, filename: &str) -> StoreResult<Vec<u8>> {
        let name = checked_name(filename)?;
        let path = self.documents_dir.join(name.as_str());
        if !path.is_file() {
            return Err(StoreError::DocumentNotFound(name.as_str().to_string()));
        }
        fs::read(&path).map_err(|e| io_error(e, format!("Failed to read {}", path.display())))
    }

    // ---- signatures ------------------------------------------------------------------

    /// Validates and stores a signature image for `role`, replacing any earlier one.
    pub fn store_signature(&self, role: SignatureRole, bytes: Vec<u8>) -> StoreResult<StoredSignature> {
        let image = SignatureImage::from_upload(bytes, self.signature_max_bytes)
            .map_err(|e| StoreError::InvalidSignature(e.to_string()))?;

        for ext in STALE_SIGNATURE_EXTENSIONS {
            let stale = self.signature_path(role, ext);
            if stale.is_file() {
                fs::remove_file(&stale).map_err(|e| {
                    io_error(e, format!("Failed to replace {}", stale.display()))
                })?;
            }
        }

        let filename = signature_filename(role, image.extension());
        let path = self.signatures_dir.join(&filename);
        fs::write(&path, image.bytes())
            .map_err(|e| io_error(e, format!("Failed to write {}", path.display())))?;

        tracing::info!(%role, filename = %filename, "signature stored");
        Ok(StoredSignature { filename, image })
    }

    /// Stored Form №100 signatures as `data:` URIs.
    pub fn signatures(&self) -> StoreResult<Signatures> {
        Ok(Signatures {
            doctor: self.signature_uri(SignatureRole::Doctor)?,
            stamp: self.signature_uri(SignatureRole::Stamp)?,
            head: self.signature_uri(SignatureRole::Head)?,
        })
    }

    fn signature_uri(&self, role: SignatureRole) -> StoreResult<Option<String>> {
        for ext in SIGNATURE_EXTENSIONS.iter().copied().chain(["jpeg"]) {
            let path = self.signature_path(role, ext);
            if !path.is_file() {
                continue;
            }
            let Some(mime) = mime_for_extension(ext) else {
                continue;
            };
            let bytes = fs::read(&path)
                .map_err(|e| io_error(e, format!("Failed to read {}", path.display())))?;
            return Ok(Some(data_uri(mime, &bytes)));
        }
        Ok(None)
    }

    fn signature_path(&self, role: SignatureRole, ext: &str) -> PathBuf {
        self.signatures_dir.join(signature_filename(role, ext))
    }

    // ---- search ----------------------------------------------------------------------

    /// Documents whose file name contains `query`, then templates whose patient name,
    /// personal id or template name contains it. Case-insensitive.
    pub fn search(&self, query: &str) -> StoreResult<Vec<SearchHit>> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for path in json_files(&self.documents_dir)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.to_lowercase().contains(&query) {
                continue;
            }
            let date = fs::metadata(&path)
                .and_then(|m| m.modified())
                .map(|t| DateTime::<Local>::from(t).format(SEARCH_DATE_FORMAT).to_string())
                .unwrap_or_default();
            documents.push(SearchHit::Document {
                name: name.to_string(),
                path: format!("{DOWNLOAD_PATH_PREFIX}{name}"),
                date,
            });
        }
        documents.sort_by(|a, b| a.name().cmp(b.name()));

        let mut templates = Vec::new();
        for (id, data) in self.read_templates()? {
            let matches = [names::PATIENT_NAME, "personal_id", TEMPLATE_NAME_KEY]
                .iter()
                .any(|key| data.value(key).to_lowercase().contains(&query));
            if !matches {
                continue;
            }

            let patient = match data.value(names::PATIENT_NAME) {
                "" => "-".to_string(),
                p => p.to_string(),
            };
            let name = match data.value(TEMPLATE_NAME_KEY) {
                "" => id.clone(),
                n => n.to_string(),
            };
            let date = data
                .value(CREATED_KEY)
                .chars()
                .take(16)
                .collect::<String>()
                .replace('T', " ");
            templates.push(SearchHit::Template {
                name,
                id,
                patient,
                date,
            });
        }
        templates.sort_by(|a, b| a.name().cmp(b.name()));

        documents.extend(templates);
        Ok(documents)
    }

    // ---- helpers ---------------------------------------------------------------------

    fn json_path(&self, dir: &Path, stem: &str) -> PathBuf {
        dir.join(format!("{stem}.{JSON_EXTENSION}"))
    }

    /// `(id, payload)` for every template file that parses.
    fn read_templates(&self) -> StoreResult<Vec<(String, FieldStore)>> {
        let mut templates = Vec::new();
        for path in json_files(&self.templates_dir)? {
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match read_payload(&path) {
                Ok(data) => templates.push((id.to_string(), data)),
                Err(e) => tracing::warn!("skipping template {}: {}", path.display(), e),
            }
        }
        Ok(templates)
    }
}

/// Template name to id prefix: spaces become `_`, everything is lower-cased, and anything
/// other than letters, digits, `_` and `-` is dropped. Capped at [`MAX_STEM_BYTES`].
fn template_id_stem(name: &str) -> String {
    let stem: String = name
        .replace(' ', "_")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '-'))
        .collect();
    truncate_to_bytes(&stem, MAX_STEM_BYTES).to_string()
}

fn template_record(id: String, data: FieldStore) -> TemplateRecord {
    let name = match data.value(TEMPLATE_NAME_KEY) {
        "" => id.clone(),
        n => n.to_string(),
    };
    let document_type = match data.value(DOCUMENT_TYPE_KEY) {
        "" => "unknown".to_string(),
        t => t.to_string(),
    };
    TemplateRecord {
        id,
        name,
        document_type,
        created: data.value(CREATED_KEY).to_string(),
        data: data.into_map(),
    }
}

fn signature_filename(role: SignatureRole, ext: &str) -> String {
    format!("{}{}.{}", role.as_str(), SIGNATURE_SUFFIX, ext)
}

fn checked_name(name: &str) -> StoreResult<FileStem> {
    FileStem::new(name).map_err(|e| StoreError::InvalidName(format!("{name:?}: {e}")))
}

fn json_files(dir: &Path) -> StoreResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(e, format!("Failed to list {}", dir.display()))),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                tracing::warn!("skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(JSON_EXTENSION) {
            files.push(path);
        }
    }
    Ok(files)
}

fn read_payload(path: &Path) -> StoreResult<FieldStore> {
    let json = fs::read_to_string(path)
        .map_err(|e| io_error(e, format!("Failed to read {}", path.display())))?;
    Ok(serde_json::from_str(&json)?)
}

fn write_json(path: &Path, data: &FieldStore) -> StoreResult<()> {
    let json = serde_json::to_string_pretty(data)?;
    fs::write(path, json).map_err(|e| io_error(e, format!("Failed to write {}", path.display())))
}

fn io_error(e: std::io::Error, context: String) -> StoreError {
    StoreError::Io(std::io::Error::new(e.kind(), format!("{context}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];
    const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00";

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(9, 5, 7))
            .expect("valid timestamp")
    }

    fn open_store(temp: &TempDir) -> FileStore {
        let cfg = CoreConfig::new(temp.path().join("data"), 1024).expect("config");
        FileStore::open(&cfg).expect("store")
    }

    fn payload(pairs: &[(&str, &str)]) -> FieldStore {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_open_creates_layout() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);

        assert!(store.documents_dir().is_dir());
        assert!(store.templates_dir().ends_with("saved_templates"));
        assert!(store.signatures_dir().is_dir());
    }

    #[test]
    fn test_open_rejects_file_as_data_dir() {
        let temp = TempDir::new().expect("temp dir");
        let file = temp.path().join("data");
        fs::write(&file, "not a directory").expect("write file");

        let cfg = CoreConfig::new(file, 1024).expect("config");
        assert!(matches!(
            FileStore::open(&cfg),
            Err(StoreError::InvalidDataDirectory(_))
        ));
    }

    #[test]
    fn test_save_template_derives_id_and_adds_metadata() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);

        let record = store
            .save_template(
                payload(&[
                    (TEMPLATE_NAME_KEY, "Ward A Pneumonia"),
                    (DOCUMENT_TYPE_KEY, "form_100"),
                    (names::PATIENT_NAME, "Nino"),
                ]),
                now(),
            )
            .expect("save");

        assert_eq!(record.id, "ward_a_pneumonia_20240315_090507");
        assert_eq!(record.name, "Ward A Pneumonia");
        assert_eq!(record.document_type, "form_100");
        assert_eq!(record.created, "2024-03-15T09:05:07.000000");
        assert!(store
            .templates_dir()
            .join("ward_a_pneumonia_20240315_090507.json")
            .is_file());
    }

    #[test]
    fn test_save_template_without_name_uses_timestamp() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);

        let record = store.save_template(FieldStore::new(), now()).expect("save");
        assert_eq!(record.name, "template_20240315_090507");
        assert_eq!(record.id, "template_20240315_090507_20240315_090507");
        assert_eq!(record.document_type, "unknown");
    }

    #[test]
    fn test_template_id_drops_path_syntax() {
        assert_eq!(template_id_stem("../Etc Passwd"), "etc_passwd");
        assert_eq!(template_id_stem("ნინო ბერიძე"), "ნინო_ბერიძე");
    }

    #[test]
    fn test_save_template_with_long_name_fits_file_name_limit() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);
        let long_name = "a".repeat(300);

        let record = store
            .save_template(payload(&[(TEMPLATE_NAME_KEY, long_name.as_str())]), now())
            .expect("long name still saves");

        assert_eq!(record.id, format!("{}_20240315_090507", "a".repeat(MAX_STEM_BYTES)));
        assert_eq!(record.name, long_name);
        assert!(store.templates_dir().join(format!("{}.json", record.id)).is_file());
        assert!(store.delete_template(&record.id).expect("delete"));
    }

    #[test]
    fn test_save_document_with_long_georgian_name() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);
        let requested = "ნ".repeat(100);

        let name = store
            .save_document(&payload(&[(FILENAME_KEY, requested.as_str())]), now())
            .expect("long name still saves");

        assert!(name.len() < 255);
        assert!(requested.starts_with(name.trim_end_matches(".json")));
        assert!(store.read_document(&name).is_ok());
    }

    #[test]
    fn test_list_templates_skips_corrupt_files() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);
        store
            .save_template(payload(&[(TEMPLATE_NAME_KEY, "b")]), now())
            .expect("save");
        store
            .save_template(payload(&[(TEMPLATE_NAME_KEY, "a")]), now())
            .expect("save");
        fs::write(store.templates_dir().join("broken.json"), "{ not json").expect("write");
        fs::write(store.templates_dir().join("notes.txt"), "ignored").expect("write");

        let ids: Vec<String> = store
            .list_templates()
            .expect("list")
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["a_20240315_090507", "b_20240315_090507"]);
    }

    #[test]
    fn test_delete_template_matches_exact_id() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);
        let record = store
            .save_template(payload(&[(TEMPLATE_NAME_KEY, "ward")]), now())
            .expect("save");

        assert!(!store.delete_template("ward").expect("prefix only"));
        assert!(store.delete_template(&record.id).expect("delete"));
        assert!(!store.delete_template(&record.id).expect("already gone"));
        assert!(matches!(
            store.delete_template("../data"),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_save_document_sanitises_filename() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);

        let name = store
            .save_document(
                &payload(&[(FILENAME_KEY, "../Nino Beridze_2024-03-15"), (DOCUMENT_TYPE_KEY, "form_100")]),
                now(),
            )
            .expect("save");
        assert_eq!(name, "Nino Beridze_2024-03-15.json");

        let bytes = store.read_document(&name).expect("read back");
        let stored: FieldStore = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(stored.get(DOCUMENT_TYPE_KEY), Some("form_100"));

        let fallback = store.save_document(&FieldStore::new(), now()).expect("save");
        assert_eq!(fallback, "document_20240315_090507.json");
    }

    #[test]
    fn test_print_document_uses_timestamp() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);

        let name = store
            .print_document(&payload(&[(FILENAME_KEY, "ignored")]), now())
            .expect("print");
        assert_eq!(name, "print_20240315_090507.json");
    }

    #[test]
    fn test_read_document_rejects_missing_and_unsafe_names() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);

        assert!(matches!(
            store.read_document("missing.json"),
            Err(StoreError::DocumentNotFound(_))
        ));
        assert!(matches!(
            store.read_document("../saved_templates/x.json"),
            Err(StoreError::InvalidName(_))
        ));
    }

    #[test]
    fn test_store_signature_replaces_previous_variant() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);

        let first = store
            .store_signature(SignatureRole::Stamp, PNG.to_vec())
            .expect("png");
        assert_eq!(first.filename, "stamp_signature.png");

        let second = store
            .store_signature(SignatureRole::Stamp, GIF.to_vec())
            .expect("gif");
        assert_eq!(second.filename, "stamp_signature.gif");
        assert!(!store.signatures_dir().join("stamp_signature.png").exists());

        let signatures = store.signatures().expect("signatures");
        assert_eq!(signatures.stamp, Some(second.image.to_data_uri()));
        assert_eq!(signatures.doctor, None);
        assert_eq!(signatures.head, None);
    }

    #[test]
    fn test_store_signature_rejects_non_images() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);

        let err = store
            .store_signature(SignatureRole::Doctor, b"plain text".to_vec())
            .expect_err("not an image");
        assert!(err.is_client_error());
        assert!(fs::read_dir(store.signatures_dir())
            .expect("read dir")
            .next()
            .is_none());
    }

    #[test]
    fn test_search_matches_documents_and_templates() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);
        store
            .save_document(&payload(&[(FILENAME_KEY, "Nino_Beridze_2024-03-15")]), now())
            .expect("save");
        store
            .save_document(&payload(&[(FILENAME_KEY, "other")]), now())
            .expect("save");
        store
            .save_template(
                payload(&[
                    (TEMPLATE_NAME_KEY, "Cardiology"),
                    (names::PATIENT_NAME, "NINO Beridze"),
                    ("personal_id", "01001012345"),
                ]),
                now(),
            )
            .expect("save");

        let hits = store.search("  nino ").expect("search");
        assert_eq!(hits.len(), 2);
        assert!(matches!(
            &hits[0],
            SearchHit::Document { name, path, .. }
                if name == "Nino_Beridze_2024-03-15.json"
                    && path == "/api/download/Nino_Beridze_2024-03-15.json"
        ));
        assert_eq!(
            hits[1],
            SearchHit::Template {
                name: "Cardiology".into(),
                id: "cardiology_20240315_090507".into(),
                patient: "NINO Beridze".into(),
                date: "2024-03-15 09:05".into(),
            }
        );

        let by_id = store.search("0100101").expect("search");
        assert_eq!(by_id.len(), 1);
        assert!(store.search("   ").expect("blank").is_empty());
    }
}
