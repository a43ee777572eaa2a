//! [`PersistenceService`] over a [`FileStore`].
//!
//! File I/O runs on tokio's blocking pool. Refusals the caller can act on (a missing
//! template) come back as `success: false`; everything else is an `Err`.

use crate::store::FileStore;
use crate::StoreResult;
use api_shared::{
    DeleteTemplateRes, DocumentRes, ListTemplatesRes, SaveTemplateRes, SearchRes, SignatureRole,
    SignaturesRes,
};
use async_trait::async_trait;
use chrono::Local;
use medforms_core::{FieldStore, FormsError, FormsResult, PersistenceService};

impl FileStore {
    /// Runs `op` against a clone of the store on the blocking pool.
    pub async fn blocking<T, F>(&self, op: F) -> FormsResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&FileStore) -> StoreResult<T> + Send + 'static,
    {
        let store = self.clone();
        let result = tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| FormsError::Persistence(format!("store task failed: {e}")))?;
        Ok(result?)
    }
}

#[async_trait]
impl PersistenceService for FileStore {
    async fn list_templates(&self) -> FormsResult<ListTemplatesRes> {
        let templates = self.blocking(|store| store.list_templates()).await?;
        Ok(ListTemplatesRes {
            success: true,
            templates,
            error: None,
        })
    }

    async fn save_template(&self, data: FieldStore) -> FormsResult<SaveTemplateRes> {
        let now = Local::now().naive_local();
        let record = self
            .blocking(move |store| store.save_template(data, now))
            .await?;
        Ok(SaveTemplateRes {
            success: true,
            id: Some(record.id),
            message: Some("template saved".into()),
            error: None,
        })
    }

    async fn delete_template(&self, id: &str) -> FormsResult<DeleteTemplateRes> {
        let id = id.to_string();
        let deleted = self
            .blocking(move |store| store.delete_template(&id))
            .await?;
        if deleted {
            Ok(DeleteTemplateRes {
                success: true,
                message: Some("template deleted".into()),
                error: None,
            })
        } else {
            Ok(DeleteTemplateRes {
                success: false,
                message: None,
                error: Some("template not found".into()),
            })
        }
    }

    async fn save_document(&self, data: FieldStore) -> FormsResult<DocumentRes> {
        let now = Local::now().naive_local();
        let filename = self
            .blocking(move |store| store.save_document(&data, now))
            .await?;
        Ok(DocumentRes {
            success: true,
            filename: Some(filename),
            is_pdf: false,
            message: Some("document saved".into()),
            error: None,
        })
    }

    async fn print_document(&self, data: FieldStore) -> FormsResult<DocumentRes> {
        let now = Local::now().naive_local();
        let filename = self
            .blocking(move |store| store.print_document(&data, now))
            .await?;
        Ok(DocumentRes {
            success: true,
            filename: Some(filename),
            is_pdf: false,
            message: None,
            error: None,
        })
    }

    async fn upload_signature(&self, bytes: Vec<u8>, role: SignatureRole) -> FormsResult<()> {
        self.blocking(move |store| store.store_signature(role, bytes))
            .await?;
        Ok(())
    }

    async fn get_signatures(&self) -> FormsResult<SignaturesRes> {
        let signatures = self.blocking(|store| store.signatures()).await?;
        Ok(SignaturesRes {
            success: true,
            signatures,
        })
    }

    async fn search_patients(&self, query: &str) -> FormsResult<SearchRes> {
        let query = query.to_string();
        let results = self.blocking(move |store| store.search(&query)).await?;
        Ok(SearchRes {
            success: true,
            results,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medforms_core::constants::{DOCUMENT_TYPE_KEY, FILENAME_KEY};
    use medforms_core::fields::names;
    use medforms_core::{CoreConfig, DocumentSession, DocumentType, TemplateEngine};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> FileStore {
        let cfg = CoreConfig::new(temp.path().to_path_buf(), 1024).expect("config");
        FileStore::open(&cfg).expect("store")
    }

    #[tokio::test]
    async fn test_template_round_trip_through_engine() {
        let temp = TempDir::new().expect("temp dir");
        let engine = TemplateEngine::new(Arc::new(open_store(&temp)));

        let fields: FieldStore = [(names::ICD_CODE, "J18"), ("initial_date", "01.02.2024")]
            .into_iter()
            .collect();
        let id = engine
            .save_template("Ward A", DocumentType::MedicalRecord, fields)
            .await
            .expect("save");

        let template = engine.find_template(id.as_str()).await.expect("find");
        assert_eq!(template.name, "Ward A");
        assert!(template.created_at.is_some());

        let mut session = DocumentSession::new();
        engine
            .apply_template(&mut session, &template)
            .expect("apply");
        let form = session.form(DocumentType::MedicalRecord);
        assert_eq!(form.value(names::ICD_CODE), "J18");
        assert_eq!(form.value("initial_date"), "2024-02-01");

        assert!(engine.delete_template(id.as_str()).await.expect("delete"));
        assert!(!engine.delete_template(id.as_str()).await.expect("gone"));
    }

    #[tokio::test]
    async fn test_delete_unknown_template_is_refusal() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);

        let res = PersistenceService::delete_template(&store, "nope")
            .await
            .expect("refusal, not error");
        assert!(!res.success);
        assert_eq!(res.error.as_deref(), Some("template not found"));

        let err = PersistenceService::delete_template(&store, "../nope")
            .await
            .expect_err("unsafe id");
        assert!(matches!(err, FormsError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_save_document_reports_filename() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);
        let data: FieldStore = [(FILENAME_KEY, "Nino"), (DOCUMENT_TYPE_KEY, "form_100")]
            .into_iter()
            .collect();

        let res = PersistenceService::save_document(&store, data)
            .await
            .expect("save");
        assert!(res.success);
        assert!(!res.is_pdf);
        assert_eq!(res.filename.as_deref(), Some("Nino.json"));
    }

    #[tokio::test]
    async fn test_upload_signature_rejects_text() {
        let temp = TempDir::new().expect("temp dir");
        let store = open_store(&temp);

        let err = PersistenceService::upload_signature(&store, b"hello".to_vec(), SignatureRole::Head)
            .await
            .expect_err("not an image");
        assert!(err.is_validation());

        let res = store.get_signatures().await.expect("signatures");
        assert!(res.success);
        assert_eq!(res.signatures.head, None);
    }
}
