//! In-memory fakes for the persistence and presentation seams.

use crate::constants::{DOCUMENT_TYPE_KEY, FILENAME_KEY, TEMPLATE_NAME_KEY};
use crate::fields::FieldStore;
use crate::persistence::PersistenceService;
use crate::presentation::{MessageKind, PresentationSurface};
use crate::templates::Template;
use crate::{FormsError, FormsResult};
use api_shared::{
    DeleteTemplateRes, DocumentRes, ListTemplatesRes, SaveTemplateRes, SearchHit, SearchRes,
    SignatureRole, Signatures, SignaturesRes, TemplateRecord,
};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    templates: Vec<TemplateRecord>,
    documents: Vec<FieldStore>,
    printed: Vec<FieldStore>,
    uploads: Vec<(SignatureRole, usize)>,
    signatures: Signatures,
    search_index: Vec<SearchHit>,
    calls: Vec<&'static str>,
    refusal: Option<String>,
    offline: bool,
    next_id: u32,
}

#[derive(Default)]
pub(crate) struct InMemoryPersistence {
    state: Mutex<State>,
}

impl InMemoryPersistence {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("state lock")
    }

    /// Records the call and applies the configured failure mode.
    fn enter(&self, call: &'static str) -> FormsResult<Option<String>> {
        let mut state = self.state();
        state.calls.push(call);
        if state.offline {
            return Err(FormsError::Persistence("connection refused".into()));
        }
        Ok(state.refusal.clone())
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn refuse_requests(&self, reason: &str) {
        self.state().refusal = Some(reason.to_string());
    }

    pub fn fail_transport(&self) {
        self.state().offline = true;
    }

    pub fn insert_template(&self, record: TemplateRecord) {
        self.state().templates.push(record);
    }

    pub fn stored_template(&self, id: &str) -> Option<TemplateRecord> {
        self.state().templates.iter().find(|t| t.id == id).cloned()
    }

    pub fn saved_documents(&self) -> Vec<FieldStore> {
        self.state().documents.clone()
    }

    pub fn printed_documents(&self) -> Vec<FieldStore> {
        self.state().printed.clone()
    }

    pub fn uploads(&self) -> Vec<(SignatureRole, usize)> {
        self.state().uploads.clone()
    }

    pub fn set_signatures(&self, signatures: Signatures) {
        self.state().signatures = signatures;
    }

    pub fn index_for_search(&self, hit: SearchHit) {
        self.state().search_index.push(hit);
    }
}

#[async_trait]
impl PersistenceService for InMemoryPersistence {
    async fn list_templates(&self) -> FormsResult<ListTemplatesRes> {
        if let Some(error) = self.enter("list_templates")? {
            return Ok(ListTemplatesRes {
                success: false,
                templates: Vec::new(),
                error: Some(error),
            });
        }
        Ok(ListTemplatesRes {
            success: true,
            templates: self.state().templates.clone(),
            error: None,
        })
    }

    async fn save_template(&self, data: FieldStore) -> FormsResult<SaveTemplateRes> {
        if let Some(error) = self.enter("save_template")? {
            return Ok(SaveTemplateRes {
                success: false,
                error: Some(error),
                ..Default::default()
            });
        }
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("template_{}", state.next_id);
        state.templates.push(TemplateRecord {
            id: id.clone(),
            name: data.value(TEMPLATE_NAME_KEY).to_string(),
            document_type: data.value(DOCUMENT_TYPE_KEY).to_string(),
            created: "2024-03-15T09:00:00".into(),
            data: data.into_map(),
        });
        Ok(SaveTemplateRes {
            success: true,
            id: Some(id),
            message: Some("template saved".into()),
            error: None,
        })
    }

    async fn delete_template(&self, id: &str) -> FormsResult<DeleteTemplateRes> {
        if let Some(error) = self.enter("delete_template")? {
            return Ok(DeleteTemplateRes {
                success: false,
                message: None,
                error: Some(error),
            });
        }
        let mut state = self.state();
        let before = state.templates.len();
        state.templates.retain(|t| t.id != id);
        if state.templates.len() == before {
            return Ok(DeleteTemplateRes {
                success: false,
                message: None,
                error: Some("template not found".into()),
            });
        }
        Ok(DeleteTemplateRes {
            success: true,
            message: Some("template deleted".into()),
            error: None,
        })
    }

    async fn save_document(&self, data: FieldStore) -> FormsResult<DocumentRes> {
        if let Some(error) = self.enter("save_document")? {
            return Ok(DocumentRes {
                success: false,
                error: Some(error),
                ..Default::default()
            });
        }
        let filename = format!("{}.json", data.value(FILENAME_KEY));
        self.state().documents.push(data);
        Ok(DocumentRes {
            success: true,
            filename: Some(filename),
            is_pdf: false,
            message: Some("document saved".into()),
            error: None,
        })
    }

    async fn print_document(&self, data: FieldStore) -> FormsResult<DocumentRes> {
        if let Some(error) = self.enter("print_document")? {
            return Ok(DocumentRes {
                success: false,
                error: Some(error),
                ..Default::default()
            });
        }
        self.state().printed.push(data);
        Ok(DocumentRes {
            success: true,
            filename: Some("print_20240315_090000.json".into()),
            is_pdf: false,
            message: None,
            error: None,
        })
    }

    async fn upload_signature(&self, bytes: Vec<u8>, role: SignatureRole) -> FormsResult<()> {
        self.enter("upload_signature")?;
        self.state().uploads.push((role, bytes.len()));
        Ok(())
    }

    async fn get_signatures(&self) -> FormsResult<SignaturesRes> {
        self.enter("get_signatures")?;
        Ok(SignaturesRes {
            success: true,
            signatures: self.state().signatures.clone(),
        })
    }

    async fn search_patients(&self, query: &str) -> FormsResult<SearchRes> {
        if let Some(error) = self.enter("search_patients")? {
            return Ok(SearchRes {
                success: false,
                results: Vec::new(),
                error: Some(error),
            });
        }
        let query = query.to_lowercase();
        let results = self
            .state()
            .search_index
            .iter()
            .filter(|hit| hit.name().to_lowercase().contains(&query))
            .cloned()
            .collect();
        Ok(SearchRes {
            success: true,
            results,
            error: None,
        })
    }
}

/// Surface that records what it was asked to show.
#[derive(Default)]
pub(crate) struct RecordingSurface {
    messages: Mutex<Vec<(MessageKind, String)>>,
    template_lists: Mutex<Vec<Vec<String>>>,
    search_results: Mutex<Vec<Vec<SearchHit>>>,
}

impl RecordingSurface {
    pub fn messages(&self) -> Vec<(MessageKind, String)> {
        self.messages.lock().expect("messages lock").clone()
    }

    pub fn last_message(&self) -> Option<(MessageKind, String)> {
        self.messages().last().cloned()
    }

    /// Template ids of every rendered list, oldest first.
    pub fn template_lists(&self) -> Vec<Vec<String>> {
        self.template_lists.lock().expect("templates lock").clone()
    }

    pub fn search_results(&self) -> Vec<Vec<SearchHit>> {
        self.search_results.lock().expect("search lock").clone()
    }
}

impl PresentationSurface for RecordingSurface {
    fn render_templates(&self, templates: &[Template]) {
        let ids = templates.iter().map(|t| t.id.to_string()).collect();
        self.template_lists.lock().expect("templates lock").push(ids);
    }

    fn render_search_results(&self, results: &[SearchHit]) {
        self.search_results
            .lock()
            .expect("search lock")
            .push(results.to_vec());
    }

    fn show_message(&self, kind: MessageKind, text: &str) {
        self.messages
            .lock()
            .expect("messages lock")
            .push((kind, text.to_string()));
    }
}
