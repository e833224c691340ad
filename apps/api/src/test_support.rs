//! In-memory stand-ins for the persistence and AI seams, shared by unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::ai_client::{AiAnswer, AiGateway, AiServiceError, CacheInvalidator, QueryRequest};
use crate::assistant::registry::ChatRegistry;
use crate::config::Config;
use crate::errors::AppError;
use crate::models::class::{ClassRow, ClassSummary, NewClass};
use crate::models::document::{DocumentDetails, DocumentRow, NewDocument};
use crate::models::enrollment::{EnrollmentRow, RosterEntry};
use crate::models::profile::Profile;
use crate::state::AppState;
use crate::store::{BlobStore, ClassStore, DocumentStore, EnrollmentStore, ProfileStore};
use crate::ui_state::UiStore;

// ────────────────────────────────────────────────────────────────────────────
// MemoryStore
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryStore {
    profiles: Mutex<Vec<Profile>>,
    classes: Mutex<Vec<ClassRow>>,
    enrollments: Mutex<Vec<EnrollmentRow>>,
    documents: Mutex<Vec<DocumentRow>>,
    fail_document_insert: AtomicBool,
}

impl MemoryStore {
    pub fn add_profile(&self, role: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.profiles.lock().unwrap().push(Profile {
            id,
            full_name: Some(format!("{role} {id}")),
            username: Some(format!("user-{id}")),
            email: None,
            role: Some(role.to_string()),
        });
        id
    }

    pub fn add_class(&self, owner_id: Uuid, name: &str, code: &str) -> ClassRow {
        let row = ClassRow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            code: Some(code.to_string()),
            owner_id,
            system_prompt: None,
            created_at: Utc::now(),
        };
        self.classes.lock().unwrap().push(row.clone());
        row
    }

    pub fn add_document(&self, class_id: Uuid, user_id: Uuid, title: &str) -> DocumentRow {
        let row = DocumentRow {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            file_type: "pdf".to_string(),
            file_size: 1024,
            storage_path: format!("{user_id}/{class_id}/0_{title}.pdf"),
            class_id: Some(class_id),
            created_at: Utc::now(),
            updated_at: None,
        };
        self.documents.lock().unwrap().push(row.clone());
        row
    }

    pub fn fail_document_inserts(&self) {
        self.fail_document_insert.store(true, Ordering::SeqCst);
    }

    pub fn enrollment_rows(&self, class_id: Uuid) -> usize {
        self.enrollments
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.class_id == class_id)
            .count()
    }

    pub fn document_rows(&self) -> Vec<DocumentRow> {
        self.documents.lock().unwrap().clone()
    }

    pub fn class(&self, class_id: Uuid) -> Option<ClassRow> {
        self.classes
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == class_id)
            .cloned()
    }

    fn summarize(&self, class: &ClassRow) -> ClassSummary {
        let document_count = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.class_id == Some(class.id))
            .count() as i64;
        ClassSummary {
            id: class.id,
            name: class.name.clone(),
            code: class.code.clone(),
            owner_id: class.owner_id,
            created_at: class.created_at,
            document_count,
            enrollment_count: self.enrollment_rows(class.id) as i64,
        }
    }

    fn details(&self, doc: &DocumentRow) -> DocumentDetails {
        let class_name = doc
            .class_id
            .and_then(|id| self.class(id))
            .map(|c| c.name);
        let owner = self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == doc.user_id)
            .cloned();
        DocumentDetails {
            id: doc.id,
            user_id: doc.user_id,
            title: doc.title.clone(),
            file_type: doc.file_type.clone(),
            file_size: doc.file_size,
            storage_path: doc.storage_path.clone(),
            class_id: doc.class_id,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            class_name,
            owner_name: owner.as_ref().and_then(|p| p.full_name.clone()),
            owner_username: owner.and_then(|p| p.username),
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        Ok(self
            .profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == user_id)
            .cloned())
    }

    async fn upsert_profile(
        &self,
        user_id: Uuid,
        username: &str,
        full_name: &str,
    ) -> Result<Profile, AppError> {
        let mut profiles = self.profiles.lock().unwrap();
        if profiles
            .iter()
            .any(|p| p.id != user_id && p.username.as_deref() == Some(username))
        {
            return Err(AppError::Conflict("Username is already taken".to_string()));
        }

        let index = match profiles.iter().position(|p| p.id == user_id) {
            Some(index) => index,
            None => {
                profiles.push(Profile {
                    id: user_id,
                    full_name: None,
                    username: None,
                    email: None,
                    role: None,
                });
                profiles.len() - 1
            }
        };
        let profile = &mut profiles[index];
        profile.username = Some(username.to_string());
        profile.full_name = Some(full_name.to_string());
        Ok(profile.clone())
    }
}

#[async_trait]
impl ClassStore for MemoryStore {
    async fn insert_class(&self, new_class: NewClass) -> Result<ClassRow, AppError> {
        let row = ClassRow {
            id: Uuid::new_v4(),
            name: new_class.name,
            code: Some(new_class.code),
            owner_id: new_class.owner_id,
            system_prompt: None,
            created_at: Utc::now(),
        };
        self.classes.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn find_class(&self, class_id: Uuid) -> Result<Option<ClassRow>, AppError> {
        Ok(self.class(class_id))
    }

    async fn find_class_by_code(&self, code: &str) -> Result<Option<ClassRow>, AppError> {
        Ok(self
            .classes
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.code.as_deref() == Some(code))
            .cloned())
    }

    async fn list_classes(&self) -> Result<Vec<ClassSummary>, AppError> {
        let classes = self.classes.lock().unwrap().clone();
        let mut summaries: Vec<_> = classes.iter().map(|c| self.summarize(c)).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn list_enrolled_classes(&self, user_id: Uuid) -> Result<Vec<ClassSummary>, AppError> {
        let enrolled: Vec<Uuid> = self
            .enrollments
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.class_id)
            .collect();
        Ok(self
            .list_classes()
            .await?
            .into_iter()
            .filter(|c| enrolled.contains(&c.id))
            .collect())
    }

    async fn delete_class(&self, class_id: Uuid) -> Result<(), AppError> {
        self.classes.lock().unwrap().retain(|c| c.id != class_id);
        self.documents
            .lock()
            .unwrap()
            .retain(|d| d.class_id != Some(class_id));
        self.enrollments
            .lock()
            .unwrap()
            .retain(|e| e.class_id != class_id);
        Ok(())
    }

    async fn update_system_prompt(
        &self,
        class_id: Uuid,
        system_prompt: Option<&str>,
    ) -> Result<(), AppError> {
        if let Some(class) = self
            .classes
            .lock()
            .unwrap()
            .iter_mut()
            .find(|c| c.id == class_id)
        {
            class.system_prompt = system_prompt.map(str::to_string);
        }
        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for MemoryStore {
    async fn find_enrollment(
        &self,
        class_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EnrollmentRow>, AppError> {
        Ok(self
            .enrollments
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.class_id == class_id && e.user_id == user_id)
            .cloned())
    }

    async fn insert_enrollment(
        &self,
        class_id: Uuid,
        user_id: Uuid,
    ) -> Result<EnrollmentRow, AppError> {
        let mut enrollments = self.enrollments.lock().unwrap();
        if enrollments
            .iter()
            .any(|e| e.class_id == class_id && e.user_id == user_id)
        {
            return Err(AppError::Conflict(
                "Already enrolled in this class".to_string(),
            ));
        }
        let row = EnrollmentRow {
            class_id,
            user_id,
            enrolled_at: Utc::now(),
        };
        enrollments.push(row.clone());
        Ok(row)
    }

    async fn list_roster(&self, class_id: Uuid) -> Result<Vec<RosterEntry>, AppError> {
        let enrollments = self.enrollments.lock().unwrap().clone();
        let profiles = self.profiles.lock().unwrap().clone();
        let mut roster: Vec<_> = enrollments
            .into_iter()
            .filter(|e| e.class_id == class_id)
            .map(|e| {
                let profile = profiles.iter().find(|p| p.id == e.user_id);
                RosterEntry {
                    class_id: e.class_id,
                    user_id: e.user_id,
                    enrolled_at: e.enrolled_at,
                    full_name: profile.and_then(|p| p.full_name.clone()),
                    username: profile.and_then(|p| p.username.clone()),
                    email: profile.and_then(|p| p.email.clone()),
                    role: profile.and_then(|p| p.role.clone()),
                }
            })
            .collect();
        roster.sort_by(|a, b| b.enrolled_at.cmp(&a.enrolled_at));
        Ok(roster)
    }

    async fn count_enrollments(&self, class_id: Uuid) -> Result<i64, AppError> {
        Ok(self.enrollment_rows(class_id) as i64)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_document(&self, document: NewDocument) -> Result<DocumentRow, AppError> {
        if self.fail_document_insert.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::Protocol(
                "simulated insert failure".to_string(),
            )));
        }
        let row = DocumentRow {
            id: Uuid::new_v4(),
            user_id: document.user_id,
            title: document.title,
            file_type: document.file_type,
            file_size: document.file_size,
            storage_path: document.storage_path,
            class_id: Some(document.class_id),
            created_at: Utc::now(),
            updated_at: None,
        };
        self.documents.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn find_document(&self, document_id: Uuid) -> Result<Option<DocumentRow>, AppError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.id == document_id)
            .cloned())
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<(), AppError> {
        self.documents
            .lock()
            .unwrap()
            .retain(|d| d.id != document_id);
        Ok(())
    }

    async fn list_class_documents(
        &self,
        class_id: Uuid,
    ) -> Result<Vec<DocumentDetails>, AppError> {
        let docs = self.document_rows();
        Ok(docs
            .iter()
            .rev()
            .filter(|d| d.class_id == Some(class_id))
            .map(|d| self.details(d))
            .collect())
    }

    async fn list_user_documents(&self, user_id: Uuid) -> Result<Vec<DocumentDetails>, AppError> {
        let docs = self.document_rows();
        Ok(docs
            .iter()
            .rev()
            .filter(|d| d.user_id == user_id)
            .map(|d| self.details(d))
            .collect())
    }

    async fn count_class_documents(&self, class_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.class_id == Some(class_id))
            .count() as i64)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RecordingBlobStore
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingBlobStore {
    puts: Mutex<Vec<String>>,
    removes: Mutex<Vec<String>>,
    fail_put: AtomicBool,
    fail_remove: AtomicBool,
}

impl RecordingBlobStore {
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn removes(&self) -> Vec<String> {
        self.removes.lock().unwrap().clone()
    }

    pub fn fail_puts(&self) {
        self.fail_put.store(true, Ordering::SeqCst);
    }

    pub fn fail_removes(&self) {
        self.fail_remove.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for RecordingBlobStore {
    async fn put(&self, path: &str, _bytes: Bytes, _content_type: &str) -> Result<(), AppError> {
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(AppError::Storage("bucket unavailable".to_string()));
        }
        self.puts.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), AppError> {
        self.removes.lock().unwrap().push(path.to_string());
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(AppError::Storage("bucket unavailable".to_string()));
        }
        Ok(())
    }

    async fn presigned_url(&self, path: &str, expires_in: Duration) -> Result<String, AppError> {
        Ok(format!(
            "https://blobs.test/{path}?expires={}",
            expires_in.as_secs()
        ))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FakeAiGateway
// ────────────────────────────────────────────────────────────────────────────

pub struct FakeAiGateway {
    reply: Mutex<Result<AiAnswer, AiServiceError>>,
    invalidation: Mutex<Result<(), AiServiceError>>,
    queries: Mutex<Vec<QueryRequest>>,
    invalidated: Mutex<Vec<Uuid>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeAiGateway {
    pub fn replying(reply: Result<AiAnswer, AiServiceError>) -> Self {
        Self {
            reply: Mutex::new(reply),
            invalidation: Mutex::new(Ok(())),
            queries: Mutex::new(Vec::new()),
            invalidated: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    pub fn answering(answer: &str) -> Self {
        Self::replying(Ok(AiAnswer {
            answer: answer.to_string(),
            sources: Vec::new(),
            confidence: None,
        }))
    }

    pub fn failing(error: AiServiceError) -> Self {
        Self::replying(Err(error))
    }

    pub fn set_reply(&self, reply: Result<AiAnswer, AiServiceError>) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn fail_invalidation(&self, error: AiServiceError) {
        *self.invalidation.lock().unwrap() = Err(error);
    }

    /// Queries block until the returned handle is notified, once per query.
    pub fn hold_replies(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn queries(&self) -> Vec<QueryRequest> {
        self.queries.lock().unwrap().clone()
    }

    pub fn invalidated(&self) -> Vec<Uuid> {
        self.invalidated.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiGateway for FakeAiGateway {
    async fn query(&self, request: &QueryRequest) -> Result<AiAnswer, AiServiceError> {
        self.queries.lock().unwrap().push(request.clone());
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.reply.lock().unwrap().clone()
    }

    async fn invalidate_cache(&self, class_id: Uuid) -> Result<(), AiServiceError> {
        self.invalidated.lock().unwrap().push(class_id);
        self.invalidation.lock().unwrap().clone()
    }

    async fn health(&self) -> Result<Value, AiServiceError> {
        Ok(json!({ "status": "healthy" }))
    }

    fn base_url(&self) -> &str {
        "http://ai.test"
    }
}

// ────────────────────────────────────────────────────────────────────────────
// AppState wiring
// ────────────────────────────────────────────────────────────────────────────

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".to_string(),
        s3_bucket: "documents".to_string(),
        s3_endpoint: "http://unused".to_string(),
        aws_access_key_id: "test".to_string(),
        aws_secret_access_key: "test".to_string(),
        ai_service_url: "http://ai.test".to_string(),
        ai_query_timeout: Duration::from_secs(120),
        ui_state_path: "unused.json".to_string(),
        port: 0,
        rust_log: "debug".to_string(),
    }
}

pub struct TestHarness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<RecordingBlobStore>,
    pub ai: Arc<FakeAiGateway>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_gateway(FakeAiGateway::answering("An answer."))
    }

    pub fn with_gateway(gateway: FakeAiGateway) -> Self {
        let store = Arc::new(MemoryStore::default());
        let blobs = Arc::new(RecordingBlobStore::default());
        let ai = Arc::new(gateway);
        let state = AppState {
            profiles: store.clone(),
            classes: store.clone(),
            enrollments: store.clone(),
            documents: store.clone(),
            blobs: blobs.clone(),
            ai: ai.clone(),
            invalidator: CacheInvalidator::new(ai.clone()),
            chats: ChatRegistry::default(),
            ui: UiStore::in_memory(),
            config: test_config(),
        };
        Self {
            state,
            store,
            blobs,
            ai,
        }
    }
}
