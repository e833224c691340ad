//! Persistence seams.
//!
//! Each concern is a trait object carried in `AppState`, so the services run
//! against Postgres and S3 in production and against in-memory fakes in tests.
//! Ownership and role checks live in the callers, not here.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::class::{ClassRow, ClassSummary, NewClass};
use crate::models::document::{DocumentDetails, DocumentRow, NewDocument};
use crate::models::enrollment::{EnrollmentRow, RosterEntry};
use crate::models::profile::Profile;

pub mod blob;
pub mod postgres;

pub use blob::S3BlobStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError>;

    /// Sets the display fields, creating the row if the user has none yet.
    /// A username held by someone else fails with `AppError::Conflict`.
    async fn upsert_profile(
        &self,
        user_id: Uuid,
        username: &str,
        full_name: &str,
    ) -> Result<Profile, AppError>;
}

#[async_trait]
pub trait ClassStore: Send + Sync {
    async fn insert_class(&self, new_class: NewClass) -> Result<ClassRow, AppError>;

    async fn find_class(&self, class_id: Uuid) -> Result<Option<ClassRow>, AppError>;

    /// Exact match; callers normalize the code first.
    async fn find_class_by_code(&self, code: &str) -> Result<Option<ClassRow>, AppError>;

    /// Every class, newest first.
    async fn list_classes(&self) -> Result<Vec<ClassSummary>, AppError>;

    /// Classes the user is enrolled in, newest first.
    async fn list_enrolled_classes(&self, user_id: Uuid) -> Result<Vec<ClassSummary>, AppError>;

    /// Dependent documents and enrollments are removed by the database cascade.
    async fn delete_class(&self, class_id: Uuid) -> Result<(), AppError>;

    async fn update_system_prompt(
        &self,
        class_id: Uuid,
        system_prompt: Option<&str>,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn find_enrollment(
        &self,
        class_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EnrollmentRow>, AppError>;

    /// Fails with `AppError::Conflict` when the (class, user) pair already exists.
    async fn insert_enrollment(
        &self,
        class_id: Uuid,
        user_id: Uuid,
    ) -> Result<EnrollmentRow, AppError>;

    /// Newest enrollment first.
    async fn list_roster(&self, class_id: Uuid) -> Result<Vec<RosterEntry>, AppError>;

    async fn count_enrollments(&self, class_id: Uuid) -> Result<i64, AppError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, document: NewDocument) -> Result<DocumentRow, AppError>;

    async fn find_document(&self, document_id: Uuid) -> Result<Option<DocumentRow>, AppError>;

    async fn delete_document(&self, document_id: Uuid) -> Result<(), AppError>;

    async fn list_class_documents(&self, class_id: Uuid)
        -> Result<Vec<DocumentDetails>, AppError>;

    async fn list_user_documents(&self, user_id: Uuid) -> Result<Vec<DocumentDetails>, AppError>;

    async fn count_class_documents(&self, class_id: Uuid) -> Result<i64, AppError>;
}

/// Object storage for uploaded document bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), AppError>;

    async fn remove(&self, path: &str) -> Result<(), AppError>;

    async fn presigned_url(&self, path: &str, expires_in: Duration) -> Result<String, AppError>;
}
