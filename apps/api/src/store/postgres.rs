use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::class::{ClassRow, ClassSummary, NewClass};
use crate::models::document::{DocumentDetails, DocumentRow, NewDocument};
use crate::models::enrollment::{EnrollmentRow, RosterEntry};
use crate::models::profile::Profile;
use crate::store::{ClassStore, DocumentStore, EnrollmentStore, ProfileStore};

const CLASS_SUMMARY_SELECT: &str = r#"
    SELECT c.id, c.name, c.code, c.owner_id, c.created_at,
           (SELECT COUNT(*) FROM documents d WHERE d.class_id = c.id) AS document_count,
           (SELECT COUNT(*) FROM class_enrollments e WHERE e.class_id = c.id) AS enrollment_count
    FROM classes c
"#;

const DOCUMENT_DETAILS_SELECT: &str = r#"
    SELECT d.id, d.user_id, d.title, d.file_type, d.file_size, d.storage_path,
           d.class_id, d.created_at, d.updated_at,
           c.name AS class_name,
           p.full_name AS owner_name,
           p.username AS owner_username
    FROM documents d
    LEFT JOIN classes c ON c.id = d.class_id
    LEFT JOIN profiles p ON p.id = d.user_id
"#;

/// Postgres-backed implementation of every store trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        Ok(
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn upsert_profile(
        &self,
        user_id: Uuid,
        username: &str,
        full_name: &str,
    ) -> Result<Profile, AppError> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (id, username, full_name) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
                SET username = EXCLUDED.username, full_name = EXCLUDED.full_name
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(full_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Username is already taken".to_string())
            }
            other => AppError::Database(other),
        })?;

        info!("Updated profile {user_id}");
        Ok(profile)
    }
}

#[async_trait]
impl ClassStore for PgStore {
    async fn insert_class(&self, new_class: NewClass) -> Result<ClassRow, AppError> {
        let row = sqlx::query_as::<_, ClassRow>(
            "INSERT INTO classes (name, code, owner_id) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&new_class.name)
        .bind(&new_class.code)
        .bind(new_class.owner_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Class code collision, please try again".to_string())
            }
            other => AppError::Database(other),
        })?;

        info!("Created class {} ({})", row.id, row.name);
        Ok(row)
    }

    async fn find_class(&self, class_id: Uuid) -> Result<Option<ClassRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ClassRow>("SELECT * FROM classes WHERE id = $1")
                .bind(class_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_class_by_code(&self, code: &str) -> Result<Option<ClassRow>, AppError> {
        Ok(
            sqlx::query_as::<_, ClassRow>("SELECT * FROM classes WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_classes(&self) -> Result<Vec<ClassSummary>, AppError> {
        let sql = format!("{CLASS_SUMMARY_SELECT} ORDER BY c.created_at DESC");
        Ok(sqlx::query_as::<_, ClassSummary>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_enrolled_classes(&self, user_id: Uuid) -> Result<Vec<ClassSummary>, AppError> {
        let sql = format!(
            "{CLASS_SUMMARY_SELECT}
             WHERE c.id IN (SELECT class_id FROM class_enrollments WHERE user_id = $1)
             ORDER BY c.created_at DESC"
        );
        Ok(sqlx::query_as::<_, ClassSummary>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn delete_class(&self, class_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(class_id)
            .execute(&self.pool)
            .await?;
        info!("Deleted class {class_id}");
        Ok(())
    }

    async fn update_system_prompt(
        &self,
        class_id: Uuid,
        system_prompt: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE classes SET system_prompt = $1 WHERE id = $2")
            .bind(system_prompt)
            .bind(class_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EnrollmentStore for PgStore {
    async fn find_enrollment(
        &self,
        class_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EnrollmentRow>, AppError> {
        Ok(sqlx::query_as::<_, EnrollmentRow>(
            "SELECT * FROM class_enrollments WHERE class_id = $1 AND user_id = $2",
        )
        .bind(class_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_enrollment(
        &self,
        class_id: Uuid,
        user_id: Uuid,
    ) -> Result<EnrollmentRow, AppError> {
        // The (class_id, user_id) primary key settles concurrent joins.
        sqlx::query_as::<_, EnrollmentRow>(
            "INSERT INTO class_enrollments (class_id, user_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(class_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Already enrolled in this class".to_string())
            }
            other => AppError::Database(other),
        })
    }

    async fn list_roster(&self, class_id: Uuid) -> Result<Vec<RosterEntry>, AppError> {
        Ok(sqlx::query_as::<_, RosterEntry>(
            r#"
            SELECT e.class_id, e.user_id, e.enrolled_at,
                   p.full_name, p.username, p.email, p.role
            FROM class_enrollments e
            LEFT JOIN profiles p ON p.id = e.user_id
            WHERE e.class_id = $1
            ORDER BY e.enrolled_at DESC
            "#,
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_enrollments(&self, class_id: Uuid) -> Result<i64, AppError> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM class_enrollments WHERE class_id = $1")
                .bind(class_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn insert_document(&self, document: NewDocument) -> Result<DocumentRow, AppError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (user_id, title, file_type, file_size, storage_path, class_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(document.user_id)
        .bind(&document.title)
        .bind(&document.file_type)
        .bind(document.file_size)
        .bind(&document.storage_path)
        .bind(document.class_id)
        .fetch_one(&self.pool)
        .await?;

        info!("Inserted document {} at {}", row.id, row.storage_path);
        Ok(row)
    }

    async fn find_document(&self, document_id: Uuid) -> Result<Option<DocumentRow>, AppError> {
        Ok(
            sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = $1")
                .bind(document_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_class_documents(
        &self,
        class_id: Uuid,
    ) -> Result<Vec<DocumentDetails>, AppError> {
        let sql = format!("{DOCUMENT_DETAILS_SELECT} WHERE d.class_id = $1 ORDER BY d.created_at DESC");
        Ok(sqlx::query_as::<_, DocumentDetails>(&sql)
            .bind(class_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_user_documents(&self, user_id: Uuid) -> Result<Vec<DocumentDetails>, AppError> {
        let sql = format!("{DOCUMENT_DETAILS_SELECT} WHERE d.user_id = $1 ORDER BY d.created_at DESC");
        Ok(sqlx::query_as::<_, DocumentDetails>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn count_class_documents(&self, class_id: Uuid) -> Result<i64, AppError> {
        Ok(
            sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE class_id = $1")
                .bind(class_id)
                .fetch_one(&self.pool)
                .await?,
        )
    }
}
