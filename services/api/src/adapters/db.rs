//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! table ports from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`.
//!
//! Row visibility is enforced in SQL: every statement is scoped by the caller's
//! id, always bound as `$1`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use homework_core::domain::{
    Assignment, AssignmentFilter, AssignmentPatch, Attachment, ColorTheme, CustomPage,
    CustomSubject, CustomTranslation, ElementColor, NewAssignment, NewAttachment, NewCustomPage,
    NewTranslation, ParentStudentRelationship, Profile, ProfilePatch, Subject, SubjectNames,
    User, UserCredentials, UserRelationship,
};
use homework_core::ports::{
    AccountService, AssignmentRepository, AttachmentRepository, CustomPageRepository, PortError,
    PortResult, ProfileRepository, RelationshipRepository, SubjectRepository, ThemeRepository,
    TranslationRepository,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the table ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn ensure_assignment_visible(&self, caller: Uuid, assignment_id: Uuid) -> PortResult<()> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM assignments a WHERE a.id = $2 AND {})",
            VISIBLE
        );
        let visible: bool = sqlx::query_scalar(&sql)
            .bind(caller)
            .bind(assignment_id)
            .fetch_one(&self.pool)
            .await
            .map_err(remote)?;
        if visible {
            Ok(())
        } else {
            Err(PortError::NotFound(format!("Assignment {} not found", assignment_id)))
        }
    }
}

/// Rows of `assignments a` the caller (`$1`) may see: their own and their students'.
const VISIBLE: &str = "(a.user_id = $1 OR a.user_id IN \
     (SELECT student_id FROM parent_student_relationships WHERE parent_id = $1))";

const ASSIGNMENT_COLUMNS: &str = "a.id, a.user_id, a.title, a.description, a.subject, \
     a.assignment_type, a.due_date, a.status, a.archived, a.created_at, a.updated_at";

//=========================================================================================
// Error Mapping
//=========================================================================================

fn remote(e: sqlx::Error) -> PortError {
    PortError::Remote(e.to_string())
}

/// Maps not-found rows, unique violations (23505) and dangling foreign keys (23503).
fn classify(e: sqlx::Error, what: &str) -> PortError {
    match &e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", what)),
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some("23505") => PortError::Conflict(format!("{} already exists", what)),
            Some("23503") => PortError::NotFound(format!("{} references a missing row", what)),
            _ => remote(e),
        },
        _ => remote(e),
    }
}

fn expect_affected(rows: u64, what: &str) -> PortResult<()> {
    if rows == 0 {
        Err(PortError::NotFound(format!("{} not found", what)))
    } else {
        Ok(())
    }
}

fn corrupt(e: impl std::fmt::Display) -> PortError {
    PortError::Remote(format!("Corrupt row: {}", e))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct AssignmentRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: Option<String>,
    subject: String,
    assignment_type: String,
    due_date: DateTime<Utc>,
    status: String,
    archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl AssignmentRecord {
    fn to_domain(self) -> PortResult<Assignment> {
        Ok(Assignment {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            subject: Subject::parse(&self.subject).unwrap_or_default(),
            assignment_type: self.assignment_type.parse().map_err(corrupt)?,
            due_date: self.due_date,
            status: self.status.parse().map_err(corrupt)?,
            archived: self.archived,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SubjectRecord {
    id: Uuid,
    user_id: Uuid,
    name_en: String,
    name_he: String,
    created_at: DateTime<Utc>,
}
impl SubjectRecord {
    fn to_domain(self) -> CustomSubject {
        CustomSubject {
            id: self.id,
            user_id: self.user_id,
            name_en: self.name_en,
            name_he: self.name_he,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct TranslationRecord {
    id: Uuid,
    user_id: Uuid,
    key: String,
    text_en: String,
    text_he: String,
    page: Option<String>,
    created_at: DateTime<Utc>,
}
impl TranslationRecord {
    fn to_domain(self) -> CustomTranslation {
        CustomTranslation {
            id: self.id,
            user_id: self.user_id,
            key: self.key,
            text_en: self.text_en,
            text_he: self.text_he,
            page: self.page,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ParentLinkRecord {
    id: Uuid,
    parent_id: Uuid,
    student_id: Uuid,
    relationship_type: Option<String>,
    created_at: DateTime<Utc>,
}
impl ParentLinkRecord {
    fn to_domain(self) -> ParentStudentRelationship {
        ParentStudentRelationship {
            id: self.id,
            parent_id: self.parent_id,
            student_id: self.student_id,
            relationship_type: self.relationship_type,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct UserLinkRecord {
    id: Uuid,
    user_id: Uuid,
    related_user_id: Uuid,
    relationship_type: Option<String>,
    created_at: DateTime<Utc>,
}
impl UserLinkRecord {
    fn to_domain(self) -> UserRelationship {
        UserRelationship {
            id: self.id,
            user_id: self.user_id,
            related_user_id: self.related_user_id,
            relationship_type: self.relationship_type,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AttachmentRecord {
    id: Uuid,
    assignment_id: Uuid,
    file_name: String,
    storage_path: String,
    content_type: String,
    size: i64,
    created_at: DateTime<Utc>,
}
impl AttachmentRecord {
    fn to_domain(self) -> Attachment {
        Attachment {
            id: self.id,
            assignment_id: self.assignment_id,
            file_name: self.file_name,
            storage_path: self.storage_path,
            content_type: self.content_type,
            size: self.size,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ProfileRecord {
    user_id: Uuid,
    email: Option<String>,
    display_name: Option<String>,
    role: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> PortResult<Profile> {
        Ok(Profile {
            user_id: self.user_id,
            email: self.email,
            display_name: self.display_name,
            role: self.role.map(|r| r.parse()).transpose().map_err(corrupt)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ThemeRecord {
    id: Uuid,
    user_id: Uuid,
    name: String,
    elements: Vec<String>,
    colors: Vec<String>,
    created_at: DateTime<Utc>,
}
impl ThemeRecord {
    fn to_domain(self) -> ColorTheme {
        ColorTheme {
            id: self.id,
            user_id: Some(self.user_id),
            name: self.name,
            is_preset: false,
            colors: self
                .elements
                .into_iter()
                .zip(self.colors)
                .map(|(element, color)| ElementColor { element, color })
                .collect(),
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct ElementColorRecord {
    element: String,
    color: String,
}

#[derive(FromRow)]
struct PageRecord {
    id: Uuid,
    user_id: Uuid,
    slug: String,
    title: String,
    created_at: DateTime<Utc>,
}
impl PageRecord {
    fn to_domain(self) -> CustomPage {
        CustomPage {
            id: self.id,
            user_id: self.user_id,
            slug: self.slug,
            title: self.title,
            created_at: self.created_at,
        }
    }
}

//=========================================================================================
// `AccountService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, lower($2), $3) RETURNING user_id",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "User"))?;
        Ok(User {
            user_id,
            email: Some(email.to_lowercase()),
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = lower($1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "User"))?;
        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let email: String = sqlx::query_scalar("SELECT email FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, "User"))?;
        Ok(User {
            user_id,
            email: Some(email),
        })
    }

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET hashed_password = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(hashed_password)
            .execute(&self.pool)
            .await
            .map_err(remote)?;
        expect_affected(result.rows_affected(), "User")
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(remote)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(remote)?
        .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(remote)?;
        Ok(())
    }

    async fn create_password_reset(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(remote)?;
        Ok(())
    }

    async fn consume_password_reset(&self, token: &str) -> PortResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            "UPDATE password_reset_tokens SET used_at = now() \
             WHERE token = $1 AND used_at IS NULL AND expires_at > now() RETURNING user_id",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(remote)?
        .ok_or_else(|| PortError::NotFound("Reset token not found".to_string()))
    }
}

//=========================================================================================
// `AssignmentRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl AssignmentRepository for DbAdapter {
    async fn list(&self, caller: Uuid, filter: &AssignmentFilter) -> PortResult<Vec<Assignment>> {
        let sql = format!(
            "SELECT {} FROM assignments a \
             WHERE a.user_id = ANY($2) AND {} AND ($3::boolean IS NULL OR a.archived = $3) \
             ORDER BY a.created_at DESC",
            ASSIGNMENT_COLUMNS, VISIBLE
        );
        let records = sqlx::query_as::<_, AssignmentRecord>(&sql)
            .bind(caller)
            .bind(&filter.owner_ids)
            .bind(filter.archived)
            .fetch_all(&self.pool)
            .await
            .map_err(remote)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn get(&self, caller: Uuid, id: Uuid) -> PortResult<Assignment> {
        let sql = format!(
            "SELECT {} FROM assignments a WHERE a.id = $2 AND {}",
            ASSIGNMENT_COLUMNS, VISIBLE
        );
        sqlx::query_as::<_, AssignmentRecord>(&sql)
            .bind(caller)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, &format!("Assignment {}", id)))?
            .to_domain()
    }

    async fn create(&self, caller: Uuid, fields: &NewAssignment) -> PortResult<Assignment> {
        let sql = format!(
            "INSERT INTO assignments AS a \
             (id, user_id, title, description, subject, assignment_type, due_date) \
             VALUES ($2, $1, $3, $4, $5, $6, $7) RETURNING {}",
            ASSIGNMENT_COLUMNS
        );
        sqlx::query_as::<_, AssignmentRecord>(&sql)
            .bind(caller)
            .bind(Uuid::new_v4())
            .bind(&fields.title)
            .bind(&fields.description)
            .bind(fields.subject.as_str())
            .bind(fields.assignment_type.as_str())
            .bind(fields.due_date)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, "Assignment"))?
            .to_domain()
    }

    async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        patch: &AssignmentPatch,
    ) -> PortResult<Assignment> {
        let sql = format!(
            "UPDATE assignments AS a SET \
               title = COALESCE($3, a.title), \
               description = CASE WHEN $4 THEN $5 ELSE a.description END, \
               subject = COALESCE($6, a.subject), \
               assignment_type = COALESCE($7, a.assignment_type), \
               due_date = COALESCE($8, a.due_date), \
               status = COALESCE($9, a.status), \
               archived = COALESCE($10, a.archived), \
               updated_at = clock_timestamp() \
             WHERE a.id = $2 AND {} RETURNING {}",
            VISIBLE, ASSIGNMENT_COLUMNS
        );
        sqlx::query_as::<_, AssignmentRecord>(&sql)
            .bind(caller)
            .bind(id)
            .bind(&patch.title)
            .bind(patch.description.is_some())
            .bind(patch.description.clone().flatten())
            .bind(patch.subject.as_ref().map(|s| s.as_str().to_string()))
            .bind(patch.assignment_type.map(|t| t.as_str()))
            .bind(patch.due_date)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.archived)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, &format!("Assignment {}", id)))?
            .to_domain()
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM assignments WHERE id = $2 AND user_id = $1")
            .bind(caller)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(remote)?;
        expect_affected(result.rows_affected(), &format!("Assignment {}", id))
    }
}

//=========================================================================================
// `SubjectRepository` / `TranslationRepository` Trait Implementations
//=========================================================================================

#[async_trait]
impl SubjectRepository for DbAdapter {
    async fn list(&self, caller: Uuid) -> PortResult<Vec<CustomSubject>> {
        let records = sqlx::query_as::<_, SubjectRecord>(
            "SELECT id, user_id, name_en, name_he, created_at FROM custom_subjects \
             WHERE user_id = $1 ORDER BY name_en ASC",
        )
        .bind(caller)
        .fetch_all(&self.pool)
        .await
        .map_err(remote)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create(&self, caller: Uuid, names: &SubjectNames) -> PortResult<CustomSubject> {
        let record = sqlx::query_as::<_, SubjectRecord>(
            "INSERT INTO custom_subjects (id, user_id, name_en, name_he) VALUES ($2, $1, $3, $4) \
             RETURNING id, user_id, name_en, name_he, created_at",
        )
        .bind(caller)
        .bind(Uuid::new_v4())
        .bind(&names.name_en)
        .bind(&names.name_he)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "Subject"))?;
        Ok(record.to_domain())
    }

    async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        names: &SubjectNames,
    ) -> PortResult<CustomSubject> {
        let record = sqlx::query_as::<_, SubjectRecord>(
            "UPDATE custom_subjects SET name_en = $3, name_he = $4 WHERE id = $2 AND user_id = $1 \
             RETURNING id, user_id, name_en, name_he, created_at",
        )
        .bind(caller)
        .bind(id)
        .bind(&names.name_en)
        .bind(&names.name_he)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, &format!("Subject {}", id)))?;
        Ok(record.to_domain())
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM custom_subjects WHERE id = $2 AND user_id = $1")
            .bind(caller)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(remote)?;
        expect_affected(result.rows_affected(), &format!("Subject {}", id))
    }
}

#[async_trait]
impl TranslationRepository for DbAdapter {
    async fn list(&self, caller: Uuid) -> PortResult<Vec<CustomTranslation>> {
        let records = sqlx::query_as::<_, TranslationRecord>(
            "SELECT id, user_id, key, text_en, text_he, page, created_at FROM custom_translations \
             WHERE user_id = $1 ORDER BY key ASC, created_at ASC",
        )
        .bind(caller)
        .fetch_all(&self.pool)
        .await
        .map_err(remote)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create(
        &self,
        caller: Uuid,
        fields: &NewTranslation,
    ) -> PortResult<CustomTranslation> {
        let record = sqlx::query_as::<_, TranslationRecord>(
            "INSERT INTO custom_translations (id, user_id, key, text_en, text_he, page) \
             VALUES ($2, $1, $3, $4, $5, $6) \
             RETURNING id, user_id, key, text_en, text_he, page, created_at",
        )
        .bind(caller)
        .bind(Uuid::new_v4())
        .bind(&fields.key)
        .bind(&fields.text_en)
        .bind(&fields.text_he)
        .bind(&fields.page)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "Translation"))?;
        Ok(record.to_domain())
    }

    async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        fields: &NewTranslation,
    ) -> PortResult<CustomTranslation> {
        let record = sqlx::query_as::<_, TranslationRecord>(
            "UPDATE custom_translations SET key = $3, text_en = $4, text_he = $5, page = $6 \
             WHERE id = $2 AND user_id = $1 \
             RETURNING id, user_id, key, text_en, text_he, page, created_at",
        )
        .bind(caller)
        .bind(id)
        .bind(&fields.key)
        .bind(&fields.text_en)
        .bind(&fields.text_he)
        .bind(&fields.page)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, &format!("Translation {}", id)))?;
        Ok(record.to_domain())
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM custom_translations WHERE id = $2 AND user_id = $1")
            .bind(caller)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(remote)?;
        expect_affected(result.rows_affected(), &format!("Translation {}", id))
    }
}

//=========================================================================================
// `RelationshipRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl RelationshipRepository for DbAdapter {
    async fn list_students(&self, parent: Uuid) -> PortResult<Vec<ParentStudentRelationship>> {
        let records = sqlx::query_as::<_, ParentLinkRecord>(
            "SELECT id, parent_id, student_id, relationship_type, created_at \
             FROM parent_student_relationships WHERE parent_id = $1 ORDER BY created_at ASC",
        )
        .bind(parent)
        .fetch_all(&self.pool)
        .await
        .map_err(remote)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_parent_links(&self, caller: Uuid) -> PortResult<Vec<ParentStudentRelationship>> {
        let records = sqlx::query_as::<_, ParentLinkRecord>(
            "SELECT id, parent_id, student_id, relationship_type, created_at \
             FROM parent_student_relationships WHERE parent_id = $1 OR student_id = $1 \
             ORDER BY created_at ASC",
        )
        .bind(caller)
        .fetch_all(&self.pool)
        .await
        .map_err(remote)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_parent_link(
        &self,
        caller: Uuid,
        student_id: Uuid,
        relationship_type: Option<&str>,
    ) -> PortResult<ParentStudentRelationship> {
        let record = sqlx::query_as::<_, ParentLinkRecord>(
            "INSERT INTO parent_student_relationships (id, parent_id, student_id, relationship_type) \
             VALUES ($2, $1, $3, $4) \
             RETURNING id, parent_id, student_id, relationship_type, created_at",
        )
        .bind(caller)
        .bind(Uuid::new_v4())
        .bind(student_id)
        .bind(relationship_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "Relationship"))?;
        Ok(record.to_domain())
    }

    async fn delete_parent_link(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let result = sqlx::query(
            "DELETE FROM parent_student_relationships \
             WHERE id = $2 AND (parent_id = $1 OR student_id = $1)",
        )
        .bind(caller)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(remote)?;
        expect_affected(result.rows_affected(), &format!("Relationship {}", id))
    }

    async fn list_user_relationships(&self, caller: Uuid) -> PortResult<Vec<UserRelationship>> {
        let records = sqlx::query_as::<_, UserLinkRecord>(
            "SELECT id, user_id, related_user_id, relationship_type, created_at \
             FROM user_relationships WHERE user_id = $1 OR related_user_id = $1 \
             ORDER BY created_at ASC",
        )
        .bind(caller)
        .fetch_all(&self.pool)
        .await
        .map_err(remote)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_user_relationship(
        &self,
        caller: Uuid,
        related_user_id: Uuid,
        relationship_type: Option<&str>,
    ) -> PortResult<UserRelationship> {
        let record = sqlx::query_as::<_, UserLinkRecord>(
            "INSERT INTO user_relationships (id, user_id, related_user_id, relationship_type) \
             VALUES ($2, $1, $3, $4) \
             RETURNING id, user_id, related_user_id, relationship_type, created_at",
        )
        .bind(caller)
        .bind(Uuid::new_v4())
        .bind(related_user_id)
        .bind(relationship_type)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "Relationship"))?;
        Ok(record.to_domain())
    }

    async fn delete_user_relationship(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let result = sqlx::query(
            "DELETE FROM user_relationships \
             WHERE id = $2 AND (user_id = $1 OR related_user_id = $1)",
        )
        .bind(caller)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(remote)?;
        expect_affected(result.rows_affected(), &format!("Relationship {}", id))
    }
}

//=========================================================================================
// `AttachmentRepository` Trait Implementation
//=========================================================================================

const ATTACHMENT_COLUMNS: &str =
    "at.id, at.assignment_id, at.file_name, at.storage_path, at.content_type, at.size, at.created_at";

#[async_trait]
impl AttachmentRepository for DbAdapter {
    async fn list(&self, caller: Uuid, assignment_id: Uuid) -> PortResult<Vec<Attachment>> {
        self.ensure_assignment_visible(caller, assignment_id).await?;
        let sql = format!(
            "SELECT {} FROM assignment_attachments at WHERE at.assignment_id = $1 \
             ORDER BY at.created_at ASC",
            ATTACHMENT_COLUMNS
        );
        let records = sqlx::query_as::<_, AttachmentRecord>(&sql)
            .bind(assignment_id)
            .fetch_all(&self.pool)
            .await
            .map_err(remote)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get(&self, caller: Uuid, id: Uuid) -> PortResult<Attachment> {
        let sql = format!(
            "SELECT {} FROM assignment_attachments at \
             JOIN assignments a ON a.id = at.assignment_id \
             WHERE at.id = $2 AND {}",
            ATTACHMENT_COLUMNS, VISIBLE
        );
        let record = sqlx::query_as::<_, AttachmentRecord>(&sql)
            .bind(caller)
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, &format!("Attachment {}", id)))?;
        Ok(record.to_domain())
    }

    async fn create(&self, caller: Uuid, fields: &NewAttachment) -> PortResult<Attachment> {
        self.ensure_assignment_visible(caller, fields.assignment_id).await?;
        let sql = format!(
            "INSERT INTO assignment_attachments AS at \
             (id, assignment_id, file_name, storage_path, content_type, size) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            ATTACHMENT_COLUMNS
        );
        let record = sqlx::query_as::<_, AttachmentRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(fields.assignment_id)
            .bind(&fields.file_name)
            .bind(&fields.storage_path)
            .bind(&fields.content_type)
            .bind(fields.size)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, "Attachment"))?;
        Ok(record.to_domain())
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let sql = format!(
            "DELETE FROM assignment_attachments at USING assignments a \
             WHERE at.id = $2 AND a.id = at.assignment_id AND {}",
            VISIBLE
        );
        let result = sqlx::query(&sql)
            .bind(caller)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(remote)?;
        expect_affected(result.rows_affected(), &format!("Attachment {}", id))
    }
}

//=========================================================================================
// `ProfileRepository` Trait Implementation
//=========================================================================================

const PROFILE_COLUMNS: &str = "user_id, email, display_name, role, created_at, updated_at";

#[async_trait]
impl ProfileRepository for DbAdapter {
    async fn get_or_create(&self, caller: Uuid, email: Option<&str>) -> PortResult<Profile> {
        sqlx::query(
            "INSERT INTO profiles (user_id, email) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(caller)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "Profile"))?;

        let sql = format!("SELECT {} FROM profiles WHERE user_id = $1", PROFILE_COLUMNS);
        sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(caller)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, "Profile"))?
            .to_domain()
    }

    async fn update(&self, caller: Uuid, patch: &ProfilePatch) -> PortResult<Profile> {
        let sql = format!(
            "UPDATE profiles SET \
               display_name = CASE WHEN $2 THEN $3 ELSE display_name END, \
               role = CASE WHEN $4 THEN $5 ELSE role END, \
               updated_at = now() \
             WHERE user_id = $1 RETURNING {}",
            PROFILE_COLUMNS
        );
        sqlx::query_as::<_, ProfileRecord>(&sql)
            .bind(caller)
            .bind(patch.display_name.is_some())
            .bind(patch.display_name.clone().flatten())
            .bind(patch.role.is_some())
            .bind(patch.role.flatten().map(|r| r.as_str()))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| classify(e, "Profile"))?
            .to_domain()
    }
}

//=========================================================================================
// `ThemeRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ThemeRepository for DbAdapter {
    async fn list_themes(&self, caller: Uuid) -> PortResult<Vec<ColorTheme>> {
        let records = sqlx::query_as::<_, ThemeRecord>(
            "SELECT id, user_id, name, elements, colors, created_at FROM user_color_themes \
             WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(caller)
        .fetch_all(&self.pool)
        .await
        .map_err(remote)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_theme(&self, caller: Uuid, id: Uuid) -> PortResult<ColorTheme> {
        let record = sqlx::query_as::<_, ThemeRecord>(
            "SELECT id, user_id, name, elements, colors, created_at FROM user_color_themes \
             WHERE id = $2 AND user_id = $1",
        )
        .bind(caller)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, &format!("Theme {}", id)))?;
        Ok(record.to_domain())
    }

    async fn create_theme(
        &self,
        caller: Uuid,
        name: &str,
        colors: &[ElementColor],
    ) -> PortResult<ColorTheme> {
        let elements: Vec<&str> = colors.iter().map(|c| c.element.as_str()).collect();
        let values: Vec<&str> = colors.iter().map(|c| c.color.as_str()).collect();
        let record = sqlx::query_as::<_, ThemeRecord>(
            "INSERT INTO user_color_themes (id, user_id, name, elements, colors) \
             VALUES ($2, $1, $3, $4, $5) \
             RETURNING id, user_id, name, elements, colors, created_at",
        )
        .bind(caller)
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(&elements)
        .bind(&values)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "Theme"))?;
        Ok(record.to_domain())
    }

    async fn delete_theme(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM user_color_themes WHERE id = $2 AND user_id = $1")
            .bind(caller)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(remote)?;
        expect_affected(result.rows_affected(), &format!("Theme {}", id))
    }

    async fn list_element_colors(&self, caller: Uuid) -> PortResult<Vec<ElementColor>> {
        let records = sqlx::query_as::<_, ElementColorRecord>(
            "SELECT element, color FROM element_colors WHERE user_id = $1 ORDER BY position ASC",
        )
        .bind(caller)
        .fetch_all(&self.pool)
        .await
        .map_err(remote)?;
        Ok(records
            .into_iter()
            .map(|r| ElementColor {
                element: r.element,
                color: r.color,
            })
            .collect())
    }

    async fn set_element_colors(&self, caller: Uuid, colors: &[ElementColor]) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(remote)?;
        sqlx::query("DELETE FROM element_colors WHERE user_id = $1")
            .bind(caller)
            .execute(&mut *tx)
            .await
            .map_err(remote)?;
        for (position, pair) in colors.iter().enumerate() {
            sqlx::query(
                "INSERT INTO element_colors (user_id, element, color, position) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT (user_id, element) DO UPDATE SET color = EXCLUDED.color, position = EXCLUDED.position",
            )
            .bind(caller)
            .bind(&pair.element)
            .bind(&pair.color)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| classify(e, "Element color"))?;
        }
        tx.commit().await.map_err(remote)?;
        Ok(())
    }
}

//=========================================================================================
// `CustomPageRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl CustomPageRepository for DbAdapter {
    async fn list(&self, caller: Uuid) -> PortResult<Vec<CustomPage>> {
        let records = sqlx::query_as::<_, PageRecord>(
            "SELECT id, user_id, slug, title, created_at FROM custom_pages \
             WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(caller)
        .fetch_all(&self.pool)
        .await
        .map_err(remote)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_by_slug(&self, caller: Uuid, slug: &str) -> PortResult<CustomPage> {
        let record = sqlx::query_as::<_, PageRecord>(
            "SELECT id, user_id, slug, title, created_at FROM custom_pages \
             WHERE user_id = $1 AND slug = $2",
        )
        .bind(caller)
        .bind(slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, &format!("Page '{}'", slug)))?;
        Ok(record.to_domain())
    }

    async fn create(&self, caller: Uuid, fields: &NewCustomPage) -> PortResult<CustomPage> {
        let record = sqlx::query_as::<_, PageRecord>(
            "INSERT INTO custom_pages (id, user_id, slug, title) VALUES ($2, $1, $3, $4) \
             RETURNING id, user_id, slug, title, created_at",
        )
        .bind(caller)
        .bind(Uuid::new_v4())
        .bind(&fields.slug)
        .bind(&fields.title)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, &format!("Page '{}'", fields.slug)))?;
        Ok(record.to_domain())
    }

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM custom_pages WHERE id = $2 AND user_id = $1")
            .bind(caller)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(remote)?;
        expect_affected(result.rows_affected(), &format!("Page {}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            classify(sqlx::Error::RowNotFound, "Assignment"),
            PortError::NotFound(_)
        ));
        assert!(matches!(
            classify(sqlx::Error::PoolTimedOut, "Assignment"),
            PortError::Remote(_)
        ));
    }

    #[test]
    fn zero_affected_rows_is_not_found() {
        assert!(expect_affected(1, "Subject").is_ok());
        assert_eq!(
            expect_affected(0, "Subject"),
            Err(PortError::NotFound("Subject not found".to_string()))
        );
    }

    #[test]
    fn bad_status_column_is_reported_as_corrupt() {
        let now = Utc::now();
        let record = AssignmentRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "t".to_string(),
            description: None,
            subject: "Robotics".to_string(),
            assignment_type: "homework".to_string(),
            due_date: now,
            status: "Done".to_string(),
            archived: false,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(record.to_domain(), Err(PortError::Remote(_))));
    }
}
