//! crates/homework_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture: the core only
//! ever talks to the backing data service, auth service and object store
//! through them.
//!
//! Every call carries the id of the calling user. Implementations enforce
//! row visibility; a row the caller may not see is reported as `NotFound`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Assignment, AssignmentFilter, AssignmentPatch, Attachment, ColorTheme, CustomPage,
    CustomSubject, CustomTranslation, ElementColor, NewAssignment, NewAttachment, NewCustomPage,
    NewTranslation, ParentStudentRelationship, Profile, ProfilePatch, SubjectNames, User,
    UserCredentials, UserRelationship,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, storage).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The id does not resolve under the caller's visibility scope.
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The backing service rejected the operation.
    #[error("Remote service error: {0}")]
    Remote(String),
    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// No active session, or the session expired.
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Auth / Session Port
//=========================================================================================

#[async_trait]
pub trait AccountService: Send + Sync {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn update_password(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a session id to its user. Unknown or expired sessions are `Unauthorized`.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    async fn create_password_reset(
        &self,
        token: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Marks a reset token used and returns its user. Unknown, used or expired
    /// tokens are `NotFound`.
    async fn consume_password_reset(&self, token: &str) -> PortResult<Uuid>;
}

//=========================================================================================
// Table Ports
//=========================================================================================

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Lists visible assignments, newest `created_at` first.
    async fn list(&self, caller: Uuid, filter: &AssignmentFilter) -> PortResult<Vec<Assignment>>;

    async fn get(&self, caller: Uuid, id: Uuid) -> PortResult<Assignment>;

    async fn create(&self, caller: Uuid, fields: &NewAssignment) -> PortResult<Assignment>;

    /// Allowed for the owner and for parents linked to the owner.
    async fn update(&self, caller: Uuid, id: Uuid, patch: &AssignmentPatch)
        -> PortResult<Assignment>;

    /// Owner only.
    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait SubjectRepository: Send + Sync {
    async fn list(&self, caller: Uuid) -> PortResult<Vec<CustomSubject>>;

    async fn create(&self, caller: Uuid, names: &SubjectNames) -> PortResult<CustomSubject>;

    async fn update(&self, caller: Uuid, id: Uuid, names: &SubjectNames)
        -> PortResult<CustomSubject>;

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait TranslationRepository: Send + Sync {
    async fn list(&self, caller: Uuid) -> PortResult<Vec<CustomTranslation>>;

    async fn create(&self, caller: Uuid, fields: &NewTranslation)
        -> PortResult<CustomTranslation>;

    async fn update(
        &self,
        caller: Uuid,
        id: Uuid,
        fields: &NewTranslation,
    ) -> PortResult<CustomTranslation>;

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    /// Links where `parent_id == parent`.
    async fn list_students(&self, parent: Uuid) -> PortResult<Vec<ParentStudentRelationship>>;

    /// Links where the caller is either endpoint.
    async fn list_parent_links(&self, caller: Uuid) -> PortResult<Vec<ParentStudentRelationship>>;

    /// Creates a link with the caller as parent.
    async fn create_parent_link(
        &self,
        caller: Uuid,
        student_id: Uuid,
        relationship_type: Option<&str>,
    ) -> PortResult<ParentStudentRelationship>;

    /// Either endpoint may remove the link.
    async fn delete_parent_link(&self, caller: Uuid, id: Uuid) -> PortResult<()>;

    async fn list_user_relationships(&self, caller: Uuid) -> PortResult<Vec<UserRelationship>>;

    async fn create_user_relationship(
        &self,
        caller: Uuid,
        related_user_id: Uuid,
        relationship_type: Option<&str>,
    ) -> PortResult<UserRelationship>;

    async fn delete_user_relationship(&self, caller: Uuid, id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    async fn list(&self, caller: Uuid, assignment_id: Uuid) -> PortResult<Vec<Attachment>>;

    async fn get(&self, caller: Uuid, id: Uuid) -> PortResult<Attachment>;

    async fn create(&self, caller: Uuid, fields: &NewAttachment) -> PortResult<Attachment>;

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Returns the caller's profile, creating an empty one on first access.
    async fn get_or_create(&self, caller: Uuid, email: Option<&str>) -> PortResult<Profile>;

    async fn update(&self, caller: Uuid, patch: &ProfilePatch) -> PortResult<Profile>;
}

#[async_trait]
pub trait ThemeRepository: Send + Sync {
    /// The caller's saved themes. Presets are compiled in and not stored.
    async fn list_themes(&self, caller: Uuid) -> PortResult<Vec<ColorTheme>>;

    async fn get_theme(&self, caller: Uuid, id: Uuid) -> PortResult<ColorTheme>;

    async fn create_theme(
        &self,
        caller: Uuid,
        name: &str,
        colors: &[ElementColor],
    ) -> PortResult<ColorTheme>;

    async fn delete_theme(&self, caller: Uuid, id: Uuid) -> PortResult<()>;

    /// The caller's active element colors. Empty means built-in defaults.
    async fn list_element_colors(&self, caller: Uuid) -> PortResult<Vec<ElementColor>>;

    /// Replaces the caller's active element colors wholesale.
    async fn set_element_colors(&self, caller: Uuid, colors: &[ElementColor]) -> PortResult<()>;
}

#[async_trait]
pub trait CustomPageRepository: Send + Sync {
    async fn list(&self, caller: Uuid) -> PortResult<Vec<CustomPage>>;

    async fn get_by_slug(&self, caller: Uuid, slug: &str) -> PortResult<CustomPage>;

    async fn create(&self, caller: Uuid, fields: &NewCustomPage) -> PortResult<CustomPage>;

    async fn delete(&self, caller: Uuid, id: Uuid) -> PortResult<()>;
}

//=========================================================================================
// Object Storage Port
//=========================================================================================

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, path: &str, data: Bytes, content_type: &str) -> PortResult<()>;

    async fn delete(&self, path: &str) -> PortResult<()>;

    fn public_url(&self, path: &str) -> String;
}
