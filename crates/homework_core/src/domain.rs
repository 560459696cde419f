//! crates/homework_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Enumerations
//=========================================================================================

/// Raised when a wire string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind} value: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// The subjects every user has without defining anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinSubject {
    Math,
    Science,
    English,
    History,
    Other,
}

impl BuiltinSubject {
    pub const ALL: [BuiltinSubject; 5] = [
        BuiltinSubject::Math,
        BuiltinSubject::Science,
        BuiltinSubject::English,
        BuiltinSubject::History,
        BuiltinSubject::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuiltinSubject::Math => "Math",
            BuiltinSubject::Science => "Science",
            BuiltinSubject::English => "English",
            BuiltinSubject::History => "History",
            BuiltinSubject::Other => "Other",
        }
    }
}

/// A subject is either one of the builtin five or a user-defined name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Subject {
    Builtin(BuiltinSubject),
    Custom(String),
}

impl Subject {
    /// Parses a stored subject string. Builtin names match case-insensitively,
    /// anything else non-blank is a custom subject.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        let builtin = BuiltinSubject::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(trimmed));
        Some(match builtin {
            Some(b) => Subject::Builtin(b),
            None => Subject::Custom(trimmed.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            Subject::Builtin(b) => b.as_str(),
            Subject::Custom(name) => name,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Subject::Custom(_))
    }
}

impl Default for Subject {
    fn default() -> Self {
        Subject::Builtin(BuiltinSubject::Other)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AssignmentType {
    #[default]
    Homework,
    Test,
}

impl AssignmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentType::Homework => "homework",
            AssignmentType::Test => "test",
        }
    }
}

impl FromStr for AssignmentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "homework" => Ok(AssignmentType::Homework),
            "test" => Ok(AssignmentType::Test),
            _ => Err(ParseEnumError::new("assignment type", s)),
        }
    }
}

impl fmt::Display for AssignmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of an assignment. Any value may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AssignmentStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub const ALL: [AssignmentStatus; 3] = [
        AssignmentStatus::NotStarted,
        AssignmentStatus::InProgress,
        AssignmentStatus::Completed,
    ];

    /// The label stored in the `assignments.status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::NotStarted => "Not Started",
            AssignmentStatus::InProgress => "In Progress",
            AssignmentStatus::Completed => "Completed",
        }
    }

    /// The token used in the dashboard `filter` query parameter.
    pub fn query_token(self) -> &'static str {
        match self {
            AssignmentStatus::NotStarted => "not_started",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
        }
    }
}

impl FromStr for AssignmentStatus {
    type Err = ParseEnumError;

    /// Accepts both the stored label and the query token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        AssignmentStatus::ALL
            .into_iter()
            .find(|st| {
                st.as_str().eq_ignore_ascii_case(trimmed)
                    || st.query_token().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| ParseEnumError::new("assignment status", s))
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Assignments
//=========================================================================================

/// A homework or test record tracked for one student.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub subject: Subject,
    pub assignment_type: AssignmentType,
    pub due_date: DateTime<Utc>,
    pub status: AssignmentStatus,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn is_completed(&self) -> bool {
        self.status == AssignmentStatus::Completed
    }
}

/// Fields supplied when creating an assignment. Status starts at `NotStarted`
/// and `archived` at false.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAssignment {
    pub title: String,
    pub description: Option<String>,
    pub subject: Subject,
    pub assignment_type: AssignmentType,
    pub due_date: DateTime<Utc>,
}

/// A partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub subject: Option<Subject>,
    pub assignment_type: Option<AssignmentType>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<AssignmentStatus>,
    pub archived: Option<bool>,
}

impl AssignmentPatch {
    pub fn status(status: AssignmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn archived(archived: bool) -> Self {
        Self {
            archived: Some(archived),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Writes every present field onto `target` and bumps `updated_at`.
    pub fn apply_to(&self, target: &mut Assignment, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            target.title = title.clone();
        }
        if let Some(description) = &self.description {
            target.description = description.clone();
        }
        if let Some(subject) = &self.subject {
            target.subject = subject.clone();
        }
        if let Some(kind) = self.assignment_type {
            target.assignment_type = kind;
        }
        if let Some(due) = self.due_date {
            target.due_date = due;
        }
        if let Some(status) = self.status {
            target.status = status;
        }
        if let Some(archived) = self.archived {
            target.archived = archived;
        }
        target.updated_at = now;
    }
}

/// Filter for listing assignments. Rows outside the caller's visibility are
/// dropped by the repository regardless of `owner_ids`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentFilter {
    pub owner_ids: Vec<Uuid>,
    pub archived: Option<bool>,
}

/// A file attached to an assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub file_name: String,
    pub storage_path: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAttachment {
    pub assignment_id: Uuid,
    pub file_name: String,
    pub storage_path: String,
    pub content_type: String,
    pub size: i64,
}

//=========================================================================================
// Per-user customisation
//=========================================================================================

/// A user-defined subject with its English and Hebrew display names.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSubject {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name_en: String,
    pub name_he: String,
    pub created_at: DateTime<Utc>,
}

impl CustomSubject {
    pub fn subject(&self) -> Subject {
        Subject::Custom(self.name_en.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectNames {
    pub name_en: String,
    pub name_he: String,
}

/// A per-user override of one UI text key. `page == None` applies everywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomTranslation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key: String,
    pub text_en: String,
    pub text_he: String,
    pub page: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTranslation {
    pub key: String,
    pub text_en: String,
    pub text_he: String,
    pub page: Option<String>,
}

/// A user-defined page addressed by slug.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomPage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slug: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomPage {
    pub slug: String,
    pub title: String,
}

//=========================================================================================
// Relationships
//=========================================================================================

/// Directional link: the parent may view and aggregate the student's assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentStudentRelationship {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub student_id: Uuid,
    pub relationship_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A generic link between two users (siblings, tutors, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct UserRelationship {
    pub id: Uuid,
    pub user_id: Uuid,
    pub related_user_id: Uuid,
    pub relationship_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Theming
//=========================================================================================

/// One (element selector, hex color) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementColor {
    pub element: String,
    pub color: String,
}

impl ElementColor {
    pub fn new(element: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            element: element.into(),
            color: color.into(),
        }
    }
}

/// A named set of element colors. Presets have no owner.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTheme {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub is_preset: bool,
    pub colors: Vec<ElementColor>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Users and auth
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileRole {
    Student,
    Parent,
}

impl ProfileRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileRole::Student => "student",
            ProfileRole::Parent => "parent",
        }
    }
}

impl FromStr for ProfileRole {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(ProfileRole::Student),
            "parent" => Ok(ProfileRole::Parent),
            _ => Err(ParseEnumError::new("profile role", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<ProfileRole>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    pub display_name: Option<Option<String>>,
    pub role: Option<Option<ProfileRole>>,
}

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
