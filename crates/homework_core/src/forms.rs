//! crates/homework_core/src/forms.rs
//!
//! Draft state for the edit forms.
//!
//! A draft mirrors the editable fields of one entity, starts empty (create) or
//! from the entity (edit), and validates locally. Validation never touches a
//! port; a failing draft produces a field-level [`ValidationError`].

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Assignment, AssignmentPatch, AssignmentStatus, AssignmentType, CustomSubject,
    CustomTranslation, NewAssignment, NewCustomPage, NewTranslation, Profile, ProfilePatch,
    ProfileRole, Subject, SubjectNames,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn required(field: &'static str) -> Self {
        Self::new(field, "is required")
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::required(field));
    }
    Ok(trimmed.to_string())
}

fn optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

//=========================================================================================
// Form state
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormMode {
    #[default]
    Create,
    Edit(Uuid),
}

/// Open/closed toggle plus the draft being edited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState<D> {
    pub mode: FormMode,
    pub draft: D,
    pub open: bool,
}

impl<D: Default> FormState<D> {
    pub fn open_create(&mut self) {
        self.mode = FormMode::Create;
        self.draft = D::default();
        self.open = true;
    }

    pub fn open_edit(&mut self, id: Uuid, draft: D) {
        self.mode = FormMode::Edit(id);
        self.draft = draft;
        self.open = true;
    }
}

//=========================================================================================
// Assignment
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentDraft {
    pub title: String,
    pub description: String,
    pub subject: String,
    pub assignment_type: AssignmentType,
    pub due_date: Option<DateTime<Utc>>,
    pub status: AssignmentStatus,
}

impl AssignmentDraft {
    pub fn from_assignment(assignment: &Assignment) -> Self {
        Self {
            title: assignment.title.clone(),
            description: assignment.description.clone().unwrap_or_default(),
            subject: assignment.subject.to_string(),
            assignment_type: assignment.assignment_type,
            due_date: Some(assignment.due_date),
            status: assignment.status,
        }
    }

    /// Checks title and due date. A blank subject means `Other`.
    pub fn validate(&self) -> Result<NewAssignment, ValidationError> {
        let title = required("title", &self.title)?;
        let due_date = self.due_date.ok_or_else(|| ValidationError::required("due_date"))?;
        Ok(NewAssignment {
            title,
            description: optional(&self.description),
            subject: Subject::parse(&self.subject).unwrap_or_default(),
            assignment_type: self.assignment_type,
            due_date,
        })
    }

    /// Validates, then returns only the fields that differ from `original`.
    pub fn diff(&self, original: &Assignment) -> Result<AssignmentPatch, ValidationError> {
        let fields = self.validate()?;
        let mut patch = AssignmentPatch::default();
        if fields.title != original.title {
            patch.title = Some(fields.title);
        }
        if fields.description != original.description {
            patch.description = Some(fields.description);
        }
        if fields.subject != original.subject {
            patch.subject = Some(fields.subject);
        }
        if fields.assignment_type != original.assignment_type {
            patch.assignment_type = Some(fields.assignment_type);
        }
        if fields.due_date != original.due_date {
            patch.due_date = Some(fields.due_date);
        }
        if self.status != original.status {
            patch.status = Some(self.status);
        }
        Ok(patch)
    }
}

/// Rejects patches that would blank a required field.
pub fn validate_patch(patch: &AssignmentPatch) -> Result<(), ValidationError> {
    if let Some(title) = &patch.title {
        required("title", title)?;
    }
    Ok(())
}

//=========================================================================================
// Settings drafts
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectDraft {
    pub name_en: String,
    pub name_he: String,
}

impl SubjectDraft {
    pub fn from_subject(subject: &CustomSubject) -> Self {
        Self {
            name_en: subject.name_en.clone(),
            name_he: subject.name_he.clone(),
        }
    }

    /// Both language names are required.
    pub fn validate(&self) -> Result<SubjectNames, ValidationError> {
        Ok(SubjectNames {
            name_en: required("name_en", &self.name_en)?,
            name_he: required("name_he", &self.name_he)?,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationDraft {
    pub key: String,
    pub text_en: String,
    pub text_he: String,
    pub page: String,
}

impl TranslationDraft {
    pub fn from_translation(tr: &CustomTranslation) -> Self {
        Self {
            key: tr.key.clone(),
            text_en: tr.text_en.clone(),
            text_he: tr.text_he.clone(),
            page: tr.page.clone().unwrap_or_default(),
        }
    }

    /// A blank page means the override applies everywhere.
    pub fn validate(&self) -> Result<NewTranslation, ValidationError> {
        Ok(NewTranslation {
            key: required("key", &self.key)?,
            text_en: required("text_en", &self.text_en)?,
            text_he: required("text_he", &self.text_he)?,
            page: optional(&self.page),
        })
    }
}

pub const MAX_DISPLAY_NAME: usize = 80;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDraft {
    pub display_name: String,
    pub role: Option<ProfileRole>,
}

impl ProfileDraft {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            display_name: profile.display_name.clone().unwrap_or_default(),
            role: profile.role,
        }
    }

    pub fn validate(&self) -> Result<ProfilePatch, ValidationError> {
        let display_name = optional(&self.display_name);
        if display_name
            .as_ref()
            .is_some_and(|n| n.chars().count() > MAX_DISPLAY_NAME)
        {
            return Err(ValidationError::new(
                "display_name",
                format!("must be at most {} characters", MAX_DISPLAY_NAME),
            ));
        }
        Ok(ProfilePatch {
            display_name: Some(display_name),
            role: Some(self.role),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomPageDraft {
    pub slug: String,
    pub title: String,
}

impl CustomPageDraft {
    pub fn validate(&self) -> Result<NewCustomPage, ValidationError> {
        let slug = required("slug", &self.slug)?;
        if !is_valid_slug(&slug) {
            return Err(ValidationError::new(
                "slug",
                "must be 1-64 lower-case letters, digits or '-'",
            ));
        }
        Ok(NewCustomPage {
            slug,
            title: required("title", &self.title)?,
        })
    }
}

pub fn is_valid_slug(slug: &str) -> bool {
    (1..=64).contains(&slug.len())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThemeDraft {
    pub name: String,
}

impl ThemeDraft {
    pub fn validate(&self) -> Result<String, ValidationError> {
        required("name", &self.name)
    }
}
