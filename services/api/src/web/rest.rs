//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification and the JSON payloads
//! shared by the REST handlers.

use chrono::{DateTime, Utc};
use homework_core::domain::{
    Assignment, ColorTheme, CustomPage, CustomSubject, CustomTranslation, ElementColor,
    ParentStudentRelationship, Profile, UserRelationship,
};
use homework_core::context::UiContext;
use homework_core::service::AttachmentView;
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::{assignments, auth, pages, settings, theme};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::session_handler,
        auth::request_password_reset_handler,
        auth::confirm_password_reset_handler,
        assignments::dashboard_handler,
        assignments::archive_handler,
        assignments::create_assignment_handler,
        assignments::get_assignment_handler,
        assignments::edit_assignment_handler,
        assignments::patch_assignment_handler,
        assignments::delete_assignment_handler,
        assignments::set_status_handler,
        assignments::set_archived_handler,
        assignments::list_attachments_handler,
        assignments::upload_attachment_handler,
        assignments::delete_attachment_handler,
        settings::settings_handler,
        settings::list_subjects_handler,
        settings::create_subject_handler,
        settings::update_subject_handler,
        settings::delete_subject_handler,
        settings::list_translations_handler,
        settings::create_translation_handler,
        settings::update_translation_handler,
        settings::delete_translation_handler,
        settings::get_profile_handler,
        settings::update_profile_handler,
        settings::list_relationships_handler,
        settings::link_student_handler,
        settings::unlink_student_handler,
        settings::link_user_handler,
        settings::unlink_user_handler,
        pages::i18n_handler,
        pages::get_context_handler,
        pages::update_context_handler,
        pages::toggle_fun_mode_handler,
        pages::help_handler,
        pages::list_pages_handler,
        pages::create_page_handler,
        pages::get_page_handler,
        pages::delete_page_handler,
        theme::list_themes_handler,
        theme::save_theme_handler,
        theme::delete_theme_handler,
        theme::activate_theme_handler,
        theme::get_colors_handler,
        theme::set_colors_handler,
        theme::reset_colors_handler,
        theme::stylesheet_handler,
    ),
    components(
        schemas(
            AssignmentDto, AttachmentDto, SubjectDto, TranslationDto, ParentLinkDto,
            UserLinkDto, ProfileDto, ThemeDto, ElementColorDto, PageDto, ContextDto,
            ErrorBody,
        )
    ),
    tags(
        (name = "Homework Tracker API", description = "Assignments, family links and per-user customisation.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// Every failed request answers with this body.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    /// Set when a form field failed validation.
    pub field: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AssignmentDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub subject: String,
    pub custom_subject: bool,
    /// `homework` or `test`.
    pub assignment_type: String,
    pub due_date: DateTime<Utc>,
    /// `Not Started`, `In Progress` or `Completed`.
    pub status: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Assignment> for AssignmentDto {
    fn from(a: &Assignment) -> Self {
        Self {
            id: a.id,
            user_id: a.user_id,
            title: a.title.clone(),
            description: a.description.clone(),
            subject: a.subject.to_string(),
            custom_subject: a.subject.is_custom(),
            assignment_type: a.assignment_type.as_str().to_string(),
            due_date: a.due_date,
            status: a.status.as_str().to_string(),
            archived: a.archived,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

pub fn assignment_dtos(list: &[Assignment]) -> Vec<AssignmentDto> {
    list.iter().map(AssignmentDto::from).collect()
}

#[derive(Serialize, ToSchema)]
pub struct AttachmentDto {
    pub id: Uuid,
    pub assignment_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size: i64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<AttachmentView> for AttachmentDto {
    fn from(v: AttachmentView) -> Self {
        Self {
            id: v.attachment.id,
            assignment_id: v.attachment.assignment_id,
            file_name: v.attachment.file_name,
            content_type: v.attachment.content_type,
            size: v.attachment.size,
            url: v.url,
            created_at: v.attachment.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SubjectDto {
    pub id: Uuid,
    pub name_en: String,
    pub name_he: String,
    pub created_at: DateTime<Utc>,
}

impl From<CustomSubject> for SubjectDto {
    fn from(s: CustomSubject) -> Self {
        Self {
            id: s.id,
            name_en: s.name_en,
            name_he: s.name_he,
            created_at: s.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TranslationDto {
    pub id: Uuid,
    pub key: String,
    pub text_en: String,
    pub text_he: String,
    pub page: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<CustomTranslation> for TranslationDto {
    fn from(t: CustomTranslation) -> Self {
        Self {
            id: t.id,
            key: t.key,
            text_en: t.text_en,
            text_he: t.text_he,
            page: t.page,
            created_at: t.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ParentLinkDto {
    pub id: Uuid,
    pub parent_id: Uuid,
    pub student_id: Uuid,
    pub relationship_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ParentStudentRelationship> for ParentLinkDto {
    fn from(r: ParentStudentRelationship) -> Self {
        Self {
            id: r.id,
            parent_id: r.parent_id,
            student_id: r.student_id,
            relationship_type: r.relationship_type,
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UserLinkDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub related_user_id: Uuid,
    pub relationship_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRelationship> for UserLinkDto {
    fn from(r: UserRelationship) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            related_user_id: r.related_user_id,
            relationship_type: r.relationship_type,
            created_at: r.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProfileDto {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub display_name: Option<String>,
    /// `student`, `parent` or absent.
    pub role: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<Profile> for ProfileDto {
    fn from(p: Profile) -> Self {
        Self {
            user_id: p.user_id,
            email: p.email,
            display_name: p.display_name,
            role: p.role.map(|r| r.as_str().to_string()),
            updated_at: p.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, ToSchema)]
pub struct ElementColorDto {
    pub element: String,
    /// `#rgb` or `#rrggbb`.
    pub color: String,
}

impl From<ElementColor> for ElementColorDto {
    fn from(c: ElementColor) -> Self {
        Self {
            element: c.element,
            color: c.color,
        }
    }
}

impl From<ElementColorDto> for ElementColor {
    fn from(c: ElementColorDto) -> Self {
        ElementColor::new(c.element, c.color)
    }
}

#[derive(Serialize, ToSchema)]
pub struct ThemeDto {
    pub id: Uuid,
    pub name: String,
    pub is_preset: bool,
    pub colors: Vec<ElementColorDto>,
}

impl From<ColorTheme> for ThemeDto {
    fn from(t: ColorTheme) -> Self {
        Self {
            id: t.id,
            name: t.name,
            is_preset: t.is_preset,
            colors: t.colors.into_iter().map(ElementColorDto::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PageDto {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl From<CustomPage> for PageDto {
    fn from(p: CustomPage) -> Self {
        Self {
            id: p.id,
            slug: p.slug,
            title: p.title,
            created_at: p.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ContextDto {
    /// `en` or `he`.
    pub language: String,
    /// `ltr` or `rtl`.
    pub direction: String,
    pub fun_mode: bool,
}

impl From<UiContext> for ContextDto {
    fn from(c: UiContext) -> Self {
        Self {
            language: c.language.code().to_string(),
            direction: c.language.direction().to_string(),
            fun_mode: c.fun_mode,
        }
    }
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "double_option")]
        description: Option<Option<String>>,
    }

    #[test]
    fn absent_and_null_are_different() {
        let absent: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.description, None);
        let null: Probe = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(null.description, Some(None));
        let set: Probe = serde_json::from_str(r#"{"description":"x"}"#).unwrap();
        assert_eq!(set.description, Some(Some("x".to_string())));
    }

    #[test]
    fn openapi_document_lists_the_dashboard() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/dashboard"));
        assert!(doc.paths.paths.contains_key("/assignments/{id}"));
    }
}
