//! services/api/src/web/settings.rs
//!
//! The settings view: custom subjects, translation overrides, profile and
//! family links.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use homework_core::domain::{BuiltinSubject, ProfileRole};
use homework_core::forms::{
    FormState, ProfileDraft, SubjectDraft, TranslationDraft, ValidationError,
};
use homework_core::ports::PortError;
use homework_core::theme;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::rest::{
    ContextDto, ElementColorDto, ParentLinkDto, ProfileDto, SubjectDto, ThemeDto, TranslationDto,
    UserLinkDto,
};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct SettingsResponse {
    pub profile: ProfileDto,
    pub context: ContextDto,
    pub subjects: SubjectsResponse,
    pub translations: Vec<TranslationDto>,
    pub relationships: RelationshipsResponse,
    pub themes: Vec<ThemeDto>,
    pub colors: Vec<ElementColorDto>,
}

#[derive(Serialize, ToSchema)]
pub struct SubjectsResponse {
    pub builtin: Vec<String>,
    pub custom: Vec<SubjectDto>,
}

/// Absent fields keep the form's current value: blank on create, the stored
/// value on edit.
#[derive(Deserialize, ToSchema, Default)]
pub struct SubjectRequest {
    pub name_en: Option<String>,
    pub name_he: Option<String>,
}

impl SubjectRequest {
    fn fill(self, draft: &mut SubjectDraft) {
        if let Some(name_en) = self.name_en {
            draft.name_en = name_en;
        }
        if let Some(name_he) = self.name_he {
            draft.name_he = name_he;
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
pub struct TranslationRequest {
    pub key: Option<String>,
    pub text_en: Option<String>,
    pub text_he: Option<String>,
    /// Blank applies the override on every page.
    pub page: Option<String>,
}

impl TranslationRequest {
    fn fill(self, draft: &mut TranslationDraft) {
        if let Some(key) = self.key {
            draft.key = key;
        }
        if let Some(text_en) = self.text_en {
            draft.text_en = text_en;
        }
        if let Some(text_he) = self.text_he {
            draft.text_he = text_he;
        }
        if let Some(page) = self.page {
            draft.page = page;
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
pub struct ProfileRequest {
    pub display_name: Option<String>,
    /// `student`, `parent`, blank to clear, or absent to keep.
    pub role: Option<String>,
}

impl ProfileRequest {
    fn fill(self, draft: &mut ProfileDraft) -> ApiResult<()> {
        if let Some(display_name) = self.display_name {
            draft.display_name = display_name;
        }
        if let Some(role) = self.role {
            let role = role.trim();
            draft.role = if role.is_empty() {
                None
            } else {
                Some(role.parse::<ProfileRole>()?)
            };
        }
        Ok(())
    }
}

#[derive(Serialize, ToSchema)]
pub struct RelationshipsResponse {
    /// Links where the caller is parent or student.
    pub parent_links: Vec<ParentLinkDto>,
    pub user_links: Vec<UserLinkDto>,
}

#[derive(Deserialize, ToSchema)]
pub struct LinkRequest {
    /// Email of the other user.
    pub email: String,
    pub relationship_type: Option<String>,
}

fn builtin_subjects() -> Vec<String> {
    BuiltinSubject::ALL
        .iter()
        .map(|s| s.as_str().to_string())
        .collect()
}

/// Resolves the other end of a link by email. Linking to oneself is rejected.
async fn resolve_other_user(state: &AppState, caller: Uuid, email: &str) -> ApiResult<Uuid> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::required("email").into());
    }
    let other = state.accounts.get_user_by_email(email).await?;
    if other.user_id == caller {
        return Err(ValidationError::new("email", "cannot link to yourself").into());
    }
    Ok(other.user_id)
}

fn create_form<D: Default>() -> FormState<D> {
    let mut form = FormState::default();
    form.open_create();
    form
}

/// An edit form opened on a stored row.
fn edit_form<D: Default>(id: Uuid, stored: D) -> FormState<D> {
    let mut form = FormState::default();
    form.open_edit(id, stored);
    form
}

fn relationship_type(raw: Option<String>) -> Option<String> {
    raw.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

//=========================================================================================
// Overview
//=========================================================================================

/// GET /settings - Everything the settings view shows, in one round trip
#[utoipa::path(
    get,
    path = "/settings",
    responses((status = 200, description = "Settings view", body = SettingsResponse))
)]
pub async fn settings_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<SettingsResponse>> {
    let user = state.accounts.get_user(user_id).await?;
    let (profile, subjects, translations, parent_links, user_links, themes, colors) = futures::try_join!(
        state.profiles.get_or_create(user_id, user.email.as_deref()),
        state.subjects.list(user_id),
        state.translations.list(user_id),
        state.relationships.list_parent_links(user_id),
        state.relationships.list_user_relationships(user_id),
        state.themes.list_themes(user_id),
        state.themes.list_element_colors(user_id),
    )?;

    let themes = theme::presets()
        .into_iter()
        .chain(themes)
        .map(ThemeDto::from)
        .collect();

    Ok(Json(SettingsResponse {
        profile: profile.into(),
        context: state.contexts.get(user_id).into(),
        subjects: SubjectsResponse {
            builtin: builtin_subjects(),
            custom: subjects.into_iter().map(SubjectDto::from).collect(),
        },
        translations: translations.into_iter().map(TranslationDto::from).collect(),
        relationships: RelationshipsResponse {
            parent_links: parent_links.into_iter().map(ParentLinkDto::from).collect(),
            user_links: user_links.into_iter().map(UserLinkDto::from).collect(),
        },
        themes,
        colors: colors.into_iter().map(ElementColorDto::from).collect(),
    }))
}

//=========================================================================================
// Subjects
//=========================================================================================

/// GET /subjects - Builtin and custom subjects
#[utoipa::path(
    get,
    path = "/subjects",
    responses((status = 200, description = "Subjects", body = SubjectsResponse))
)]
pub async fn list_subjects_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<SubjectsResponse>> {
    let custom = state.subjects.list(user_id).await?;
    Ok(Json(SubjectsResponse {
        builtin: builtin_subjects(),
        custom: custom.into_iter().map(SubjectDto::from).collect(),
    }))
}

/// POST /subjects - Add a custom subject
#[utoipa::path(
    post,
    path = "/subjects",
    request_body = SubjectRequest,
    responses(
        (status = 201, description = "Subject created", body = SubjectDto),
        (status = 422, description = "A language name is missing")
    )
)]
pub async fn create_subject_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<SubjectRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut form = create_form::<SubjectDraft>();
    req.fill(&mut form.draft);
    let names = form.draft.validate()?;
    let subject = state.subjects.create(user_id, &names).await?;
    info!(%user_id, subject_id = %subject.id, "Custom subject created");
    Ok((StatusCode::CREATED, Json(SubjectDto::from(subject))))
}

/// PUT /subjects/{id} - Rename a custom subject
///
/// Names left out of the body keep their stored value.
#[utoipa::path(
    put,
    path = "/subjects/{id}",
    params(("id" = Uuid, Path, description = "Subject id")),
    request_body = SubjectRequest,
    responses((status = 200, description = "Subject updated", body = SubjectDto))
)]
pub async fn update_subject_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubjectRequest>,
) -> ApiResult<Json<SubjectDto>> {
    let stored = state
        .subjects
        .list(user_id)
        .await?
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| PortError::NotFound(format!("Subject {} not found", id)))?;
    let mut form = edit_form(id, SubjectDraft::from_subject(&stored));
    req.fill(&mut form.draft);
    let names = form.draft.validate()?;
    let subject = state.subjects.update(user_id, id, &names).await?;
    Ok(Json(subject.into()))
}

/// DELETE /subjects/{id} - Remove a custom subject
#[utoipa::path(
    delete,
    path = "/subjects/{id}",
    params(("id" = Uuid, Path, description = "Subject id")),
    responses((status = 204, description = "Subject deleted"))
)]
pub async fn delete_subject_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.subjects.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Translations
//=========================================================================================

/// GET /translations - The caller's text overrides
#[utoipa::path(
    get,
    path = "/translations",
    responses((status = 200, description = "Overrides", body = [TranslationDto]))
)]
pub async fn list_translations_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Vec<TranslationDto>>> {
    let rows = state.translations.list(user_id).await?;
    Ok(Json(rows.into_iter().map(TranslationDto::from).collect()))
}

/// POST /translations - Add a text override
#[utoipa::path(
    post,
    path = "/translations",
    request_body = TranslationRequest,
    responses(
        (status = 201, description = "Override created", body = TranslationDto),
        (status = 422, description = "Key or text missing")
    )
)]
pub async fn create_translation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<TranslationRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut form = create_form::<TranslationDraft>();
    req.fill(&mut form.draft);
    let fields = form.draft.validate()?;
    let row = state.translations.create(user_id, &fields).await?;
    Ok((StatusCode::CREATED, Json(TranslationDto::from(row))))
}

/// PUT /translations/{id} - Edit a text override
///
/// Fields left out of the body keep their stored value.
#[utoipa::path(
    put,
    path = "/translations/{id}",
    params(("id" = Uuid, Path, description = "Override id")),
    request_body = TranslationRequest,
    responses((status = 200, description = "Override updated", body = TranslationDto))
)]
pub async fn update_translation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<TranslationRequest>,
) -> ApiResult<Json<TranslationDto>> {
    let stored = state
        .translations
        .list(user_id)
        .await?
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| PortError::NotFound(format!("Translation {} not found", id)))?;
    let mut form = edit_form(id, TranslationDraft::from_translation(&stored));
    req.fill(&mut form.draft);
    let fields = form.draft.validate()?;
    let row = state.translations.update(user_id, id, &fields).await?;
    Ok(Json(row.into()))
}

/// DELETE /translations/{id} - Remove a text override
#[utoipa::path(
    delete,
    path = "/translations/{id}",
    params(("id" = Uuid, Path, description = "Override id")),
    responses((status = 204, description = "Override deleted"))
)]
pub async fn delete_translation_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.translations.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Profile
//=========================================================================================

/// GET /profile - The caller's profile
#[utoipa::path(
    get,
    path = "/profile",
    responses((status = 200, description = "Profile", body = ProfileDto))
)]
pub async fn get_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<ProfileDto>> {
    let user = state.accounts.get_user(user_id).await?;
    let profile = state
        .profiles
        .get_or_create(user_id, user.email.as_deref())
        .await?;
    Ok(Json(profile.into()))
}

/// PUT /profile - Submit the profile form
#[utoipa::path(
    put,
    path = "/profile",
    request_body = ProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileDto),
        (status = 422, description = "Display name too long")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<ProfileRequest>,
) -> ApiResult<Json<ProfileDto>> {
    let user = state.accounts.get_user(user_id).await?;
    let stored = state
        .profiles
        .get_or_create(user_id, user.email.as_deref())
        .await?;
    let mut form = edit_form(user_id, ProfileDraft::from_profile(&stored));
    req.fill(&mut form.draft)?;
    let patch = form.draft.validate()?;

    let profile = state.profiles.update(user_id, &patch).await?;
    Ok(Json(profile.into()))
}

//=========================================================================================
// Relationships
//=========================================================================================

/// GET /relationships - Parent/student and general links involving the caller
#[utoipa::path(
    get,
    path = "/relationships",
    responses((status = 200, description = "Links", body = RelationshipsResponse))
)]
pub async fn list_relationships_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<RelationshipsResponse>> {
    let (parent_links, user_links) = futures::try_join!(
        state.relationships.list_parent_links(user_id),
        state.relationships.list_user_relationships(user_id),
    )?;
    Ok(Json(RelationshipsResponse {
        parent_links: parent_links.into_iter().map(ParentLinkDto::from).collect(),
        user_links: user_links.into_iter().map(UserLinkDto::from).collect(),
    }))
}

/// POST /relationships/students - Link a student to the caller as parent
#[utoipa::path(
    post,
    path = "/relationships/students",
    request_body = LinkRequest,
    responses(
        (status = 201, description = "Student linked", body = ParentLinkDto),
        (status = 404, description = "No user with that email"),
        (status = 409, description = "Already linked")
    )
)]
pub async fn link_student_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<LinkRequest>,
) -> ApiResult<impl IntoResponse> {
    let student_id = resolve_other_user(&state, user_id, &req.email).await?;
    let kind = relationship_type(req.relationship_type);
    let link = state
        .relationships
        .create_parent_link(user_id, student_id, kind.as_deref())
        .await?;
    // The parent's visible set just grew.
    state.query.invalidate(user_id);
    info!(parent_id = %user_id, %student_id, "Student linked");
    Ok((StatusCode::CREATED, Json(ParentLinkDto::from(link))))
}

/// DELETE /relationships/students/{id} - Remove a parent/student link
#[utoipa::path(
    delete,
    path = "/relationships/students/{id}",
    params(("id" = Uuid, Path, description = "Link id")),
    responses((status = 204, description = "Link removed"))
)]
pub async fn unlink_student_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.relationships.delete_parent_link(user_id, id).await?;
    // Either endpoint may unlink, so the parent's list may be the one affected.
    state.query.invalidate_all();
    Ok(StatusCode::NO_CONTENT)
}

/// POST /relationships/users - Link another user
#[utoipa::path(
    post,
    path = "/relationships/users",
    request_body = LinkRequest,
    responses(
        (status = 201, description = "User linked", body = UserLinkDto),
        (status = 404, description = "No user with that email")
    )
)]
pub async fn link_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<LinkRequest>,
) -> ApiResult<impl IntoResponse> {
    let related = resolve_other_user(&state, user_id, &req.email).await?;
    let kind = relationship_type(req.relationship_type);
    let link = state
        .relationships
        .create_user_relationship(user_id, related, kind.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(UserLinkDto::from(link))))
}

/// DELETE /relationships/users/{id} - Remove a general link
#[utoipa::path(
    delete,
    path = "/relationships/users/{id}",
    params(("id" = Uuid, Path, description = "Link id")),
    responses((status = 204, description = "Link removed"))
)]
pub async fn unlink_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .relationships
        .delete_user_relationship(user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use homework_core::domain::{CustomSubject, Profile};

    #[test]
    fn subject_edit_keeps_names_left_out() {
        let stored = CustomSubject {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name_en: "Art".to_string(),
            name_he: "אמנות".to_string(),
            created_at: Utc::now(),
        };
        let mut form = edit_form(stored.id, SubjectDraft::from_subject(&stored));
        SubjectRequest {
            name_en: Some("Fine art".to_string()),
            ..SubjectRequest::default()
        }
        .fill(&mut form.draft);

        let names = form.draft.validate().unwrap();
        assert_eq!(names.name_en, "Fine art");
        assert_eq!(names.name_he, "אמנות");
    }

    #[test]
    fn blank_role_clears_and_absent_role_keeps() {
        let stored = Profile {
            user_id: Uuid::new_v4(),
            email: Some("kid@example.com".to_string()),
            display_name: Some("Noa".to_string()),
            role: Some(ProfileRole::Student),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let mut kept = ProfileDraft::from_profile(&stored);
        ProfileRequest::default().fill(&mut kept).unwrap();
        assert_eq!(kept.role, Some(ProfileRole::Student));
        assert_eq!(kept.display_name, "Noa");

        let mut cleared = ProfileDraft::from_profile(&stored);
        ProfileRequest {
            role: Some(" ".to_string()),
            ..ProfileRequest::default()
        }
        .fill(&mut cleared)
        .unwrap();
        assert_eq!(cleared.role, None);

        let mut bad = ProfileDraft::from_profile(&stored);
        let err = ProfileRequest {
            role: Some("teacher".to_string()),
            ..ProfileRequest::default()
        }
        .fill(&mut bad)
        .unwrap_err();
        assert!(matches!(err, crate::error::ApiError::BadRequest(_)));
    }
}
