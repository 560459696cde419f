//! services/api/src/web/assignments.rs
//!
//! Dashboard, archive, assignment CRUD and attachments.
//!
//! Reads go through the per-user query cache; writes go through the mutation
//! services, which invalidate it.

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use homework_core::domain::{
    Assignment, AssignmentPatch, AssignmentStatus, AssignmentType, Subject,
};
use homework_core::filter::{self, FilterConfig, StatusFilter};
use homework_core::forms::{AssignmentDraft, ValidationError};
use homework_core::ports::PortError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::rest::{assignment_dtos, double_option, AssignmentDto, AttachmentDto};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// A status token (`not_started`, `in_progress`, `completed`), a view mode
    /// (`student`, `parent`) or `all`.
    pub filter: Option<String>,
    #[serde(default)]
    pub hide_completed: bool,
    pub subject: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    /// The value to write back into the `filter` query parameter.
    pub filter: Option<String>,
    pub status_filter: String,
    pub view_mode: String,
    pub hide_completed: bool,
    /// True when the list predates the latest mutation.
    pub stale: bool,
    /// The last fetch failure, shown as a transient notification.
    pub notice: Option<String>,
    pub assignments: Vec<AssignmentDto>,
    pub upcoming: Vec<AssignmentDto>,
    pub homework: Vec<AssignmentDto>,
    pub tests: Vec<AssignmentDto>,
}

#[derive(Serialize, ToSchema)]
pub struct ArchiveResponse {
    pub stale: bool,
    pub notice: Option<String>,
    pub assignments: Vec<AssignmentDto>,
}

/// The assignment form. Missing strings are treated as blank.
#[derive(Deserialize, ToSchema)]
pub struct AssignmentRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    pub assignment_type: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

impl AssignmentRequest {
    fn into_draft(self) -> ApiResult<AssignmentDraft> {
        Ok(AssignmentDraft {
            title: self.title,
            description: self.description.unwrap_or_default(),
            subject: self.subject.unwrap_or_default(),
            assignment_type: parse_or_default::<AssignmentType>(self.assignment_type)?,
            due_date: self.due_date,
            status: parse_or_default::<AssignmentStatus>(self.status)?,
        })
    }
}

/// A partial update. Absent fields are left alone; `description: null` clears it.
#[derive(Deserialize, ToSchema, Default)]
pub struct AssignmentPatchRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub subject: Option<String>,
    pub assignment_type: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub archived: Option<bool>,
}

impl AssignmentPatchRequest {
    fn into_patch(self) -> ApiResult<AssignmentPatch> {
        Ok(AssignmentPatch {
            title: self.title,
            description: self
                .description
                .map(|d| d.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())),
            subject: self
                .subject
                .map(|s| Subject::parse(&s).ok_or_else(|| ValidationError::required("subject")))
                .transpose()?,
            assignment_type: self.assignment_type.map(|t| t.parse()).transpose()?,
            due_date: self.due_date,
            status: self.status.map(|s| s.parse()).transpose()?,
            archived: self.archived,
        })
    }
}

#[derive(Deserialize, ToSchema)]
pub struct StatusRequest {
    /// `Not Started`, `In Progress`, `Completed` or the matching query token.
    pub status: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ArchivedRequest {
    pub archived: bool,
}

fn parse_or_default<T>(raw: Option<String>) -> ApiResult<T>
where
    T: std::str::FromStr + Default,
    ApiError: From<T::Err>,
{
    match raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Ok(s.parse::<T>()?),
        None => Ok(T::default()),
    }
}

fn status_filter_name(filter: StatusFilter) -> &'static str {
    match filter {
        StatusFilter::All => "all",
        StatusFilter::Only(status) => status.query_token(),
    }
}

//=========================================================================================
// Cached reads
//=========================================================================================

struct Snapshot {
    list: Arc<Vec<Assignment>>,
    stale: bool,
    notice: Option<String>,
}

/// The caller's cached list. Stale data is served alongside the error that kept
/// it stale; with nothing cached the error itself is returned.
async fn snapshot(state: &AppState, user_id: Uuid) -> ApiResult<Snapshot> {
    let cached = state.query.fetch(user_id).await;
    match cached.data {
        Some(list) => {
            if let Some(e) = &cached.error {
                warn!(%user_id, error = %e, "Serving stale assignments");
            }
            Ok(Snapshot {
                list,
                stale: !cached.fresh,
                notice: cached.error.map(|e| e.to_string()),
            })
        }
        None => Err(cached
            .error
            .unwrap_or_else(|| PortError::Remote("Assignments unavailable".to_string()))
            .into()),
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /dashboard - Filtered active assignments and their buckets
#[utoipa::path(
    get,
    path = "/dashboard",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Dashboard view", body = DashboardResponse),
        (status = 502, description = "Assignments could not be fetched")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<DashboardResponse>> {
    let snapshot = snapshot(&state, user_id).await?;
    let config = FilterConfig::from_query(query.filter.as_deref(), query.hide_completed);

    let mut rows = filter::active(&snapshot.list);
    if let Some(subject) = query.subject.as_deref().and_then(Subject::parse) {
        rows = filter::with_subject(&rows, &subject);
    }
    let rows = filter::filter_assignments(&rows, &config, user_id);
    let buckets = filter::partition(&rows, Utc::now());

    Ok(Json(DashboardResponse {
        filter: config.query_value().map(str::to_string),
        status_filter: status_filter_name(config.status).to_string(),
        view_mode: config.view_mode.as_str().to_string(),
        hide_completed: config.hide_completed,
        stale: snapshot.stale,
        notice: snapshot.notice,
        assignments: assignment_dtos(&rows),
        upcoming: assignment_dtos(&buckets.upcoming),
        homework: assignment_dtos(&buckets.homework),
        tests: assignment_dtos(&buckets.tests),
    }))
}

/// GET /archive - Archived assignments
#[utoipa::path(
    get,
    path = "/archive",
    responses((status = 200, description = "Archived assignments", body = ArchiveResponse))
)]
pub async fn archive_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<ArchiveResponse>> {
    let snapshot = snapshot(&state, user_id).await?;
    Ok(Json(ArchiveResponse {
        stale: snapshot.stale,
        notice: snapshot.notice,
        assignments: assignment_dtos(&filter::archived(&snapshot.list)),
    }))
}

/// POST /assignments - Create an assignment
#[utoipa::path(
    post,
    path = "/assignments",
    request_body = AssignmentRequest,
    responses(
        (status = 201, description = "Assignment created", body = AssignmentDto),
        (status = 422, description = "Missing title or due date")
    )
)]
pub async fn create_assignment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<AssignmentRequest>,
) -> ApiResult<impl IntoResponse> {
    let draft = req.into_draft()?;
    let created = state.assignments.create(user_id, &draft).await?;
    Ok((StatusCode::CREATED, Json(AssignmentDto::from(&created))))
}

/// GET /assignments/{id} - One visible assignment
#[utoipa::path(
    get,
    path = "/assignments/{id}",
    params(("id" = Uuid, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "The assignment", body = AssignmentDto),
        (status = 404, description = "Not found or not visible")
    )
)]
pub async fn get_assignment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AssignmentDto>> {
    let assignment = state.assignments.get(user_id, id).await?;
    Ok(Json(AssignmentDto::from(&assignment)))
}

/// PUT /assignments/{id} - Submit the edit form
///
/// Only fields that differ from the stored row are written.
#[utoipa::path(
    put,
    path = "/assignments/{id}",
    params(("id" = Uuid, Path, description = "Assignment id")),
    request_body = AssignmentRequest,
    responses(
        (status = 200, description = "Assignment updated", body = AssignmentDto),
        (status = 404, description = "Not found or not visible"),
        (status = 422, description = "Missing title or due date")
    )
)]
pub async fn edit_assignment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignmentRequest>,
) -> ApiResult<Json<AssignmentDto>> {
    let draft = req.into_draft()?;
    let updated = state.assignments.edit(user_id, id, &draft).await?;
    Ok(Json(AssignmentDto::from(&updated)))
}

/// PATCH /assignments/{id} - Partial update
#[utoipa::path(
    patch,
    path = "/assignments/{id}",
    params(("id" = Uuid, Path, description = "Assignment id")),
    request_body = AssignmentPatchRequest,
    responses(
        (status = 200, description = "Assignment updated", body = AssignmentDto),
        (status = 404, description = "Not found or not visible")
    )
)]
pub async fn patch_assignment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignmentPatchRequest>,
) -> ApiResult<Json<AssignmentDto>> {
    let patch = req.into_patch()?;
    let updated = if patch.is_empty() {
        state.assignments.get(user_id, id).await?
    } else {
        state.assignments.update(user_id, id, &patch).await?
    };
    Ok(Json(AssignmentDto::from(&updated)))
}

/// DELETE /assignments/{id} - Delete an assignment (owner only)
#[utoipa::path(
    delete,
    path = "/assignments/{id}",
    params(("id" = Uuid, Path, description = "Assignment id")),
    responses(
        (status = 204, description = "Assignment deleted"),
        (status = 404, description = "Not found or not owned")
    )
)]
pub async fn delete_assignment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.assignments.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /assignments/{id}/status - Change the status
#[utoipa::path(
    put,
    path = "/assignments/{id}/status",
    params(("id" = Uuid, Path, description = "Assignment id")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status changed", body = AssignmentDto),
        (status = 400, description = "Unknown status")
    )
)]
pub async fn set_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<AssignmentDto>> {
    let status: AssignmentStatus = req.status.parse()?;
    let updated = state.assignments.set_status(user_id, id, status).await?;
    Ok(Json(AssignmentDto::from(&updated)))
}

/// PUT /assignments/{id}/archived - Archive or restore
#[utoipa::path(
    put,
    path = "/assignments/{id}/archived",
    params(("id" = Uuid, Path, description = "Assignment id")),
    request_body = ArchivedRequest,
    responses((status = 200, description = "Archive flag changed", body = AssignmentDto))
)]
pub async fn set_archived_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<ArchivedRequest>,
) -> ApiResult<Json<AssignmentDto>> {
    let updated = state
        .assignments
        .set_archived(user_id, id, req.archived)
        .await?;
    Ok(Json(AssignmentDto::from(&updated)))
}

//=========================================================================================
// Attachments
//=========================================================================================

/// GET /assignments/{id}/attachments - Files attached to an assignment
#[utoipa::path(
    get,
    path = "/assignments/{id}/attachments",
    params(("id" = Uuid, Path, description = "Assignment id")),
    responses((status = 200, description = "Attachments", body = [AttachmentDto]))
)]
pub async fn list_attachments_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<AttachmentDto>>> {
    let views = state.attachments.list(user_id, id).await?;
    Ok(Json(views.into_iter().map(AttachmentDto::from).collect()))
}

/// POST /assignments/{id}/attachments - Upload a file
///
/// Accepts a multipart/form-data request; the first part carrying a file name
/// is stored.
#[utoipa::path(
    post,
    path = "/assignments/{id}/attachments",
    params(("id" = Uuid, Path, description = "Assignment id")),
    request_body(content_type = "multipart/form-data", description = "The file to attach."),
    responses(
        (status = 201, description = "File attached", body = AttachmentDto),
        (status = 400, description = "No file part"),
        (status = 500, description = "File stored but not recorded")
    )
)]
pub async fn upload_attachment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("Failed to read multipart data: {}", e.body_text()))
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;

        let view = state
            .attachments
            .upload(user_id, id, &file_name, &content_type, data)
            .await?;
        info!(%user_id, assignment_id = %id, attachment_id = %view.attachment.id, "Attachment uploaded");
        return Ok((StatusCode::CREATED, Json(AttachmentDto::from(view))));
    }

    Err(ApiError::BadRequest(
        "Multipart form must include a file".to_string(),
    ))
}

/// DELETE /attachments/{id} - Remove a file and its record
#[utoipa::path(
    delete,
    path = "/attachments/{id}",
    params(("id" = Uuid, Path, description = "Attachment id")),
    responses(
        (status = 204, description = "Attachment deleted"),
        (status = 404, description = "Not found or not visible")
    )
)]
pub async fn delete_attachment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.attachments.delete(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_type_and_status_fall_back_to_defaults() {
        let req = AssignmentRequest {
            title: "Essay".to_string(),
            description: None,
            subject: None,
            assignment_type: Some("  ".to_string()),
            due_date: None,
            status: None,
        };
        let draft = req.into_draft().unwrap();
        assert_eq!(draft.assignment_type, AssignmentType::Homework);
        assert_eq!(draft.status, AssignmentStatus::NotStarted);
    }

    #[test]
    fn unknown_type_is_a_bad_request() {
        let req = AssignmentRequest {
            title: "Essay".to_string(),
            description: None,
            subject: None,
            assignment_type: Some("quiz".to_string()),
            due_date: None,
            status: None,
        };
        assert!(matches!(req.into_draft(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn patch_request_clears_blank_description() {
        let req = AssignmentPatchRequest {
            description: Some(Some("   ".to_string())),
            status: Some("completed".to_string()),
            ..AssignmentPatchRequest::default()
        };
        let patch = req.into_patch().unwrap();
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.status, Some(AssignmentStatus::Completed));
        assert_eq!(patch.title, None);
    }

    #[test]
    fn patch_request_rejects_blank_subject() {
        let req = AssignmentPatchRequest {
            subject: Some("  ".to_string()),
            ..AssignmentPatchRequest::default()
        };
        match req.into_patch() {
            Err(ApiError::Validation(e)) => assert_eq!(e.field, "subject"),
            _ => panic!("blank subject must be a field error"),
        }

        let req = AssignmentPatchRequest {
            subject: Some("robotics".to_string()),
            ..AssignmentPatchRequest::default()
        };
        assert_eq!(
            req.into_patch().unwrap().subject,
            Some(Subject::Custom("robotics".to_string()))
        );
    }
}
