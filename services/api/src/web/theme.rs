//! services/api/src/web/theme.rs
//!
//! Color themes: presets, saved themes, the active element colors and the
//! stylesheet they render to.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use homework_core::domain::ElementColor;
use homework_core::forms::ThemeDraft;
use homework_core::theme::{self, ThemeVariables};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::rest::{ElementColorDto, ThemeDto};
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct SaveThemeRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ColorsRequest {
    pub colors: Vec<ElementColorDto>,
}

#[derive(Serialize, ToSchema)]
pub struct ColorsResponse {
    /// The stored (element, hex) pairs. Empty means defaults.
    pub colors: Vec<ElementColorDto>,
    /// Every CSS variable with its `H S% L%` value.
    pub variables: BTreeMap<String, String>,
}

/// Builds the variables for `colors`. Stored colors were validated on write.
fn variables_for(colors: &[ElementColor]) -> ApiResult<ThemeVariables> {
    let mut vars = ThemeVariables::new();
    vars.apply(colors)?;
    Ok(vars)
}

fn colors_response(colors: Vec<ElementColor>) -> ApiResult<ColorsResponse> {
    let variables = variables_for(&colors)?.resolved();
    Ok(ColorsResponse {
        colors: colors.into_iter().map(ElementColorDto::from).collect(),
        variables,
    })
}

/// GET /themes - Presets followed by the caller's saved themes
#[utoipa::path(
    get,
    path = "/themes",
    responses((status = 200, description = "Themes", body = [ThemeDto]))
)]
pub async fn list_themes_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Vec<ThemeDto>>> {
    let saved = state.themes.list_themes(user_id).await?;
    Ok(Json(
        theme::presets()
            .into_iter()
            .chain(saved)
            .map(ThemeDto::from)
            .collect(),
    ))
}

/// POST /themes - Save the active colors as a named theme
#[utoipa::path(
    post,
    path = "/themes",
    request_body = SaveThemeRequest,
    responses(
        (status = 201, description = "Theme saved", body = ThemeDto),
        (status = 422, description = "Name missing")
    )
)]
pub async fn save_theme_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<SaveThemeRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = ThemeDraft { name: req.name }.validate()?;
    let saved = theme::save_current_theme(state.themes.as_ref(), user_id, &name).await?;
    info!(%user_id, theme_id = %saved.id, "Theme saved");
    Ok((StatusCode::CREATED, Json(ThemeDto::from(saved))))
}

/// DELETE /themes/{id} - Delete a saved theme
#[utoipa::path(
    delete,
    path = "/themes/{id}",
    params(("id" = Uuid, Path, description = "Theme id")),
    responses(
        (status = 204, description = "Theme deleted"),
        (status = 400, description = "Presets cannot be deleted")
    )
)]
pub async fn delete_theme_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if theme::presets().iter().any(|p| p.id == id) {
        return Err(ApiError::BadRequest(
            "Preset themes cannot be deleted".to_string(),
        ));
    }
    state.themes.delete_theme(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /themes/{id}/activate - Make a preset or saved theme the active colors
#[utoipa::path(
    post,
    path = "/themes/{id}/activate",
    params(("id" = Uuid, Path, description = "Theme id")),
    responses(
        (status = 200, description = "Active colors", body = ColorsResponse),
        (status = 404, description = "No such theme")
    )
)]
pub async fn activate_theme_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ColorsResponse>> {
    let colors = theme::activate_theme(state.themes.as_ref(), user_id, id).await?;
    Ok(Json(colors_response(colors)?))
}

/// GET /theme/colors - The active colors and resolved variables
#[utoipa::path(
    get,
    path = "/theme/colors",
    responses((status = 200, description = "Active colors", body = ColorsResponse))
)]
pub async fn get_colors_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<ColorsResponse>> {
    let colors = state.themes.list_element_colors(user_id).await?;
    Ok(Json(colors_response(colors)?))
}

/// PUT /theme/colors - Replace the active colors
///
/// Every pair is validated before anything is stored.
#[utoipa::path(
    put,
    path = "/theme/colors",
    request_body = ColorsRequest,
    responses(
        (status = 200, description = "Active colors", body = ColorsResponse),
        (status = 400, description = "Invalid element or color")
    )
)]
pub async fn set_colors_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<ColorsRequest>,
) -> ApiResult<Json<ColorsResponse>> {
    let colors: Vec<ElementColor> = req.colors.into_iter().map(ElementColor::from).collect();
    variables_for(&colors)?;
    state.themes.set_element_colors(user_id, &colors).await?;
    Ok(Json(colors_response(colors)?))
}

/// DELETE /theme/colors - Back to the default colors
#[utoipa::path(
    delete,
    path = "/theme/colors",
    responses((status = 204, description = "Colors reset"))
)]
pub async fn reset_colors_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<StatusCode> {
    theme::reset_theme(state.themes.as_ref(), user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /theme.css - The `:root` stylesheet for the active colors
#[utoipa::path(
    get,
    path = "/theme.css",
    responses((status = 200, description = "Stylesheet", content_type = "text/css", body = String))
)]
pub async fn stylesheet_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let colors = state.themes.list_element_colors(user_id).await?;
    let css = variables_for(&colors)?.stylesheet();
    Ok(([(header::CONTENT_TYPE, "text/css; charset=utf-8")], css))
}
