//! services/api/src/web/pages.rs
//!
//! Localized text, the per-user UI context, the help view and custom pages.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use homework_core::forms::CustomPageDraft;
use homework_core::i18n::{Language, TextKey, Translator};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::rest::{ContextDto, PageDto};
use crate::web::state::AppState;

/// Page scope used for overrides shown on the help view.
pub const HELP_PAGE: &str = "help";

const HELP_TOPICS: [TextKey; 6] = [
    TextKey::Dashboard,
    TextKey::Archive,
    TextKey::Settings,
    TextKey::Relationships,
    TextKey::ColorTheme,
    TextKey::FunMode,
];

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams)]
pub struct PageScope {
    /// Page whose scoped overrides apply.
    pub page: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct TextTable {
    pub language: String,
    pub direction: String,
    pub texts: BTreeMap<String, String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ContextRequest {
    /// `en` or `he`.
    pub language: Option<String>,
    pub fun_mode: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct HelpResponse {
    pub language: String,
    pub direction: String,
    pub title: String,
    pub intro: String,
    pub topics: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct PageRequest {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Serialize, ToSchema)]
pub struct PageView {
    pub page: PageDto,
    pub text: TextTable,
}

async fn text_table(
    state: &AppState,
    user_id: Uuid,
    language: Language,
    page: Option<&str>,
) -> ApiResult<TextTable> {
    let overrides = state.translations.list(user_id).await?;
    let texts = Translator::new(&overrides).for_page(page).table(language);
    Ok(TextTable {
        language: language.code().to_string(),
        direction: language.direction().to_string(),
        texts,
    })
}

//=========================================================================================
// Localization and context
//=========================================================================================

/// GET /i18n/{lang} - The resolved text table for one language
#[utoipa::path(
    get,
    path = "/i18n/{lang}",
    params(("lang" = String, Path, description = "`en` or `he`"), PageScope),
    responses(
        (status = 200, description = "Resolved text", body = TextTable),
        (status = 400, description = "Unknown language")
    )
)]
pub async fn i18n_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(lang): Path<String>,
    Query(scope): Query<PageScope>,
) -> ApiResult<Json<TextTable>> {
    let language: Language = lang.parse()?;
    let table = text_table(&state, user_id, language, scope.page.as_deref()).await?;
    Ok(Json(table))
}

/// GET /context - Active language and fun mode
#[utoipa::path(
    get,
    path = "/context",
    responses((status = 200, description = "UI context", body = ContextDto))
)]
pub async fn get_context_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Json<ContextDto> {
    Json(state.contexts.get(user_id).into())
}

/// PUT /context - Change language and/or fun mode
#[utoipa::path(
    put,
    path = "/context",
    request_body = ContextRequest,
    responses(
        (status = 200, description = "UI context", body = ContextDto),
        (status = 400, description = "Unknown language")
    )
)]
pub async fn update_context_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<ContextRequest>,
) -> ApiResult<Json<ContextDto>> {
    let language = req.language.map(|l| l.parse::<Language>()).transpose()?;
    let ctx = state.contexts.update(user_id, |ctx| {
        if let Some(language) = language {
            ctx.language = language;
        }
        if let Some(fun_mode) = req.fun_mode {
            ctx.fun_mode = fun_mode;
        }
    });
    Ok(Json(ctx.into()))
}

/// POST /context/fun-mode - Flip fun mode
#[utoipa::path(
    post,
    path = "/context/fun-mode",
    responses((status = 200, description = "UI context", body = ContextDto))
)]
pub async fn toggle_fun_mode_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Json<ContextDto> {
    Json(state.contexts.toggle_fun_mode(user_id).into())
}

/// GET /help - The help view in the caller's language
#[utoipa::path(
    get,
    path = "/help",
    responses((status = 200, description = "Help view", body = HelpResponse))
)]
pub async fn help_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<HelpResponse>> {
    let language = state.contexts.get(user_id).language;
    let overrides = state.translations.list(user_id).await?;
    let tr = Translator::new(&overrides).for_page(Some(HELP_PAGE));
    Ok(Json(HelpResponse {
        language: language.code().to_string(),
        direction: language.direction().to_string(),
        title: tr.text(TextKey::Help, language).to_string(),
        intro: tr.text(TextKey::HelpIntro, language).to_string(),
        topics: HELP_TOPICS
            .iter()
            .map(|k| tr.text(*k, language).to_string())
            .collect(),
    }))
}

//=========================================================================================
// Custom pages
//=========================================================================================

/// GET /pages - The caller's custom pages
#[utoipa::path(
    get,
    path = "/pages",
    responses((status = 200, description = "Pages", body = [PageDto]))
)]
pub async fn list_pages_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> ApiResult<Json<Vec<PageDto>>> {
    let pages = state.pages.list(user_id).await?;
    Ok(Json(pages.into_iter().map(PageDto::from).collect()))
}

/// POST /pages - Create a custom page
#[utoipa::path(
    post,
    path = "/pages",
    request_body = PageRequest,
    responses(
        (status = 201, description = "Page created", body = PageDto),
        (status = 409, description = "Slug already used"),
        (status = 422, description = "Invalid slug or missing title")
    )
)]
pub async fn create_page_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<PageRequest>,
) -> ApiResult<impl IntoResponse> {
    let fields = CustomPageDraft {
        slug: req.slug,
        title: req.title,
    }
    .validate()?;
    let page = state.pages.create(user_id, &fields).await?;
    info!(%user_id, slug = %page.slug, "Custom page created");
    Ok((StatusCode::CREATED, Json(PageDto::from(page))))
}

/// GET /pages/{slug} - A custom page with its page-scoped text
#[utoipa::path(
    get,
    path = "/pages/{slug}",
    params(("slug" = String, Path, description = "Page slug")),
    responses(
        (status = 200, description = "Page view", body = PageView),
        (status = 404, description = "No such page")
    )
)]
pub async fn get_page_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(slug): Path<String>,
) -> ApiResult<Json<PageView>> {
    let page = state.pages.get_by_slug(user_id, &slug).await?;
    let language = state.contexts.get(user_id).language;
    let text = text_table(&state, user_id, language, Some(&page.slug)).await?;
    Ok(Json(PageView {
        page: page.into(),
        text,
    }))
}

/// DELETE /pages/{slug} - Remove a custom page
#[utoipa::path(
    delete,
    path = "/pages/{slug}",
    params(("slug" = String, Path, description = "Page slug")),
    responses(
        (status = 204, description = "Page deleted"),
        (status = 404, description = "No such page")
    )
)]
pub async fn delete_page_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    let page = state.pages.get_by_slug(user_id, &slug).await?;
    state.pages.delete(user_id, page.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
