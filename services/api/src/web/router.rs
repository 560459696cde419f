//! services/api/src/web/router.rs
//!
//! Assembles the public and session-protected routes.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::services::ServeDir;

use crate::web::{
    assignments, auth, middleware::require_auth, pages, settings, state::AppState, theme,
};

/// Path prefix attachment objects are served under.
pub const FILES_PREFIX: &str = "/files";

pub fn build_router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/password-reset", post(auth::request_password_reset_handler))
        .route(
            "/auth/password-reset/confirm",
            post(auth::confirm_password_reset_handler),
        );

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/session", get(auth::session_handler))
        .route("/dashboard", get(assignments::dashboard_handler))
        .route("/archive", get(assignments::archive_handler))
        .route("/assignments", post(assignments::create_assignment_handler))
        .route(
            "/assignments/{id}",
            get(assignments::get_assignment_handler)
                .put(assignments::edit_assignment_handler)
                .patch(assignments::patch_assignment_handler)
                .delete(assignments::delete_assignment_handler),
        )
        .route("/assignments/{id}/status", put(assignments::set_status_handler))
        .route("/assignments/{id}/archived", put(assignments::set_archived_handler))
        .route(
            "/assignments/{id}/attachments",
            get(assignments::list_attachments_handler)
                .post(assignments::upload_attachment_handler),
        )
        .route("/attachments/{id}", delete(assignments::delete_attachment_handler))
        .route("/settings", get(settings::settings_handler))
        .route(
            "/subjects",
            get(settings::list_subjects_handler).post(settings::create_subject_handler),
        )
        .route(
            "/subjects/{id}",
            put(settings::update_subject_handler).delete(settings::delete_subject_handler),
        )
        .route(
            "/translations",
            get(settings::list_translations_handler).post(settings::create_translation_handler),
        )
        .route(
            "/translations/{id}",
            put(settings::update_translation_handler)
                .delete(settings::delete_translation_handler),
        )
        .route(
            "/profile",
            get(settings::get_profile_handler).put(settings::update_profile_handler),
        )
        .route("/relationships", get(settings::list_relationships_handler))
        .route("/relationships/students", post(settings::link_student_handler))
        .route(
            "/relationships/students/{id}",
            delete(settings::unlink_student_handler),
        )
        .route("/relationships/users", post(settings::link_user_handler))
        .route("/relationships/users/{id}", delete(settings::unlink_user_handler))
        .route("/i18n/{lang}", get(pages::i18n_handler))
        .route(
            "/context",
            get(pages::get_context_handler).put(pages::update_context_handler),
        )
        .route("/context/fun-mode", post(pages::toggle_fun_mode_handler))
        .route("/help", get(pages::help_handler))
        .route(
            "/pages",
            get(pages::list_pages_handler).post(pages::create_page_handler),
        )
        .route(
            "/pages/{slug}",
            get(pages::get_page_handler).delete(pages::delete_page_handler),
        )
        .route(
            "/themes",
            get(theme::list_themes_handler).post(theme::save_theme_handler),
        )
        .route("/themes/{id}", delete(theme::delete_theme_handler))
        .route("/themes/{id}/activate", post(theme::activate_theme_handler))
        .route(
            "/theme/colors",
            get(theme::get_colors_handler)
                .put(theme::set_colors_handler)
                .delete(theme::reset_colors_handler),
        )
        .route("/theme.css", get(theme::stylesheet_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let files = ServeDir::new(&app_state.config.storage_root);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(FILES_PREFIX, files)
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .with_state(app_state)
}
