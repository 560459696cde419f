//! Router-level tests over the in-memory backend.

use std::sync::Arc;

use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use homework_core::i18n::Language;
use homework_core::memory::InMemoryBackend;
use homework_core::query::AuthEvent;
use homework_core::AccountService;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    backend: Arc<InMemoryBackend>,
    state: Arc<AppState>,
}

fn test_app() -> TestApp {
    let backend = Arc::new(InMemoryBackend::new());
    let state = Arc::new(AppState::from_backend(
        backend.clone(),
        backend.clone(),
        Config::for_tests(),
    ));
    TestApp {
        router: build_router(state.clone()),
        backend,
        state,
    }
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
    text: String,
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8_lossy(&bytes).to_string();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        Reply {
            status,
            cookie,
            body,
            text,
        }
    }

    async fn call(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    async fn get(&self, uri: &str, cookie: &str) -> Reply {
        self.call(Method::GET, uri, Some(cookie), None).await
    }

    /// Signs a new user up and returns their session cookie.
    async fn signup(&self, email: &str) -> String {
        let reply = self
            .call(
                Method::POST,
                "/auth/signup",
                None,
                Some(json!({ "email": email, "password": "correct horse" })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
        reply.cookie.expect("signup sets a session cookie")
    }

    async fn create_assignment(&self, cookie: &str, body: Value) -> Value {
        let reply = self
            .call(Method::POST, "/assignments", Some(cookie), Some(body))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
        reply.body
    }
}

fn math_homework(title: &str) -> Value {
    json!({
        "title": title,
        "subject": "Math",
        "assignment_type": "homework",
        "due_date": (Utc::now() + Duration::days(2)).to_rfc3339(),
    })
}

fn titles(list: &Value) -> Vec<String> {
    let mut titles: Vec<String> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].as_str().unwrap().to_string())
        .collect();
    titles.sort();
    titles
}

//=========================================================================================
// Auth
//=========================================================================================

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = test_app();
    let reply = app.call(Method::GET, "/dashboard", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(reply.body["error"].is_string());

    let reply = app
        .call(Method::GET, "/dashboard", Some("session=not-a-session"), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn signup_opens_a_session_with_a_profile() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;

    let reply = app.get("/auth/session", &cookie).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["profile"]["email"], "kid@example.com");
    assert_eq!(reply.body["context"]["language"], "en");
    assert_eq!(reply.body["context"]["direction"], "ltr");
}

#[tokio::test]
async fn signup_rejects_duplicates_and_weak_passwords() {
    let app = test_app();
    app.signup("kid@example.com").await;

    let dup = app
        .call(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "kid@example.com", "password": "another password" })),
        )
        .await;
    assert_eq!(dup.status, StatusCode::CONFLICT);

    let weak = app
        .call(
            Method::POST,
            "/auth/signup",
            None,
            Some(json!({ "email": "new@example.com", "password": "short" })),
        )
        .await;
    assert_eq!(weak.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(weak.body["field"], "password");
}

#[tokio::test]
async fn login_checks_the_password_and_logout_ends_the_session() {
    let app = test_app();
    app.signup("kid@example.com").await;

    let wrong = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "kid@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let unknown = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "ghost@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);

    let ok = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "kid@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    let cookie = ok.cookie.unwrap();
    assert_eq!(app.get("/auth/session", &cookie).await.status, StatusCode::OK);

    let out = app.call(Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert_eq!(out.status, StatusCode::NO_CONTENT);
    assert_eq!(out.cookie.as_deref(), Some("session="));
    assert_eq!(app.get("/auth/session", &cookie).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn password_reset_token_works_once() {
    let app = test_app();
    app.signup("kid@example.com").await;

    let requested = app
        .call(
            Method::POST,
            "/auth/password-reset",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;
    assert_eq!(requested.status, StatusCode::ACCEPTED);

    let user = app.backend.get_user_by_email("kid@example.com").await.unwrap();
    app.backend
        .create_password_reset("token-1", user.user_id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    let confirm = json!({ "token": "token-1", "new_password": "brand new secret" });
    let first = app
        .call(Method::POST, "/auth/password-reset/confirm", None, Some(confirm.clone()))
        .await;
    assert_eq!(first.status, StatusCode::NO_CONTENT);
    let again = app
        .call(Method::POST, "/auth/password-reset/confirm", None, Some(confirm))
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);

    let login = app
        .call(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "kid@example.com", "password": "brand new secret" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn sign_out_event_clears_view_state() {
    let app = test_app();
    let listener = app.state.spawn_auth_listener();
    let user = uuid::Uuid::new_v4();
    app.state.contexts.set_language(user, Language::Hebrew);

    app.state.publish(AuthEvent::SignedOut(user));
    for _ in 0..100 {
        if app.state.contexts.get(user).language == Language::English {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(app.state.contexts.get(user).language, Language::English);
    listener.abort();
}

//=========================================================================================
// Assignments
//=========================================================================================

#[tokio::test]
async fn created_assignment_shows_on_the_dashboard_with_defaults() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;

    let created = app.create_assignment(&cookie, math_homework("Math HW")).await;
    assert_eq!(created["status"], "Not Started");
    assert_eq!(created["archived"], false);
    assert_eq!(created["subject"], "Math");
    assert_eq!(created["assignment_type"], "homework");

    let dashboard = app.get("/dashboard", &cookie).await;
    assert_eq!(dashboard.status, StatusCode::OK);
    assert_eq!(titles(&dashboard.body["assignments"]), vec!["Math HW"]);
    assert_eq!(titles(&dashboard.body["upcoming"]), vec!["Math HW"]);
    assert_eq!(titles(&dashboard.body["homework"]), vec!["Math HW"]);
    assert!(dashboard.body["tests"].as_array().unwrap().is_empty());
    assert_eq!(dashboard.body["filter"], Value::Null);
    assert_eq!(dashboard.body["stale"], false);
}

#[tokio::test]
async fn missing_title_is_a_field_error() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;

    let reply = app
        .call(
            Method::POST,
            "/assignments",
            Some(&cookie),
            Some(json!({ "title": "  ", "due_date": Utc::now().to_rfc3339() })),
        )
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(reply.body["field"], "title");
}

#[tokio::test]
async fn status_filter_and_hide_completed() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;
    let done = app.create_assignment(&cookie, math_homework("Done")).await;
    app.create_assignment(&cookie, math_homework("Open")).await;

    let uri = format!("/assignments/{}/status", done["id"].as_str().unwrap());
    let reply = app
        .call(Method::PUT, &uri, Some(&cookie), Some(json!({ "status": "Completed" })))
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["status"], "Completed");
    assert_eq!(reply.body["title"], "Done");

    let completed = app.get("/dashboard?filter=completed", &cookie).await;
    assert_eq!(titles(&completed.body["assignments"]), vec!["Done"]);
    assert_eq!(completed.body["filter"], "completed");
    assert_eq!(completed.body["status_filter"], "completed");

    let hidden = app.get("/dashboard?hide_completed=true", &cookie).await;
    assert_eq!(titles(&hidden.body["assignments"]), vec!["Open"]);

    let both = app
        .get("/dashboard?filter=completed&hide_completed=true", &cookie)
        .await;
    assert!(both.body["assignments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn archived_rows_move_to_the_archive_view() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;
    let old = app.create_assignment(&cookie, math_homework("Old")).await;
    app.create_assignment(&cookie, math_homework("Current")).await;

    let uri = format!("/assignments/{}/archived", old["id"].as_str().unwrap());
    let reply = app
        .call(Method::PUT, &uri, Some(&cookie), Some(json!({ "archived": true })))
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let dashboard = app.get("/dashboard", &cookie).await;
    assert_eq!(titles(&dashboard.body["assignments"]), vec!["Current"]);
    let archive = app.get("/archive", &cookie).await;
    assert_eq!(titles(&archive.body["assignments"]), vec!["Old"]);
}

#[tokio::test]
async fn edit_and_patch_touch_only_named_fields() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;
    let mut body = math_homework("Lab");
    body["description"] = json!("Include graphs");
    let created = app.create_assignment(&cookie, body).await;
    let uri = format!("/assignments/{}", created["id"].as_str().unwrap());

    let patched = app
        .call(Method::PATCH, &uri, Some(&cookie), Some(json!({ "title": "Lab report" })))
        .await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.body["title"], "Lab report");
    assert_eq!(patched.body["description"], "Include graphs");

    let cleared = app
        .call(Method::PATCH, &uri, Some(&cookie), Some(json!({ "description": null })))
        .await;
    assert_eq!(cleared.body["description"], Value::Null);
    assert_eq!(cleared.body["title"], "Lab report");

    let blank_subject = app
        .call(Method::PATCH, &uri, Some(&cookie), Some(json!({ "subject": "  " })))
        .await;
    assert_eq!(blank_subject.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(blank_subject.body["field"], "subject");

    let edited = app
        .call(
            Method::PUT,
            &uri,
            Some(&cookie),
            Some(json!({
                "title": "Lab report",
                "subject": "Robotics",
                "assignment_type": "test",
                "due_date": created["due_date"],
            })),
        )
        .await;
    assert_eq!(edited.status, StatusCode::OK);
    assert_eq!(edited.body["subject"], "Robotics");
    assert_eq!(edited.body["custom_subject"], true);
    assert_eq!(edited.body["assignment_type"], "test");
}

#[tokio::test]
async fn linked_parent_sees_and_updates_but_cannot_delete() {
    let app = test_app();
    let parent = app.signup("parent@example.com").await;
    let student = app.signup("student@example.com").await;
    let theirs = app.create_assignment(&student, math_homework("Reading log")).await;
    app.create_assignment(&parent, math_homework("Parent's own")).await;

    let link = app
        .call(
            Method::POST,
            "/relationships/students",
            Some(&parent),
            Some(json!({ "email": "student@example.com", "relationship_type": "mother" })),
        )
        .await;
    assert_eq!(link.status, StatusCode::CREATED, "{}", link.text);

    let all = app.get("/dashboard", &parent).await;
    assert_eq!(titles(&all.body["assignments"]), vec!["Parent's own", "Reading log"]);
    let students = app.get("/dashboard?filter=student", &parent).await;
    assert_eq!(titles(&students.body["assignments"]), vec!["Reading log"]);
    assert_eq!(students.body["view_mode"], "student");
    let own = app.get("/dashboard?filter=parent", &parent).await;
    assert_eq!(titles(&own.body["assignments"]), vec!["Parent's own"]);

    let uri = format!("/assignments/{}", theirs["id"].as_str().unwrap());
    let status_uri = format!("{}/status", uri);
    let updated = app
        .call(Method::PUT, &status_uri, Some(&parent), Some(json!({ "status": "in_progress" })))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["status"], "In Progress");

    let delete = app.call(Method::DELETE, &uri, Some(&parent), None).await;
    assert_eq!(delete.status, StatusCode::NOT_FOUND);

    // The student's own list reflects the parent's update.
    let mine = app.get("/dashboard", &student).await;
    assert_eq!(mine.body["assignments"][0]["status"], "In Progress");
}

#[tokio::test]
async fn strangers_cannot_see_each_others_rows() {
    let app = test_app();
    let alice = app.signup("alice@example.com").await;
    let bob = app.signup("bob@example.com").await;
    let hers = app.create_assignment(&alice, math_homework("Alice's")).await;

    let uri = format!("/assignments/{}", hers["id"].as_str().unwrap());
    assert_eq!(app.get(&uri, &bob).await.status, StatusCode::NOT_FOUND);
    assert!(app.get("/dashboard", &bob).await.body["assignments"]
        .as_array()
        .unwrap()
        .is_empty());

    let delete = app.call(Method::DELETE, &uri, Some(&alice), None).await;
    assert_eq!(delete.status, StatusCode::NO_CONTENT);
    assert!(app.get("/dashboard", &alice).await.body["assignments"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn attachments_upload_list_and_delete() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;
    let assignment = app.create_assignment(&cookie, math_homework("Essay")).await;
    let uri = format!("/assignments/{}/attachments", assignment["id"].as_str().unwrap());

    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"my notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\nhello\r\n--{b}--\r\n",
        b = boundary
    );
    let req = Request::builder()
        .method(Method::POST)
        .uri(&uri)
        .header(header::COOKIE, &cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let uploaded = app.send(req).await;
    assert_eq!(uploaded.status, StatusCode::CREATED, "{}", uploaded.text);
    assert_eq!(uploaded.body["file_name"], "my notes.txt");
    assert_eq!(uploaded.body["size"], 5);
    assert!(uploaded.body["url"].as_str().unwrap().ends_with("-my_notes.txt"));

    let listed = app.get(&uri, &cookie).await;
    assert_eq!(listed.body.as_array().unwrap().len(), 1);

    let delete_uri = format!("/attachments/{}", uploaded.body["id"].as_str().unwrap());
    let deleted = app.call(Method::DELETE, &delete_uri, Some(&cookie), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(app.get(&uri, &cookie).await.body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deleting_an_assignment_removes_its_files() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;
    let assignment = app.create_assignment(&cookie, math_homework("Essay")).await;
    let id = assignment["id"].as_str().unwrap();

    let boundary = "XBOUNDARYX";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"notes.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n%PDF\r\n--{b}--\r\n",
        b = boundary
    );
    let req = Request::builder()
        .method(Method::POST)
        .uri(format!("/assignments/{}/attachments", id))
        .header(header::COOKIE, &cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();
    let uploaded = app.send(req).await;
    assert_eq!(uploaded.status, StatusCode::CREATED, "{}", uploaded.text);
    let url = uploaded.body["url"].as_str().unwrap();
    let path = url.strip_prefix("memory://").unwrap().to_string();
    assert!(app.backend.has_object(&path));

    let deleted = app
        .call(Method::DELETE, &format!("/assignments/{}", id), Some(&cookie), None)
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(!app.backend.has_object(&path));
}

//=========================================================================================
// Settings, text and theming
//=========================================================================================

#[tokio::test]
async fn custom_subjects_need_both_names() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;

    let missing = app
        .call(Method::POST, "/subjects", Some(&cookie), Some(json!({ "name_en": "Robotics" })))
        .await;
    assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(missing.body["field"], "name_he");

    let created = app
        .call(
            Method::POST,
            "/subjects",
            Some(&cookie),
            Some(json!({ "name_en": "Robotics", "name_he": "רובוטיקה" })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let subjects = app.get("/subjects", &cookie).await;
    assert_eq!(subjects.body["builtin"].as_array().unwrap().len(), 5);
    assert_eq!(subjects.body["custom"][0]["name_en"], "Robotics");
}

#[tokio::test]
async fn partial_settings_edits_keep_stored_values() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;

    let created = app
        .call(
            Method::POST,
            "/subjects",
            Some(&cookie),
            Some(json!({ "name_en": "Robotics", "name_he": "רובוטיקה" })),
        )
        .await;
    let id = created.body["id"].as_str().unwrap().to_string();

    let renamed = app
        .call(
            Method::PUT,
            &format!("/subjects/{id}"),
            Some(&cookie),
            Some(json!({ "name_en": "Coding" })),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.body["name_en"], "Coding");
    assert_eq!(renamed.body["name_he"], "רובוטיקה");

    let blanked = app
        .call(
            Method::PUT,
            &format!("/subjects/{id}"),
            Some(&cookie),
            Some(json!({ "name_he": " " })),
        )
        .await;
    assert_eq!(blanked.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(blanked.body["field"], "name_he");

    let unknown = app
        .call(
            Method::PUT,
            &format!("/subjects/{}", uuid::Uuid::new_v4()),
            Some(&cookie),
            Some(json!({ "name_en": "Coding" })),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    app.call(
        Method::PUT,
        "/profile",
        Some(&cookie),
        Some(json!({ "display_name": "Noa", "role": "student" })),
    )
    .await;
    let profile = app
        .call(Method::PUT, "/profile", Some(&cookie), Some(json!({ "display_name": "Noa B" })))
        .await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["display_name"], "Noa B");
    assert_eq!(profile.body["role"], "student");
}

#[tokio::test]
async fn translation_overrides_resolve_by_page() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;

    for body in [
        json!({ "key": "dashboard", "text_en": "Desk", "text_he": "שולחן" }),
        json!({ "key": "dashboard", "text_en": "Chem desk", "text_he": "שולחן כימיה", "page": "chem-101" }),
    ] {
        let reply = app
            .call(Method::POST, "/translations", Some(&cookie), Some(body))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }

    let en = app.get("/i18n/en", &cookie).await;
    assert_eq!(en.body["texts"]["dashboard"], "Desk");
    assert_eq!(en.body["texts"]["archive"], "Archive");

    let scoped = app.get("/i18n/he?page=chem-101", &cookie).await;
    assert_eq!(scoped.body["texts"]["dashboard"], "שולחן כימיה");
    assert_eq!(scoped.body["direction"], "rtl");

    assert_eq!(app.get("/i18n/fr", &cookie).await.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn context_switches_language_for_help() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;

    let updated = app
        .call(Method::PUT, "/context", Some(&cookie), Some(json!({ "language": "he" })))
        .await;
    assert_eq!(updated.body["direction"], "rtl");
    let toggled = app
        .call(Method::POST, "/context/fun-mode", Some(&cookie), None)
        .await;
    assert_eq!(toggled.body["fun_mode"], true);
    assert_eq!(toggled.body["language"], "he");

    let help = app.get("/help", &cookie).await;
    assert_eq!(help.body["title"], "עזרה");
    assert_eq!(help.body["topics"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn custom_pages_by_slug() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;

    let bad = app
        .call(Method::POST, "/pages", Some(&cookie), Some(json!({ "slug": "Chem 101", "title": "Chemistry" })))
        .await;
    assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);

    let page = json!({ "slug": "chem-101", "title": "Chemistry" });
    let created = app
        .call(Method::POST, "/pages", Some(&cookie), Some(page.clone()))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let dup = app.call(Method::POST, "/pages", Some(&cookie), Some(page)).await;
    assert_eq!(dup.status, StatusCode::CONFLICT);

    let view = app.get("/pages/chem-101", &cookie).await;
    assert_eq!(view.status, StatusCode::OK);
    assert_eq!(view.body["page"]["title"], "Chemistry");
    assert_eq!(view.body["text"]["texts"]["appTitle"], "Homework Tracker");

    let deleted = app
        .call(Method::DELETE, "/pages/chem-101", Some(&cookie), None)
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/pages/chem-101", &cookie).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn theme_colors_render_into_the_stylesheet() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;

    let invalid = app
        .call(
            Method::PUT,
            "/theme/colors",
            Some(&cookie),
            Some(json!({ "colors": [{ "element": "primary", "color": "red" }] })),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let set = app
        .call(
            Method::PUT,
            "/theme/colors",
            Some(&cookie),
            Some(json!({ "colors": [{ "element": "primary", "color": "#ff0000" }] })),
        )
        .await;
    assert_eq!(set.status, StatusCode::OK);
    assert_eq!(set.body["variables"]["--primary"], "0 100% 50%");

    let css = app.get("/theme.css", &cookie).await;
    assert!(css.text.starts_with(":root {"));
    assert!(css.text.contains("--primary: 0 100% 50%;"));

    let saved = app
        .call(Method::POST, "/themes", Some(&cookie), Some(json!({ "name": "Red" })))
        .await;
    assert_eq!(saved.status, StatusCode::CREATED);
    assert_eq!(saved.body["colors"][0]["color"], "#ff0000");

    let reset = app.call(Method::DELETE, "/theme/colors", Some(&cookie), None).await;
    assert_eq!(reset.status, StatusCode::NO_CONTENT);
    let colors = app.get("/theme/colors", &cookie).await;
    assert!(colors.body["colors"].as_array().unwrap().is_empty());
    assert_eq!(colors.body["variables"]["--primary"], "217.2 91.2% 59.8%");

    let themes = app.get("/themes", &cookie).await;
    let list = themes.body.as_array().unwrap();
    assert!(list.iter().any(|t| t["name"] == "Red" && t["is_preset"] == false));
    let preset_id = list
        .iter()
        .find(|t| t["is_preset"] == true)
        .and_then(|t| t["id"].as_str())
        .unwrap()
        .to_string();

    let activated = app
        .call(Method::POST, &format!("/themes/{}/activate", preset_id), Some(&cookie), None)
        .await;
    assert_eq!(activated.status, StatusCode::OK);
    assert!(!activated.body["colors"].as_array().unwrap().is_empty());

    let delete_preset = app
        .call(Method::DELETE, &format!("/themes/{}", preset_id), Some(&cookie), None)
        .await;
    assert_eq!(delete_preset.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn settings_overview_gathers_everything() {
    let app = test_app();
    let cookie = app.signup("kid@example.com").await;
    let profile = app
        .call(
            Method::PUT,
            "/profile",
            Some(&cookie),
            Some(json!({ "display_name": "Noa", "role": "student" })),
        )
        .await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.body["role"], "student");

    let settings = app.get("/settings", &cookie).await;
    assert_eq!(settings.status, StatusCode::OK);
    assert_eq!(settings.body["profile"]["display_name"], "Noa");
    assert_eq!(settings.body["subjects"]["builtin"][0], "Math");
    assert!(settings.body["themes"].as_array().unwrap().len() >= 4);
    assert!(settings.body["relationships"]["parent_links"]
        .as_array()
        .unwrap()
        .is_empty());
}
