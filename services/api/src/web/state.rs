//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use homework_core::context::ContextStore;
use homework_core::ports::{
    AccountService, AssignmentRepository, AttachmentRepository, CustomPageRepository,
    ObjectStorage, ProfileRepository, RelationshipRepository, SubjectRepository, ThemeRepository,
    TranslationRepository,
};
use homework_core::query::{AssignmentQuery, AuthEvent};
use homework_core::service::{AssignmentService, AttachmentService};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountService>,
    pub subjects: Arc<dyn SubjectRepository>,
    pub translations: Arc<dyn TranslationRepository>,
    pub relationships: Arc<dyn RelationshipRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub themes: Arc<dyn ThemeRepository>,
    pub pages: Arc<dyn CustomPageRepository>,
    pub query: Arc<AssignmentQuery>,
    pub assignments: Arc<AssignmentService>,
    pub attachments: Arc<AttachmentService>,
    pub contexts: Arc<ContextStore>,
    pub auth_events: broadcast::Sender<AuthEvent>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires every port onto one backend that implements them all, plus an
    /// object store.
    pub fn from_backend<B>(backend: Arc<B>, storage: Arc<dyn ObjectStorage>, config: Config) -> Self
    where
        B: AccountService
            + AssignmentRepository
            + AttachmentRepository
            + CustomPageRepository
            + ProfileRepository
            + RelationshipRepository
            + SubjectRepository
            + ThemeRepository
            + TranslationRepository
            + 'static,
    {
        let query = Arc::new(AssignmentQuery::new(backend.clone(), backend.clone()));
        let assignments = Arc::new(AssignmentService::new(
            backend.clone(),
            backend.clone(),
            storage.clone(),
            query.clone(),
        ));
        let attachments = Arc::new(AttachmentService::new(
            backend.clone(),
            storage,
            query.clone(),
        ));
        let (auth_events, _) = broadcast::channel(64);
        Self {
            accounts: backend.clone(),
            subjects: backend.clone(),
            translations: backend.clone(),
            relationships: backend.clone(),
            profiles: backend.clone(),
            themes: backend.clone(),
            pages: backend,
            query,
            assignments,
            attachments,
            contexts: Arc::new(ContextStore::new()),
            auth_events,
            config: Arc::new(config),
        }
    }

    /// Announces a sign-in or sign-out to every subscriber.
    pub fn publish(&self, event: AuthEvent) {
        // No receivers is fine: nothing is listening yet.
        if self.auth_events.send(event).is_err() {
            debug!(?event, "Auth event published with no subscribers");
        }
    }

    /// Spawns the task that keeps per-user view state in step with auth changes.
    pub fn spawn_auth_listener(&self) -> tokio::task::JoinHandle<()> {
        let mut rx = self.auth_events.subscribe();
        let query = self.query.clone();
        let contexts = self.contexts.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => apply_auth_event(&query, &contexts, event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Auth listener lagged; invalidating every cached list");
                        query.invalidate_all();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Sign-in makes the cached list stale; sign-out drops the list and the UI context.
pub fn apply_auth_event(query: &AssignmentQuery, contexts: &ContextStore, event: AuthEvent) {
    debug!(?event, "Applying auth event");
    query.on_auth_event(event);
    if let AuthEvent::SignedOut(user_id) = event {
        contexts.clear(user_id);
    }
}
