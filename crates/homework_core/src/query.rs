//! crates/homework_core/src/query.rs
//!
//! Fetch-and-cache of the assignment list visible to a user: their own rows plus
//! the rows of every student linked to them as parent.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{QueryCache, QueryState};
use crate::domain::{Assignment, AssignmentFilter};
use crate::ports::{AssignmentRepository, PortResult, RelationshipRepository};

/// Name of the cache key holding assignment lists.
pub const ASSIGNMENTS_KEY: &str = "assignments";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub name: &'static str,
    pub user_id: Uuid,
}

impl CacheKey {
    pub fn assignments(user_id: Uuid) -> Self {
        Self {
            name: ASSIGNMENTS_KEY,
            user_id,
        }
    }
}

/// Changes in authentication state that make cached lists meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(Uuid),
    SignedOut(Uuid),
}

pub type AssignmentCache = QueryCache<CacheKey, Vec<Assignment>>;

pub struct AssignmentQuery {
    assignments: Arc<dyn AssignmentRepository>,
    relationships: Arc<dyn RelationshipRepository>,
    cache: AssignmentCache,
}

impl AssignmentQuery {
    pub fn new(
        assignments: Arc<dyn AssignmentRepository>,
        relationships: Arc<dyn RelationshipRepository>,
    ) -> Self {
        Self {
            assignments,
            relationships,
            cache: QueryCache::new(),
        }
    }

    /// `{user_id} ∪ {students linked to user_id as parent}`.
    pub async fn scope(&self, user_id: Uuid) -> PortResult<Vec<Uuid>> {
        let mut ids = vec![user_id];
        for link in self.relationships.list_students(user_id).await? {
            if !ids.contains(&link.student_id) {
                ids.push(link.student_id);
            }
        }
        Ok(ids)
    }

    /// Returns the cached list when fresh, otherwise re-fetches.
    ///
    /// A failed fetch does not discard data already held; the returned state
    /// carries both the stale list and the error.
    pub async fn fetch(&self, user_id: Uuid) -> QueryState<Vec<Assignment>> {
        let key = CacheKey::assignments(user_id);
        let state = self.cache.state(&key);
        if state.fresh {
            return state;
        }

        let ticket = self.cache.begin_fetch(&key);
        match self.load(user_id).await {
            Ok(list) => {
                debug!(%user_id, count = list.len(), "Fetched assignments");
                if !self.cache.complete(ticket, list) {
                    debug!(%user_id, "Discarded assignment fetch superseded by a mutation");
                }
            }
            Err(e) => {
                warn!(%user_id, error = %e, "Failed to fetch assignments");
                self.cache.fail(ticket, e);
            }
        }
        self.cache.state(&key)
    }

    /// Invalidates and fetches again.
    pub async fn refresh(&self, user_id: Uuid) -> QueryState<Vec<Assignment>> {
        self.invalidate(user_id);
        self.fetch(user_id).await
    }

    pub fn state(&self, user_id: Uuid) -> QueryState<Vec<Assignment>> {
        self.cache.state(&CacheKey::assignments(user_id))
    }

    pub fn invalidate(&self, user_id: Uuid) {
        self.cache.invalidate(&CacheKey::assignments(user_id));
    }

    /// Called after every assignment mutation. A row may be visible to its owner
    /// and to any number of parents, so every user's list goes stale.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_where(|key| key.name == ASSIGNMENTS_KEY);
    }

    pub fn on_auth_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(user_id) => self.invalidate(user_id),
            AuthEvent::SignedOut(user_id) => self.cache.remove(&CacheKey::assignments(user_id)),
        }
    }

    async fn load(&self, user_id: Uuid) -> PortResult<Vec<Assignment>> {
        let filter = AssignmentFilter {
            owner_ids: self.scope(user_id).await?,
            archived: None,
        };
        let mut list = self.assignments.list(user_id, &filter).await?;
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssignmentType, BuiltinSubject, NewAssignment, Subject};
    use crate::memory::InMemoryBackend;
    use crate::ports::PortError;
    use chrono::Utc;

    fn new_assignment(title: &str) -> NewAssignment {
        NewAssignment {
            title: title.to_string(),
            description: None,
            subject: Subject::Builtin(BuiltinSubject::Math),
            assignment_type: AssignmentType::Homework,
            due_date: Utc::now(),
        }
    }

    fn query(backend: &Arc<InMemoryBackend>) -> AssignmentQuery {
        AssignmentQuery::new(backend.clone(), backend.clone())
    }

    #[tokio::test]
    async fn scope_includes_linked_students() {
        let backend = Arc::new(InMemoryBackend::new());
        let (parent, student, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        backend.create_parent_link(parent, student, None).await.unwrap();

        let query = query(&backend);
        assert_eq!(query.scope(parent).await.unwrap(), vec![parent, student]);
        assert_eq!(query.scope(stranger).await.unwrap(), vec![stranger]);
    }

    #[tokio::test]
    async fn parent_sees_own_and_student_rows_newest_first() {
        let backend = Arc::new(InMemoryBackend::new());
        let (parent, student, stranger) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        backend.create_parent_link(parent, student, None).await.unwrap();

        AssignmentRepository::create(&*backend, parent, &new_assignment("mine")).await.unwrap();
        AssignmentRepository::create(&*backend, student, &new_assignment("theirs")).await.unwrap();
        AssignmentRepository::create(&*backend, stranger, &new_assignment("hidden")).await.unwrap();

        let state = query(&backend).fetch(parent).await;
        let titles: Vec<_> = state
            .data
            .unwrap()
            .iter()
            .map(|a| a.title.clone())
            .collect();
        assert_eq!(titles, vec!["theirs".to_string(), "mine".to_string()]);
    }

    #[tokio::test]
    async fn cached_list_is_served_until_invalidated() {
        let backend = Arc::new(InMemoryBackend::new());
        let user = Uuid::new_v4();
        let query = query(&backend);

        assert_eq!(query.fetch(user).await.data.unwrap().len(), 0);
        AssignmentRepository::create(&*backend, user, &new_assignment("late")).await.unwrap();
        assert_eq!(query.fetch(user).await.data.unwrap().len(), 0);

        query.invalidate_all();
        assert_eq!(query.fetch(user).await.data.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_refetch_keeps_stale_data() {
        let backend = Arc::new(InMemoryBackend::new());
        let user = Uuid::new_v4();
        AssignmentRepository::create(&*backend, user, &new_assignment("kept")).await.unwrap();
        let query = query(&backend);
        query.fetch(user).await;

        backend.set_offline(true);
        let state = query.refresh(user).await;

        assert_eq!(state.data.unwrap().len(), 1);
        assert!(matches!(state.error, Some(PortError::Remote(_))));
        assert!(!state.fresh);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn sign_out_drops_cached_list() {
        let backend = Arc::new(InMemoryBackend::new());
        let user = Uuid::new_v4();
        let query = query(&backend);
        query.fetch(user).await;

        query.on_auth_event(AuthEvent::SignedOut(user));
        assert!(query.state(user).data.is_none());
    }
}
