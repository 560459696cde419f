//! End-to-end behaviour of the assignment data flow: mutation, invalidation,
//! re-fetch and the dashboard filters, over the in-memory backend.

use std::sync::Arc;

use chrono::{Duration, Utc};
use homework_core::filter::{filter_assignments, partition, FilterConfig, ViewMode};
use homework_core::forms::AssignmentDraft;
use homework_core::memory::InMemoryBackend;
use homework_core::query::AssignmentQuery;
use homework_core::service::AssignmentService;
use homework_core::{
    AssignmentStatus, AssignmentType, BuiltinSubject, PortError, RelationshipRepository, Subject,
};
use uuid::Uuid;

struct World {
    backend: Arc<InMemoryBackend>,
    query: Arc<AssignmentQuery>,
    service: AssignmentService,
}

fn world() -> World {
    let backend = Arc::new(InMemoryBackend::new());
    let query = Arc::new(AssignmentQuery::new(backend.clone(), backend.clone()));
    let service = AssignmentService::new(
        backend.clone(),
        backend.clone(),
        backend.clone(),
        query.clone(),
    );
    World {
        backend,
        query,
        service,
    }
}

fn math_homework(title: &str, due: chrono::DateTime<Utc>) -> AssignmentDraft {
    AssignmentDraft {
        title: title.to_string(),
        subject: "Math".to_string(),
        assignment_type: AssignmentType::Homework,
        due_date: Some(due),
        ..AssignmentDraft::default()
    }
}

#[tokio::test]
async fn created_assignment_appears_once_with_defaults() {
    let w = world();
    let user = Uuid::new_v4();
    let due = Utc::now() + Duration::days(2);
    let before = w.query.fetch(user).await.data.unwrap().len();

    w.service.create(user, &math_homework("Math HW", due)).await.unwrap();

    let list = w.query.fetch(user).await.data.unwrap();
    assert_eq!(list.len(), before + 1);
    let matching: Vec<_> = list.iter().filter(|a| a.title == "Math HW").collect();
    assert_eq!(matching.len(), 1);
    let created = matching[0];
    assert_eq!(created.status, AssignmentStatus::NotStarted);
    assert_eq!(created.status.as_str(), "Not Started");
    assert!(!created.archived);
    assert_eq!(created.due_date, due);
    assert_eq!(created.subject, Subject::Builtin(BuiltinSubject::Math));
    assert_eq!(created.assignment_type, AssignmentType::Homework);
}

#[tokio::test]
async fn completing_an_assignment_changes_only_its_status() {
    let w = world();
    let user = Uuid::new_v4();
    let mut draft = math_homework("Fractions", Utc::now());
    draft.description = "Pages 10-12".to_string();
    let created = w.service.create(user, &draft).await.unwrap();

    w.service
        .set_status(user, created.id, AssignmentStatus::Completed)
        .await
        .unwrap();

    let list = w.query.fetch(user).await.data.unwrap();
    let updated = list.iter().find(|a| a.id == created.id).unwrap();
    assert_eq!(updated.status, AssignmentStatus::Completed);
    assert_eq!(updated.title, created.title);
    assert_eq!(updated.description, created.description);
    assert_eq!(updated.subject, created.subject);
    assert_eq!(updated.due_date, created.due_date);
}

#[tokio::test]
async fn deleting_leaves_other_owners_untouched() {
    let w = world();
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let mine = w.service.create(alice, &math_homework("Mine", Utc::now())).await.unwrap();
    w.service.create(bob, &math_homework("Bob's", Utc::now())).await.unwrap();

    w.service.delete(alice, mine.id).await.unwrap();

    assert!(w.query.fetch(alice).await.data.unwrap().is_empty());
    let bobs = w.query.fetch(bob).await.data.unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].title, "Bob's");
}

#[tokio::test]
async fn only_the_owner_may_delete() {
    let w = world();
    let (parent, student) = (Uuid::new_v4(), Uuid::new_v4());
    w.backend.create_parent_link(parent, student, Some("mother")).await.unwrap();
    let theirs = w
        .service
        .create(student, &math_homework("Reading log", Utc::now()))
        .await
        .unwrap();

    // A linked parent may update ...
    w.service
        .set_status(parent, theirs.id, AssignmentStatus::InProgress)
        .await
        .unwrap();
    // ... but not delete.
    let err = w.service.delete(parent, theirs.id).await.unwrap_err();
    assert!(matches!(
        err,
        homework_core::service::ServiceError::Port(PortError::NotFound(_))
    ));
}

#[tokio::test]
async fn view_modes_separate_parent_and_student_rows() {
    let w = world();
    let (parent, student) = (Uuid::new_v4(), Uuid::new_v4());
    w.backend.create_parent_link(parent, student, None).await.unwrap();
    w.service.create(parent, &math_homework("Parent's", Utc::now())).await.unwrap();
    w.service.create(student, &math_homework("Student's", Utc::now())).await.unwrap();

    let list = w.query.fetch(parent).await.data.unwrap();
    assert_eq!(list.len(), 2);

    let students = FilterConfig {
        view_mode: ViewMode::Student,
        ..FilterConfig::default()
    };
    let parents = FilterConfig {
        view_mode: ViewMode::Parent,
        ..FilterConfig::default()
    };
    let student_rows = filter_assignments(&list, &students, parent);
    let parent_rows = filter_assignments(&list, &parents, parent);

    assert_eq!(student_rows.len(), 1);
    assert_eq!(student_rows[0].user_id, student);
    assert_eq!(parent_rows.len(), 1);
    assert_eq!(parent_rows[0].user_id, parent);
}

#[tokio::test]
async fn dashboard_buckets_over_fetched_list() {
    let w = world();
    let user = Uuid::new_v4();
    let now = Utc::now();
    w.service.create(user, &math_homework("Due later", now + Duration::hours(3))).await.unwrap();
    w.service.create(user, &math_homework("Overdue", now - Duration::hours(3))).await.unwrap();
    let mut quiz = math_homework("Quiz", now + Duration::days(1));
    quiz.assignment_type = AssignmentType::Test;
    w.service.create(user, &quiz).await.unwrap();

    let list = w.query.fetch(user).await.data.unwrap();
    let buckets = partition(&list, now);

    let titles = |v: &[homework_core::Assignment]| {
        let mut t: Vec<_> = v.iter().map(|a| a.title.clone()).collect();
        t.sort();
        t
    };
    assert_eq!(titles(&buckets.upcoming), vec!["Due later", "Quiz"]);
    assert_eq!(titles(&buckets.homework), vec!["Due later", "Overdue"]);
    assert_eq!(titles(&buckets.tests), vec!["Quiz"]);
}
