//! crates/homework_core/src/filter.rs
//!
//! Pure functions computing the dashboard views from a cached assignment list.
//!
//! The filter predicate is the AND of three independent checks (hide-completed,
//! status, view mode), so the order they run in never changes the output.
//! The buckets produced by [`partition`] are independent views over the same
//! filtered list; one assignment may sit in several of them.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{Assignment, AssignmentStatus, AssignmentType, Subject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(AssignmentStatus),
}

impl StatusFilter {
    pub fn matches(self, status: AssignmentStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted == status,
        }
    }
}

/// Whose assignments the viewer wants to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    All,
    /// Rows owned by linked students, i.e. not by the viewer.
    Student,
    /// Rows owned by the viewer.
    Parent,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::All => "all",
            ViewMode::Student => "student",
            ViewMode::Parent => "parent",
        }
    }

    pub fn matches(self, owner: Uuid, viewer: Uuid) -> bool {
        match self {
            ViewMode::All => true,
            ViewMode::Student => owner != viewer,
            ViewMode::Parent => owner == viewer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterConfig {
    pub status: StatusFilter,
    pub hide_completed: bool,
    pub view_mode: ViewMode,
}

impl FilterConfig {
    /// Seeds a config from the dashboard's `filter` query parameter.
    ///
    /// Status tokens set the status filter, `student` and `parent` set the view
    /// mode, `all`, an absent value or an unknown token leave both at `All`.
    pub fn from_query(filter: Option<&str>, hide_completed: bool) -> Self {
        let mut config = FilterConfig {
            hide_completed,
            ..FilterConfig::default()
        };
        let Some(raw) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
            return config;
        };
        match raw.to_ascii_lowercase().as_str() {
            "all" => {}
            "student" => config.view_mode = ViewMode::Student,
            "parent" => config.view_mode = ViewMode::Parent,
            other => match other.parse::<AssignmentStatus>() {
                Ok(status) => config.status = StatusFilter::Only(status),
                Err(_) => tracing::debug!(filter = raw, "Ignoring unknown dashboard filter"),
            },
        }
        config
    }

    /// The value to write back into the `filter` query parameter, or `None`
    /// when the parameter should be removed.
    pub fn query_value(&self) -> Option<&'static str> {
        match (self.status, self.view_mode) {
            (StatusFilter::Only(status), _) => Some(status.query_token()),
            (StatusFilter::All, ViewMode::All) => None,
            (StatusFilter::All, mode) => Some(mode.as_str()),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == FilterConfig::default()
    }

    pub fn matches(&self, assignment: &Assignment, viewer: Uuid) -> bool {
        if self.hide_completed && assignment.is_completed() {
            return false;
        }
        self.status.matches(assignment.status) && self.view_mode.matches(assignment.user_id, viewer)
    }
}

/// Applies `config` to `assignments`, preserving order.
pub fn filter_assignments(
    assignments: &[Assignment],
    config: &FilterConfig,
    viewer: Uuid,
) -> Vec<Assignment> {
    assignments
        .iter()
        .filter(|a| config.matches(a, viewer))
        .cloned()
        .collect()
}

/// Rows not archived, as shown on the dashboard.
pub fn active(assignments: &[Assignment]) -> Vec<Assignment> {
    assignments.iter().filter(|a| !a.archived).cloned().collect()
}

/// Rows archived, as shown on the archive page.
pub fn archived(assignments: &[Assignment]) -> Vec<Assignment> {
    assignments.iter().filter(|a| a.archived).cloned().collect()
}

pub fn with_subject(assignments: &[Assignment], subject: &Subject) -> Vec<Assignment> {
    assignments
        .iter()
        .filter(|a| &a.subject == subject)
        .cloned()
        .collect()
}

/// Independent views over one filtered list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buckets {
    pub upcoming: Vec<Assignment>,
    pub homework: Vec<Assignment>,
    pub tests: Vec<Assignment>,
}

/// Buckets `assignments`. A due date equal to `now` counts as upcoming.
pub fn partition(assignments: &[Assignment], now: DateTime<Utc>) -> Buckets {
    let mut buckets = Buckets::default();
    for assignment in assignments {
        if assignment.due_date >= now {
            buckets.upcoming.push(assignment.clone());
        }
        match assignment.assignment_type {
            AssignmentType::Homework => buckets.homework.push(assignment.clone()),
            AssignmentType::Test => buckets.tests.push(assignment.clone()),
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BuiltinSubject;
    use chrono::Duration;

    fn assignment(
        owner: Uuid,
        status: AssignmentStatus,
        kind: AssignmentType,
        due: DateTime<Utc>,
    ) -> Assignment {
        Assignment {
            id: Uuid::new_v4(),
            user_id: owner,
            title: format!("{} {}", kind, status),
            description: None,
            subject: Subject::Builtin(BuiltinSubject::Math),
            assignment_type: kind,
            due_date: due,
            status,
            archived: false,
            created_at: due,
            updated_at: due,
        }
    }

    fn sample(parent: Uuid, student: Uuid, now: DateTime<Utc>) -> Vec<Assignment> {
        let mut list = Vec::new();
        for owner in [parent, student] {
            for status in AssignmentStatus::ALL {
                for kind in [AssignmentType::Homework, AssignmentType::Test] {
                    list.push(assignment(owner, status, kind, now + Duration::days(1)));
                    list.push(assignment(owner, status, kind, now - Duration::days(1)));
                }
            }
        }
        list
    }

    fn all_configs() -> Vec<FilterConfig> {
        let statuses = [
            StatusFilter::All,
            StatusFilter::Only(AssignmentStatus::NotStarted),
            StatusFilter::Only(AssignmentStatus::InProgress),
            StatusFilter::Only(AssignmentStatus::Completed),
        ];
        let modes = [ViewMode::All, ViewMode::Student, ViewMode::Parent];
        let mut configs = Vec::new();
        for status in statuses {
            for view_mode in modes {
                for hide_completed in [false, true] {
                    configs.push(FilterConfig {
                        status,
                        hide_completed,
                        view_mode,
                    });
                }
            }
        }
        configs
    }

    #[test]
    fn identity_config_returns_list_unchanged() {
        let (parent, student, now) = (Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        let list = sample(parent, student, now);
        let config = FilterConfig::default();
        assert!(config.is_identity());
        assert_eq!(filter_assignments(&list, &config, parent), list);
    }

    #[test]
    fn filtering_is_idempotent() {
        let (parent, student, now) = (Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        let list = sample(parent, student, now);
        for config in all_configs() {
            let once = filter_assignments(&list, &config, parent);
            let twice = filter_assignments(&once, &config, parent);
            assert_eq!(once, twice, "config {:?}", config);
        }
    }

    #[test]
    fn hide_completed_always_drops_completed_rows() {
        let (parent, student, now) = (Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        let list = sample(parent, student, now);
        for config in all_configs().into_iter().filter(|c| c.hide_completed) {
            let out = filter_assignments(&list, &config, parent);
            assert!(out.iter().all(|a| !a.is_completed()), "config {:?}", config);
        }
    }

    #[test]
    fn view_modes_split_rows_by_owner() {
        let (parent, student, now) = (Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        let list = sample(parent, student, now);

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

        assert!(!student_rows.is_empty());
        assert!(student_rows.iter().all(|a| a.user_id == student));
        assert!(!parent_rows.is_empty());
        assert!(parent_rows.iter().all(|a| a.user_id == parent));
        assert_eq!(student_rows.len() + parent_rows.len(), list.len());
    }

    #[test]
    fn status_filter_is_exact_match() {
        let (parent, student, now) = (Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        let list = sample(parent, student, now);
        let config = FilterConfig {
            status: StatusFilter::Only(AssignmentStatus::InProgress),
            ..FilterConfig::default()
        };
        let out = filter_assignments(&list, &config, parent);
        assert_eq!(out.len(), list.len() / 3);
        assert!(out.iter().all(|a| a.status == AssignmentStatus::InProgress));
    }

    #[test]
    fn buckets_are_independent_and_due_now_is_upcoming() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let due_now = assignment(owner, AssignmentStatus::NotStarted, AssignmentType::Homework, now);
        let past_test = assignment(
            owner,
            AssignmentStatus::NotStarted,
            AssignmentType::Test,
            now - Duration::seconds(1),
        );
        let list = vec![due_now.clone(), past_test.clone()];

        let buckets = partition(&list, now);

        assert_eq!(buckets.upcoming, vec![due_now.clone()]);
        assert_eq!(buckets.homework, vec![due_now]);
        assert_eq!(buckets.tests, vec![past_test]);
    }

    #[test]
    fn query_parameter_round_trips_through_config() {
        let config = FilterConfig::from_query(Some("completed"), false);
        assert_eq!(config.status, StatusFilter::Only(AssignmentStatus::Completed));
        assert_eq!(config.query_value(), Some("completed"));

        let config = FilterConfig::from_query(Some("student"), true);
        assert_eq!(config.view_mode, ViewMode::Student);
        assert!(config.hide_completed);
        assert_eq!(config.query_value(), Some("student"));

        assert!(FilterConfig::from_query(Some("all"), false).is_identity());
        assert!(FilterConfig::from_query(Some("bogus"), false).is_identity());
        assert_eq!(FilterConfig::from_query(None, false).query_value(), None);
    }

    #[test]
    fn archive_split_is_exhaustive() {
        let owner = Uuid::new_v4();
        let now = Utc::now();
        let mut old = assignment(owner, AssignmentStatus::Completed, AssignmentType::Test, now);
        old.archived = true;
        let current = assignment(owner, AssignmentStatus::NotStarted, AssignmentType::Homework, now);
        let list = vec![old.clone(), current.clone()];

        assert_eq!(active(&list), vec![current]);
        assert_eq!(archived(&list), vec![old]);
    }
}
