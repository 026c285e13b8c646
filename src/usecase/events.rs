use futures::future::join_all;

use crate::domain::change::DocumentChange;
use crate::usecase::contracts::{NotificationRepository, PushGateway, SchoolDirectory};
use crate::usecase::notifications::{FanOutReport, NotificationsUseCase};
use crate::usecase::rules::Rule;

#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    /// The change was not notification-worthy for this rule.
    Skipped,
    /// Planning or guardian resolution failed; nothing was delivered.
    Aborted(String),
    Delivered(FanOutReport),
}

impl RuleOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleOutcome::Skipped => "skipped",
            RuleOutcome::Aborted(_) => "aborted",
            RuleOutcome::Delivered(_) => "delivered",
        }
    }
}

/// Routes document changes to the rules registered for them. Handling never
/// fails from the caller's point of view: every problem ends up in the logs.
pub struct EventsUseCase<D, N, P>
where
    D: SchoolDirectory,
    N: NotificationRepository,
    P: PushGateway,
{
    notifications: NotificationsUseCase<D, N, P>,
}

impl<D, N, P> EventsUseCase<D, N, P>
where
    D: SchoolDirectory,
    N: NotificationRepository,
    P: PushGateway,
{
    pub fn new(notifications: NotificationsUseCase<D, N, P>) -> Self {
        Self { notifications }
    }

    #[tracing::instrument(skip(self, change), fields(collection = %change.collection, kind = ?change.kind, document_id = %change.document_id))]
    pub async fn handle(&self, change: &DocumentChange) -> Vec<(Rule, RuleOutcome)> {
        let rules = Rule::matching(change);
        if rules.is_empty() {
            tracing::debug!("no rule registered for change");
            return Vec::new();
        }

        let outcomes = join_all(rules.iter().map(|rule| self.apply(*rule, change))).await;
        rules.into_iter().zip(outcomes).collect()
    }

    async fn apply(&self, rule: Rule, change: &DocumentChange) -> RuleOutcome {
        let outcome = match rule.plan(change, self.notifications.directory()).await {
            Ok(None) => RuleOutcome::Skipped,
            Ok(Some(plan)) => match self.notifications.fan_out(&plan).await {
                Ok(report) => RuleOutcome::Delivered(report),
                Err(e) => {
                    tracing::error!(rule = rule.name(), error = %e, "fan-out aborted");
                    RuleOutcome::Aborted(e.to_string())
                }
            },
            Err(e) => {
                tracing::warn!(rule = rule.name(), error = %e, kind = e.kind(), "rule aborted");
                RuleOutcome::Aborted(e.to_string())
            }
        };

        metrics::counter!(
            "notifier_events_total",
            "rule" => rule.name(),
            "outcome" => outcome.as_str()
        )
        .increment(1);
        tracing::debug!(rule = rule.name(), outcome = outcome.as_str(), "rule handled");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;
    use crate::domain::change::{HOMEWORKS, RIDES, SUBMISSIONS};
    use crate::domain::subject::Subject;
    use crate::domain::user::{Role, User};
    use crate::repository::errors::RepositoryError;
    use crate::usecase::contracts::{
        MockNotificationRepository, MockPushGateway, MockSchoolDirectory,
    };

    fn parent(id: &str, children: &[&str]) -> User {
        User {
            id: id.to_string(),
            role: Role::Parent,
            name: None,
            email: None,
            fcm_token: None,
            child_user_ids: children.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn usecase(
        directory: MockSchoolDirectory,
        repo: MockNotificationRepository,
    ) -> EventsUseCase<MockSchoolDirectory, MockNotificationRepository, MockPushGateway> {
        EventsUseCase::new(NotificationsUseCase::new(
            directory,
            repo,
            MockPushGateway::new(),
        ))
    }

    fn homework(students: &[&str]) -> serde_json::Value {
        json!({
            "title": "Fractions",
            "dueDate": "2024-03-15T09:00:00Z",
            "subjectId": "math",
            "assignedTo": students,
        })
    }

    #[tokio::test]
    async fn test_homework_created_counts() {
        let mut directory = MockSchoolDirectory::new();
        directory.expect_find_subject().returning(|_| {
            Ok(Some(Subject {
                id: "math".to_string(),
                name: None,
                teacher_id: Some("t1".to_string()),
            }))
        });
        directory.expect_find_users_by_role().times(1).returning(|_| {
            Ok(vec![parent("p1", &["s1"]), parent("p2", &["s1", "s3"])])
        });
        directory.expect_find_user().returning(|_| Ok(None));

        let mut repo = MockNotificationRepository::new();
        repo.expect_create()
            .times(7)
            .returning(|n| Ok(n.clone().into_stored(Utc::now())));

        let change = DocumentChange::created(HOMEWORKS, "hw1", homework(&["s1", "s2", "s3"]));
        let outcomes = usecase(directory, repo).handle(&change).await;

        // 3 students + p1, p2 for s1 + p2 for s3 + teacher
        assert_eq!(outcomes.len(), 1);
        match &outcomes[0] {
            (Rule::HomeworkCreated, RuleOutcome::Delivered(report)) => {
                assert_eq!(report.written, 7)
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ride_update_adding_student_notifies_only_new_student() {
        let mut directory = MockSchoolDirectory::new();
        directory
            .expect_find_users_by_role()
            .returning(|_| Ok(vec![parent("pa", &["a"]), parent("pc", &["c"])]));
        directory.expect_find_user().returning(|_| Ok(None));

        let mut repo = MockNotificationRepository::new();
        repo.expect_create()
            .withf(|n| n.user_id == "c" || n.user_id == "pc")
            .times(2)
            .returning(|n| Ok(n.clone().into_stored(Utc::now())));

        let before = json!({"routeName": "North", "status": "started", "studentIds": ["a", "b"]});
        let after =
            json!({"routeName": "North", "status": "started", "studentIds": ["a", "b", "c"]});
        let change = DocumentChange::updated(RIDES, "r1", before, after);

        let outcomes = usecase(directory, repo).handle(&change).await;
        let delivered: Vec<_> = outcomes
            .iter()
            .filter(|(_, o)| matches!(o, RuleOutcome::Delivered(_)))
            .map(|(rule, _)| *rule)
            .collect();
        assert_eq!(delivered, vec![Rule::StudentAddedToRide]);
    }

    #[tokio::test]
    async fn test_missing_reference_is_logged_not_raised() {
        let mut directory = MockSchoolDirectory::new();
        directory.expect_find_homework().returning(|_| Ok(None));
        let mut repo = MockNotificationRepository::new();
        repo.expect_create().never();

        let change = DocumentChange::created(
            SUBMISSIONS,
            "sub-1",
            json!({"homeworkId": "gone", "studentId": "s1"}),
        );
        let outcomes = usecase(directory, repo).handle(&change).await;

        assert!(matches!(
            outcomes.as_slice(),
            [(Rule::HomeworkSubmitted, RuleOutcome::Aborted(_))]
        ));
    }

    #[tokio::test]
    async fn test_guardian_lookup_failure_aborts_event() {
        let mut directory = MockSchoolDirectory::new();
        directory
            .expect_find_users_by_role()
            .returning(|_| Err(RepositoryError::DatabaseError("down".to_string())));
        let mut repo = MockNotificationRepository::new();
        repo.expect_create().never();

        let before = json!({"status": "pending", "studentIds": ["a"]});
        let after = json!({"status": "delayed", "studentIds": ["a"]});
        let change = DocumentChange::updated(RIDES, "r1", before, after);
        let outcomes = usecase(directory, repo).handle(&change).await;

        assert!(outcomes.iter().any(|(rule, outcome)| *rule == Rule::BusStatusChanged
            && matches!(outcome, RuleOutcome::Aborted(_))));
    }

    #[tokio::test]
    async fn test_replayed_event_duplicates_notifications() {
        let mut directory = MockSchoolDirectory::new();
        directory.expect_find_users_by_role().returning(|_| Ok(vec![]));
        directory.expect_find_user().returning(|_| Ok(None));

        let mut repo = MockNotificationRepository::new();
        repo.expect_create()
            .times(2)
            .returning(|n| Ok(n.clone().into_stored(Utc::now())));

        let change = DocumentChange::created(
            "attendance_records",
            "rec-1",
            json!({"studentId": "s1", "status": "absent"}),
        );
        let events = usecase(directory, repo);
        events.handle(&change).await;
        events.handle(&change).await;
    }

    #[tokio::test]
    async fn test_unregistered_collection_is_ignored() {
        let change = DocumentChange::created("notifications", "n1", json!({}));
        let outcomes = usecase(MockSchoolDirectory::new(), MockNotificationRepository::new())
            .handle(&change)
            .await;
        assert!(outcomes.is_empty());
    }
}
