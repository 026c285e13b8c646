use std::collections::BTreeMap;

use futures::future::join_all;

use crate::domain::notification::{NewNotification, Notification, NotificationCategory};
use crate::domain::push::{PushContent, PushMessage, CLICK_ACTION};
use crate::repository::errors::RepositoryError;
use crate::usecase::contracts::{NotificationRepository, PushGateway, SchoolDirectory};
use crate::usecase::error::UsecaseError;
use crate::usecase::recipients::GuardianIndex;

/// Title and text shown to one kind of recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: String,
    /// Stored record text, also the push body unless `body` overrides it.
    pub message: String,
    pub body: Option<String>,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn push_body(&self) -> &str {
        self.body.as_deref().unwrap_or(&self.message)
    }
}

/// A student to notify; each of their guardians receives `guardians`.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentTarget {
    pub student_id: String,
    pub student: Notice,
    pub guardians: Notice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeacherTarget {
    pub teacher_id: String,
    pub notice: Notice,
}

/// Everything one event wants delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOut {
    pub category: NotificationCategory,
    pub related_id: String,
    /// Rule-specific push data; `type` and `click_action` are added on send.
    pub data: BTreeMap<String, String>,
    pub students: Vec<StudentTarget>,
    pub teacher: Option<TeacherTarget>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Sent,
    NoToken,
    Failed,
}

impl PushOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushOutcome::Sent => "sent",
            PushOutcome::NoToken => "no_token",
            PushOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanOutReport {
    pub written: usize,
    pub write_failures: usize,
    pub pushes_sent: usize,
    pub pushes_without_token: usize,
    pub push_failures: usize,
}

impl FanOutReport {
    pub fn recipients(&self) -> usize {
        self.written + self.write_failures
    }

    fn record(&mut self, written: bool, push: PushOutcome) {
        if written {
            self.written += 1;
        } else {
            self.write_failures += 1;
        }
        match push {
            PushOutcome::Sent => self.pushes_sent += 1,
            PushOutcome::NoToken => self.pushes_without_token += 1,
            PushOutcome::Failed => self.push_failures += 1,
        }
    }
}

/// Where a recipient's device token comes from.
#[derive(Debug, Clone, Copy)]
pub enum DeviceToken<'a> {
    /// Already loaded with the user document.
    Known(Option<&'a str>),
    /// Requires a user lookup.
    Lookup,
}

struct Delivery<'a> {
    user_id: &'a str,
    notice: &'a Notice,
    device: DeviceToken<'a>,
}

pub struct NotificationsUseCase<D, N, P>
where
    D: SchoolDirectory,
    N: NotificationRepository,
    P: PushGateway,
{
    directory: D,
    notification_repository: N,
    push_gateway: P,
}

impl<D, N, P> NotificationsUseCase<D, N, P>
where
    D: SchoolDirectory,
    N: NotificationRepository,
    P: PushGateway,
{
    pub fn new(directory: D, notification_repository: N, push_gateway: P) -> Self {
        Self {
            directory,
            notification_repository,
            push_gateway,
        }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Persists one in-app notification. Identical calls produce identical rows.
    #[tracing::instrument(skip(self, notification), fields(user_id = %notification.user_id, category = %notification.category))]
    pub async fn write(&self, notification: NewNotification) -> Result<Notification, RepositoryError> {
        let category = notification.category;
        let stored = self.notification_repository.create(&notification).await?;

        metrics::counter!("notifier_notifications_written_total", "category" => category.as_str())
            .increment(1);
        tracing::debug!(notification_id = %stored.id, "notification written");
        Ok(stored)
    }

    /// Best-effort push to a user's device. Never fails; the outcome is only reported.
    #[tracing::instrument(skip(self, device, content, data))]
    pub async fn dispatch(
        &self,
        user_id: &str,
        device: DeviceToken<'_>,
        content: PushContent,
        data: BTreeMap<String, String>,
    ) -> PushOutcome {
        let token = match device {
            DeviceToken::Known(token) => token.map(str::to_owned),
            DeviceToken::Lookup => match self.directory.find_user(user_id).await {
                Ok(user) => user.and_then(|u| u.push_token().map(str::to_owned)),
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "failed to look up device token");
                    return PushOutcome::Failed;
                }
            },
        };

        let Some(token) = token else {
            tracing::debug!(user_id, "no device token, push skipped");
            return PushOutcome::NoToken;
        };

        let message = PushMessage {
            token,
            notification: content,
            data,
        };
        match self.push_gateway.send(&message).await {
            Ok(()) => {
                tracing::debug!(user_id, "push sent");
                PushOutcome::Sent
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "failed to send push");
                PushOutcome::Failed
            }
        }
    }

    /// Delivers a planned event to every recipient. Guardian resolution failures
    /// abort before anything is written; individual write or push failures do not.
    #[tracing::instrument(skip(self, plan), fields(category = %plan.category, related_id = %plan.related_id))]
    pub async fn fan_out(&self, plan: &FanOut) -> Result<FanOutReport, UsecaseError> {
        let guardians = if plan.students.is_empty() {
            GuardianIndex::default()
        } else {
            GuardianIndex::load(&self.directory).await?
        };

        let mut deliveries = Vec::new();
        for target in &plan.students {
            deliveries.push(Delivery {
                user_id: &target.student_id,
                notice: &target.student,
                device: DeviceToken::Lookup,
            });
            for parent in guardians.guardians_of(&target.student_id) {
                deliveries.push(Delivery {
                    user_id: &parent.id,
                    notice: &target.guardians,
                    device: DeviceToken::Known(parent.push_token()),
                });
            }
        }
        if let Some(teacher) = &plan.teacher {
            deliveries.push(Delivery {
                user_id: &teacher.teacher_id,
                notice: &teacher.notice,
                device: DeviceToken::Lookup,
            });
        }

        let results = join_all(deliveries.iter().map(|d| self.deliver(plan, d))).await;

        let mut report = FanOutReport::default();
        for (written, push) in results {
            report.record(written, push);
        }

        tracing::info!(
            recipients = report.recipients(),
            written = report.written,
            write_failures = report.write_failures,
            pushes_sent = report.pushes_sent,
            push_failures = report.push_failures,
            "fan-out completed"
        );
        Ok(report)
    }

    /// Record write and push run side by side; neither waits on the other's result.
    async fn deliver(&self, plan: &FanOut, delivery: &Delivery<'_>) -> (bool, PushOutcome) {
        let record = NewNotification::new(
            delivery.user_id.to_string(),
            plan.category,
            delivery.notice.message.clone(),
            plan.related_id.clone(),
        );

        let mut data = plan.data.clone();
        data.insert("type".to_string(), plan.category.as_str().to_string());
        data.insert("click_action".to_string(), CLICK_ACTION.to_string());
        let content = PushContent {
            title: delivery.notice.title.clone(),
            body: delivery.notice.push_body().to_string(),
        };

        let (written, push) = tokio::join!(
            self.write(record),
            self.dispatch(delivery.user_id, delivery.device, content, data)
        );

        if let Err(e) = &written {
            metrics::counter!(
                "notifier_notification_write_failures_total",
                "category" => plan.category.as_str()
            )
            .increment(1);
            tracing::error!(user_id = delivery.user_id, error = %e, "failed to write notification");
        }
        metrics::counter!(
            "notifier_push_total",
            "category" => plan.category.as_str(),
            "outcome" => push.as_str()
        )
        .increment(1);

        (written.is_ok(), push)
    }
}
