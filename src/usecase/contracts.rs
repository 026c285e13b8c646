use crate::{
    domain::attendance::AttendanceSession,
    domain::homework::HomeworkAssignment,
    domain::notification::{NewNotification, Notification},
    domain::push::PushMessage,
    domain::subject::Subject,
    domain::user::{Role, User},
    repository::errors::RepositoryError,
    usecase::push_gateway::PushError,
};

/// Read-only lookups into the school's document store.
#[cfg_attr(test, mockall::automock)]
pub trait SchoolDirectory: Send + Sync {
    async fn find_user(&self, id: &str) -> Result<Option<User>, RepositoryError>;
    async fn find_users_by_role(&self, role: Role) -> Result<Vec<User>, RepositoryError>;
    async fn find_subject(&self, id: &str) -> Result<Option<Subject>, RepositoryError>;
    async fn find_homework(&self, id: &str) -> Result<Option<HomeworkAssignment>, RepositoryError>;
    async fn find_attendance_session(
        &self,
        id: &str,
    ) -> Result<Option<AttendanceSession>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> Result<Notification, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait PushGateway: Send + Sync {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError>;
}
