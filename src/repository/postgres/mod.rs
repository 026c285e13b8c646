use serde::de::DeserializeOwned;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    domain::attendance::AttendanceSession,
    domain::change::{ATTENDANCE_SESSIONS, HOMEWORKS, SUBJECTS, USERS},
    domain::homework::HomeworkAssignment,
    domain::notification::{NewNotification, Notification},
    domain::subject::Subject,
    domain::user::{Role, User},
    repository::errors::RepositoryError,
    usecase::contracts::{NotificationRepository, SchoolDirectory},
};

pub struct PostgresSchoolDirectory {
    pool: PgPool,
}

impl PostgresSchoolDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_document<T: DeserializeOwned>(
        &self,
        collection: &'static str,
        id: &str,
    ) -> Result<Option<T>, RepositoryError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r#"
            SELECT data
            FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        row.map(|(data,)| decode_document(collection, id, data))
            .transpose()
    }
}

/// Decodes a stored document, filling `id` from the key when the body lacks it.
fn decode_document<T: DeserializeOwned>(
    collection: &'static str,
    id: &str,
    mut data: serde_json::Value,
) -> Result<T, RepositoryError> {
    if let Some(object) = data.as_object_mut() {
        object
            .entry("id")
            .or_insert_with(|| serde_json::Value::String(id.to_string()));
    }

    serde_json::from_value(data).map_err(|e| RepositoryError::MalformedDocument {
        collection,
        id: id.to_string(),
        message: e.to_string(),
    })
}

impl SchoolDirectory for PostgresSchoolDirectory {
    #[tracing::instrument(skip(self, id), fields(user_id = %id))]
    async fn find_user(&self, id: &str) -> Result<Option<User>, RepositoryError> {
        tracing::debug!("finding user by id");
        self.find_document(USERS, id).await
    }

    #[tracing::instrument(skip(self, role), fields(role = role.as_str()))]
    async fn find_users_by_role(&self, role: Role) -> Result<Vec<User>, RepositoryError> {
        tracing::debug!("scanning users by role");

        let rows: Vec<(String, serde_json::Value)> = sqlx::query_as(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = $1 AND data->>'role' = $2
            "#,
        )
        .bind(USERS)
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        let total = rows.len();
        let users: Vec<User> = rows
            .into_iter()
            .filter_map(|(id, data)| match decode_document(USERS, &id, data) {
                Ok(user) => Some(user),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping malformed user document");
                    None
                }
            })
            .collect();

        tracing::debug!(total, decoded = users.len(), "users scanned");
        Ok(users)
    }

    #[tracing::instrument(skip(self, id), fields(subject_id = %id))]
    async fn find_subject(&self, id: &str) -> Result<Option<Subject>, RepositoryError> {
        tracing::debug!("finding subject by id");
        self.find_document(SUBJECTS, id).await
    }

    #[tracing::instrument(skip(self, id), fields(homework_id = %id))]
    async fn find_homework(&self, id: &str) -> Result<Option<HomeworkAssignment>, RepositoryError> {
        tracing::debug!("finding homework by id");
        self.find_document(HOMEWORKS, id).await
    }

    #[tracing::instrument(skip(self, id), fields(session_id = %id))]
    async fn find_attendance_session(
        &self,
        id: &str,
    ) -> Result<Option<AttendanceSession>, RepositoryError> {
        tracing::debug!("finding attendance session by id");
        self.find_document(ATTENDANCE_SESSIONS, id).await
    }
}

pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl NotificationRepository for PostgresNotificationRepository {
    #[tracing::instrument(skip(self, notification), fields(notification_id = %notification.id, user_id = %notification.user_id))]
    async fn create(&self, notification: &NewNotification) -> Result<Notification, RepositoryError> {
        tracing::debug!("inserting notification");

        let stored = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, category, message, related_id, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, FALSE, NOW())
            RETURNING id, user_id, category, message, related_id, is_read, created_at
            "#,
        )
        .bind(notification.id)
        .bind(&notification.user_id)
        .bind(notification.category)
        .bind(&notification.message)
        .bind(&notification.related_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::DatabaseError(e.to_string()))?;

        tracing::debug!(notification_id = %stored.id, "notification inserted");
        Ok(stored)
    }
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
