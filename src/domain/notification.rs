use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum NotificationCategory {
    Homework,
    HomeworkSubmission,
    Attendance,
    Bus,
}

impl NotificationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationCategory::Homework => "homework",
            NotificationCategory::HomeworkSubmission => "homework_submission",
            NotificationCategory::Attendance => "attendance",
            NotificationCategory::Bus => "bus",
        }
    }
}

impl fmt::Display for NotificationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-app notification as stored; `created_at` comes from the database clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: String,
    pub category: NotificationCategory,
    pub message: String,
    pub related_id: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub id: Uuid,
    pub user_id: String,
    pub category: NotificationCategory,
    pub message: String,
    pub related_id: String,
}

impl NewNotification {
    pub fn new(
        user_id: String,
        category: NotificationCategory,
        message: String,
        related_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            category,
            message,
            related_id,
        }
    }

    #[cfg(test)]
    pub fn into_stored(self, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id: self.id,
            user_id: self.user_id,
            category: self.category,
            message: self.message,
            related_id: self.related_id,
            is_read: false,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_notifications_get_distinct_ids() {
        let a = NewNotification::new(
            "s1".to_string(),
            NotificationCategory::Homework,
            "New homework assigned: Fractions".to_string(),
            "hw1".to_string(),
        );
        let b = NewNotification::new(
            "s1".to_string(),
            NotificationCategory::Homework,
            "New homework assigned: Fractions".to_string(),
            "hw1".to_string(),
        );
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_into_stored_is_unread() {
        let now = Utc::now();
        let stored = NewNotification::new(
            "p1".to_string(),
            NotificationCategory::Bus,
            "Your bus is delayed".to_string(),
            "ride-1".to_string(),
        )
        .into_stored(now);

        assert!(!stored.is_read);
        assert_eq!(stored.created_at, now);
        assert_eq!(stored.category.to_string(), "bus");
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&NotificationCategory::HomeworkSubmission).unwrap();
        assert_eq!(json, "\"homework_submission\"");
    }
}
