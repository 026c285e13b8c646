use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Parent,
    Teacher,
    Driver,
    Admin,
    #[serde(other)]
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Parent => "parent",
            Role::Teacher => "teacher",
            Role::Driver => "driver",
            Role::Admin => "admin",
            Role::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub fcm_token: Option<String>,
    #[serde(default)]
    pub child_user_ids: Vec<String>,
}

impl User {
    /// Device token usable for push, ignoring blank values left by logged-out apps.
    pub fn push_token(&self) -> Option<&str> {
        self.fcm_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    /// Name shown to other users: name, then email, then the raw id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.email.as_deref().filter(|e| !e.is_empty()))
            .unwrap_or(self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(children: &[&str]) -> User {
        User {
            id: "parent-1".to_string(),
            role: Role::Parent,
            name: None,
            email: None,
            fcm_token: None,
            child_user_ids: children.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_deserialize_parent_document() {
        let json = r#"{
            "id": "p1",
            "role": "parent",
            "name": "Jane",
            "fcmToken": "token-1",
            "childUserIds": ["s1", "s2"]
        }"#;

        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.role, Role::Parent);
        assert_eq!(user.push_token(), Some("token-1"));
        assert_eq!(user.child_user_ids, vec!["s1", "s2"]);
    }

    #[test]
    fn test_unknown_role_is_tolerated() {
        let user: User = serde_json::from_str(r#"{"id": "x", "role": "janitor"}"#).unwrap();
        assert_eq!(user.role, Role::Unknown);
        assert!(user.child_user_ids.is_empty());
    }

    #[test]
    fn test_blank_token_is_not_a_push_token() {
        let mut user = parent(&[]);
        user.fcm_token = Some("   ".to_string());
        assert!(user.push_token().is_none());
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = parent(&[]);
        assert_eq!(user.display_name(), "parent-1");

        user.email = Some("jane@example.com".to_string());
        assert_eq!(user.display_name(), "jane@example.com");

        user.name = Some("Jane".to_string());
        assert_eq!(user.display_name(), "Jane");
    }
}
