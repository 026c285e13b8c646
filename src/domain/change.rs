use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HOMEWORKS: &str = "homeworks";
pub const SUBJECTS: &str = "subjects";
pub const USERS: &str = "users";
pub const ATTENDANCE_RECORDS: &str = "attendance_records";
pub const ATTENDANCE_SESSIONS: &str = "attendance_sessions";
pub const RIDES: &str = "rides";
pub const SUBMISSIONS: &str = "submissions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{0} snapshot missing")]
    MissingSnapshot(&'static str),
    #[error("malformed {side} snapshot: {source}")]
    Malformed {
        side: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A create or update observed on one document of the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChange {
    pub collection: String,
    pub kind: ChangeKind,
    pub document_id: String,
    #[serde(default)]
    pub before: Option<serde_json::Value>,
    #[serde(default)]
    pub after: Option<serde_json::Value>,
}

#[cfg(test)]
impl DocumentChange {
    pub fn created(collection: &str, document_id: &str, after: serde_json::Value) -> Self {
        Self {
            collection: collection.to_string(),
            kind: ChangeKind::Created,
            document_id: document_id.to_string(),
            before: None,
            after: Some(after),
        }
    }

    pub fn updated(
        collection: &str,
        document_id: &str,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self {
            collection: collection.to_string(),
            kind: ChangeKind::Updated,
            document_id: document_id.to_string(),
            before: Some(before),
            after: Some(after),
        }
    }
}

impl DocumentChange {
    pub fn before_as<T: DeserializeOwned>(&self) -> Result<T, DocumentError> {
        decode(self.before.as_ref(), "before")
    }

    pub fn after_as<T: DeserializeOwned>(&self) -> Result<T, DocumentError> {
        decode(self.after.as_ref(), "after")
    }
}

fn decode<T: DeserializeOwned>(
    snapshot: Option<&serde_json::Value>,
    side: &'static str,
) -> Result<T, DocumentError> {
    let value = snapshot.ok_or(DocumentError::MissingSnapshot(side))?;
    T::deserialize(value).map_err(|source| DocumentError::Malformed { side, source })
}
