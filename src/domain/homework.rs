use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkAssignment {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    pub subject_id: String,
    #[serde(default)]
    pub assigned_to: Vec<String>,
}

impl HomeworkAssignment {
    /// True when a field students care about differs between two versions.
    pub fn is_materially_changed(&self, previous: &HomeworkAssignment) -> bool {
        self.title != previous.title
            || self.description != previous.description
            || self.due_date != previous.due_date
    }

    pub fn due_date_label(&self) -> String {
        self.due_date.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeworkSubmission {
    pub homework_id: String,
    pub student_id: String,
}
