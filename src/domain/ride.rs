use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Per-student boarding state tracked by the driver app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentRideStatus {
    Pending,
    PickedUp,
    DroppedOff,
}

impl StudentRideStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "picked-up" => Some(Self::PickedUp),
            "dropped-off" => Some(Self::DroppedOff),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PickedUp => "picked up",
            Self::DroppedOff => "dropped off",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusRide {
    #[serde(default)]
    pub driver_id: Option<String>,
    #[serde(default)]
    pub driver_name: Option<String>,
    #[serde(default)]
    pub route_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<serde_json::Value>,
    #[serde(default)]
    pub student_ids: Vec<String>,
    #[serde(default, deserialize_with = "string_entries")]
    pub student_statuses: BTreeMap<String, String>,
}

/// Keeps only string-valued entries; a null or non-string status reads as absent.
fn string_entries<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(student_id, status)| match status {
            serde_json::Value::String(status) => Some((student_id, status)),
            _ => None,
        })
        .collect())
}

impl BusRide {
    pub fn route_label(&self) -> &str {
        self.route_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or("route")
    }

    /// Students present on this ride but not on `previous`, in roster order.
    pub fn added_students(&self, previous: &BusRide) -> Vec<String> {
        let mut added: Vec<String> = Vec::new();
        for id in &self.student_ids {
            if !previous.student_ids.contains(id) && !added.contains(id) {
                added.push(id.clone());
            }
        }
        added
    }

    /// Students whose status entry differs from `previous`, with the new raw status.
    /// An entry removed from the map yields `None`.
    pub fn status_changes(&self, previous: &BusRide) -> Vec<(String, Option<String>)> {
        let mut students: Vec<&String> = self
            .student_statuses
            .keys()
            .chain(previous.student_statuses.keys())
            .collect();
        students.sort();
        students.dedup();

        students
            .into_iter()
            .filter_map(|id| {
                let old = previous.student_statuses.get(id);
                let new = self.student_statuses.get(id);
                (old != new).then(|| (id.clone(), new.cloned()))
            })
            .collect()
    }

    pub fn is_status_or_location_changed(&self, previous: &BusRide) -> bool {
        self.status != previous.status || self.location != previous.location
    }
}
