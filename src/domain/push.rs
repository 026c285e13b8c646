use std::collections::BTreeMap;

use serde::Serialize;

pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushContent {
    pub title: String,
    pub body: String,
}

/// One push to one device, in the gateway's `message` shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub token: String,
    pub notification: PushContent,
    pub data: BTreeMap<String, String>,
}
