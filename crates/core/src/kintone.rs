use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// kintone webhook notification body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KintoneEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub app: KintoneApp,
    #[serde(default)]
    pub record: Option<Box<RawValue>>,
    #[serde(default, rename = "recordTitle")]
    pub record_title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KintoneApp {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl KintoneEvent {
    /// Parses a webhook body; `type` and `app.id` are required.
    pub fn parse(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}
