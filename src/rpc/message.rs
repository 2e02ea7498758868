use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Request {
        id: u64,
        method: String,
        #[serde(default)]
        params: Vec<Value>,
    },
    Response {
        id: u64,
        #[serde(default)]
        error: Option<Value>,
        #[serde(default)]
        result: Value,
    },
    Notification {
        method: String,
        #[serde(default)]
        params: Vec<Value>,
    },
}
