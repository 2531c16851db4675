// Upstream student model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Student record as returned by the upstream API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    /// Any other fields the upstream sends
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
