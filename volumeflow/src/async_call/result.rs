use serde::{Deserialize, Serialize};

/// Raw outcome a collaborator hands back through a callback handle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    /// Backend failure detail, passed upward verbatim.
    #[serde(default)]
    pub detail: Option<String>,
    /// Backend-specific payload (e.g. the install path of a new volume).
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

impl OperationResult {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: Some(detail.into()),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// String field of the payload object, if present.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.as_ref()?.get(key)?.as_str()
    }

    /// Failure detail, or a generic message when the backend gave none.
    pub fn detail_or_default(&self) -> String {
        self.detail
            .clone()
            .unwrap_or_else(|| "operation failed without detail".to_string())
    }
}
