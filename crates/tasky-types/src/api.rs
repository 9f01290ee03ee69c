use serde::{Deserialize, Serialize};

use crate::models::TaskStatus;

// -- Tasks --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_tasker_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

// -- Offers --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOfferRequest {
    pub tasker_id: i64,
    pub amount: f64,
    pub message: String,
}

// -- Messages --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
    /// There is no auth layer, so the sender identifies itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<i64>,
}

// -- Reviews --

pub const REVIEW_TARGET_TASKER: &str = "tasker";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateReviewRequest {
    pub target: String,
    pub task_id: i64,
    pub worker_id: i64,
    pub rating: u8,
    pub comment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<i64>,
}

// -- Errors --

/// Error payload returned by the backend. `message` is preferred over
/// `detail` when both are present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorBody {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            detail: None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .filter(|m| !m.is_empty())
            .or(self.detail.as_deref().filter(|d| !d.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_request_omits_missing_deal() {
        let req = CreateReviewRequest {
            target: REVIEW_TARGET_TASKER.into(),
            task_id: 5,
            worker_id: 2,
            rating: 5,
            comment: "great".into(),
            deal_id: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("deal_id").is_none());
        assert_eq!(json["target"], "tasker");
    }

    #[test]
    fn error_body_prefers_message_over_detail() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"message": "nope", "detail": "db locked"}"#).unwrap();
        assert_eq!(body.text(), Some("nope"));

        let body: ErrorBody = serde_json::from_str(r#"{"detail": "db locked"}"#).unwrap();
        assert_eq!(body.text(), Some("db locked"));

        let body: ErrorBody = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(body.text(), None);
    }
}
