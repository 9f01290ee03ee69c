use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Decodes an explicit `null` the same way as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Lifecycle status of a task.
///
/// Statuses the client does not know about deserialize to `Unknown` so a new
/// backend state never breaks task loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    Assigned,
    InProgress,
    Completed,
    #[serde(other)]
    Unknown,
}

impl TaskStatus {
    /// Statuses in which the client and the assigned tasker share a chat.
    pub fn has_chat(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress | Self::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Tasker,
    #[serde(other)]
    Unknown,
}

/// The person looking at a task. Supplied by the caller, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub role: Role,
}

impl User {
    pub fn new(id: i64, role: Role) -> Self {
        Self { id, role }
    }
}

/// A marketplace job posting.
///
/// Ownership fields are all optional because backends disagree on which of
/// them they fill in; the publisher is resolved as
/// `publisher_id` → `client_id` → the deal's `client_id`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: TaskStatus,
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub publisher_id: Option<i64>,
    #[serde(default)]
    pub assigned_tasker_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_dealed_id: Option<i64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Agreement linking a client and a tasker for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: i64,
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub tasker_id: Option<i64>,
    #[serde(default)]
    pub client_id: Option<i64>,
    #[serde(default)]
    pub offer_id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A chat message on a task's current deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    /// Kept as sent by the server; see [`Message::created_at_utc`].
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub sender_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dealed_id: Option<i64>,
}

impl Message {
    /// Parses `created_at` as RFC 3339 or RFC 2822 (the format Flask's
    /// `jsonify` emits). Anything else yields `None`.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        let raw = self.created_at.as_deref()?.trim();
        DateTime::parse_from_rfc3339(raw)
            .or_else(|_| DateTime::parse_from_rfc2822(raw))
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    pub fn is_from(&self, user_id: i64) -> bool {
        self.sender_id == Some(user_id)
    }
}

/// A tasker's bid on a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: i64,
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default)]
    pub tasker_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A client's rating of the tasker who completed a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    #[serde(default)]
    pub task_id: Option<i64>,
    #[serde(default, alias = "tasker_id")]
    pub worker_id: Option<i64>,
    #[serde(default, alias = "rate")]
    pub rating: Option<u8>,
    #[serde(default, alias = "review")]
    pub comment: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub deal_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
}
