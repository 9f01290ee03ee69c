/// Errors surfaced by client operations.
///
/// Every variant is recoverable: components store `to_string()` in their
/// state and keep running.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Network failure, refused connection or timeout.
    #[error("request failed: {0}")]
    Transport(String),

    /// The server answered with something other than JSON.
    #[error("non-JSON response (HTTP {status}) from {url}: {preview}")]
    NonJson {
        status: u16,
        url: String,
        preview: String,
    },

    /// The server answered with a JSON error payload.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// JSON that did not parse, or did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Rejected client-side before any request was issued.
    #[error("{0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status carried by the error, when the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NonJson { status, .. } | Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("timed out: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Longest body preview carried in an error message.
pub const PREVIEW_LEN: usize = 200;

/// Cuts `body` down to [`PREVIEW_LEN`] characters, marking the cut with `...`.
pub fn truncate_preview(body: &str) -> String {
    if body.chars().count() <= PREVIEW_LEN {
        body.to_owned()
    } else {
        format!("{}...", body.chars().take(PREVIEW_LEN).collect::<String>())
    }
}
