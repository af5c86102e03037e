use reqwest::StatusCode;

/// Every way a backend call can fail, as seen from the client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A required input was missing; caught before any request is sent.
    #[error("{0}")]
    Validation(String),

    /// The requested expiry cannot be represented as a date.
    #[error("expiry out of range: {0}")]
    ExpiryOutOfRange(String),

    /// Timeout, refused connection, DNS failure and friends.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("server rejected request ({status}){}", fmt_message(.message))]
    Server {
        status: StatusCode,
        message: Option<String>,
    },

    /// The referenced resource no longer exists (e.g. a deleted link).
    #[error("not found{}", fmt_message(.message))]
    NotFound { message: Option<String> },

    /// A success response whose body was not what we expected.
    #[error("unexpected response body: {0}")]
    Decode(String),

    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Text to show the user: the backend's own message when it sent one,
    /// the validation text for local rejections, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Server {
                message: Some(msg), ..
            }
            | ApiError::NotFound { message: Some(msg) } => msg.clone(),
            _ => fallback.to_owned(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

fn fmt_message(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}
