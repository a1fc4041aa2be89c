//! Tagged failures produced at the HTTP boundary.

use thiserror::Error;

/// Errors that can occur when talking to the SkillNet API.
///
/// Callers branch on the variant (or the `is_*` helpers) instead of
/// inspecting transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// 401/403 from the backend, or no token available locally.
    #[error("Authentication failed{}", describe_status(.status))]
    Auth {
        /// HTTP status, `None` when the request was never sent.
        status: Option<u16>,
        /// Message from the response body, if any.
        message: Option<String>,
    },

    /// No response was received (connection failure or timeout).
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// The request hit the configured timeout.
        timed_out: bool,
    },

    /// Non-2xx response carrying a body.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be understood.
    #[error("Invalid API response: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    Request(String),
}

impl ApiError {
    /// Map a non-success status and its body.
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_message(body);
        match status {
            401 | 403 => Self::Auth {
                status: Some(status),
                message,
            },
            _ => Self::Api {
                status,
                message: message.unwrap_or_else(|| format!("HTTP {status}")),
            },
        }
    }

    /// Auth failure raised before any request is sent.
    #[must_use]
    pub fn missing_token() -> Self {
        Self::Auth {
            status: None,
            message: Some("No authentication token found".to_string()),
        }
    }

    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    #[must_use]
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Network { timed_out: true, .. })
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }

    /// Message suitable for showing to a user, when the backend sent one.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Auth { message, .. } => message.as_deref(),
            Self::Api { message, .. } => Some(message),
            Self::Network { .. } | Self::Decode(_) | Self::Request(_) => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network {
                message: e.to_string(),
                timed_out: true,
            }
        } else if e.is_builder() {
            Self::Request(e.to_string())
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network {
                message: e.to_string(),
                timed_out: false,
            }
        }
    }
}

#[allow(clippy::ref_option)]
fn describe_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"message": ...}`, `{"error": ...}`, or plain text.
fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return ["message", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
            .filter(|m| !m.is_empty())
            .map(str::to_owned);
    }

    Some(trimmed.to_owned())
}
