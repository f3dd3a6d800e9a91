//! Error classification with Sentry integration.
//!
//! Backend calls fail with an [`ApiError`]. State components never hand
//! those to their consumers: every failure is classified into an
//! [`ErrorKind`] and re-emitted as a [`StoreError`] carrying exactly one
//! user-displayable message. Server-side and unexpected failures are
//! captured to Sentry on the way through.

use reqwest::StatusCode;
use thiserror::Error;

use crate::storage::StorageError;

/// Longest backend validation message shown to the user verbatim.
const MAX_PASSTHROUGH_LEN: usize = 200;

/// Transport-level error from a backend call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (DNS, refused, timeout, ...).
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The response body could not be decoded.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request URL could not be built from the configured base URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// The backend issued a credential that does not decode.
    #[error("Malformed credential received")]
    MalformedCredential,

    /// The credential could not be persisted locally.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Rejected locally because no session is active; nothing was sent.
    #[error("Not logged in")]
    NotAuthenticated,

    /// Rejected locally because the input is invalid; nothing was sent.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// User-facing error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response from the backend (status 0).
    Connectivity,
    /// 401 / 403, or no local session.
    Auth,
    /// 404.
    NotFound,
    /// 400, or invalid local input.
    Validation,
    /// 5xx.
    Server,
    /// Anything else, including undecodable responses.
    Unknown,
}

impl ErrorKind {
    /// Classify an HTTP status.
    #[must_use]
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            0 => Self::Connectivity,
            401 | 403 => Self::Auth,
            404 => Self::NotFound,
            400 => Self::Validation,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }

    /// The generic message for this category.
    #[must_use]
    pub const fn generic_message(self) -> &'static str {
        match self {
            Self::Connectivity => {
                "Could not reach the store. Check your connection and try again."
            }
            Self::Auth => "You are not authorized. Please log in and try again.",
            Self::NotFound => "The requested item could not be found.",
            Self::Validation => "The request was not valid. Please review the data and try again.",
            Self::Server => "The store is having problems right now. Please try again later.",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }
}

impl ApiError {
    /// Categorize this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(err) => match err.status() {
                Some(status) => ErrorKind::from_status(status),
                None if err.is_decode() => ErrorKind::Unknown,
                None => ErrorKind::Connectivity,
            },
            Self::Status { status, .. } => ErrorKind::from_status(*status),
            Self::Parse(_) | Self::Url(_) | Self::MalformedCredential | Self::Storage(_) => {
                ErrorKind::Unknown
            }
            Self::NotAuthenticated => ErrorKind::Auth,
            Self::InvalidInput(_) => ErrorKind::Validation,
        }
    }

    /// The single message to show the user for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        let kind = self.kind();
        let passthrough = match self {
            Self::Status { body, .. } if kind == ErrorKind::Validation => {
                validation_message(body)
            }
            Self::InvalidInput(msg) => Some(msg.clone()),
            _ => None,
        };
        passthrough.unwrap_or_else(|| kind.generic_message().to_string())
    }
}

/// Extract a backend validation message if it is fit to show as-is.
///
/// JSON bodies of the form `{"message": ..}` or `{"error": ..}` are unwrapped
/// first. The message is used only when it is short, single-line plain text.
fn validation_message(body: &str) -> Option<String> {
    let body = body.trim();
    let text = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "mensaje", "error"]
                .iter()
                .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string());
    let text = text.trim();

    let plain = !text.is_empty()
        && text.chars().count() <= MAX_PASSTHROUGH_LEN
        && !text.contains('\n')
        && !text.starts_with(['{', '[', '<']);
    plain.then(|| text.to_string())
}

/// Error surfaced by state components and services.
///
/// Carries only the category and the user-facing message; the underlying
/// transport error is logged, never exposed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct StoreError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StoreError {
    /// Local rejection for operations that need a session.
    #[must_use]
    pub fn not_logged_in() -> Self {
        ApiError::NotAuthenticated.into()
    }

    /// Local rejection for invalid input.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::InvalidInput(message.into()).into()
    }
}

impl From<ApiError> for StoreError {
    fn from(err: ApiError) -> Self {
        let kind = err.kind();

        // Capture server faults and unexpected failures to Sentry
        if matches!(kind, ErrorKind::Server | ErrorKind::Unknown) {
            let event_id = sentry::capture_error(&err);
            tracing::error!(
                error = %err,
                sentry_event_id = %event_id,
                "Backend request failed"
            );
        } else {
            tracing::debug!(error = %err, kind = ?kind, "Backend request rejected");
        }

        Self {
            kind,
            message: err.user_message(),
        }
    }
}

/// Result type alias for `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Set the Sentry user context from the session subject.
///
/// Call this after a successful login so errors are associated with users.
pub fn set_sentry_user(subject: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(subject.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "5")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
