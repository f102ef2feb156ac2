// Error types for the queue client
//
// Every remote call maps its failure onto this taxonomy so the synchronizer can
// decide between escalation (auth) and a displayed message (everything else).

use thiserror::Error;

/// Result type alias for queue client operations
pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors that can occur while talking to the queue backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Transport failure, no response received
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response not covered by a more specific variant
    #[error("Server error ({status}): {}", message.as_deref().unwrap_or("no message"))]
    Server {
        status: u16,
        message: Option<String>,
    },

    /// Missing or rejected credential
    #[error("Not authorized: {0}")]
    Auth(String),

    /// Malformed submission or a payload that does not match the schema
    #[error("Validation error: {0}")]
    Validation(String),

    /// A stale token id was referenced
    #[error("Not found: {}", message.as_deref().unwrap_or("resource does not exist"))]
    NotFound { message: Option<String> },

    /// Local credential persistence failed
    #[error("Credential store error: {0}")]
    CredentialStore(String),

    /// Command sent to a view that has been unmounted
    #[error("View is no longer mounted")]
    ViewClosed,
}

impl QueueError {
    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        QueueError::Network(msg.into())
    }

    /// Create a server error
    pub fn server(status: u16, message: Option<String>) -> Self {
        QueueError::Server { status, message }
    }

    /// Create an auth error
    pub fn auth(msg: impl Into<String>) -> Self {
        QueueError::Auth(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        QueueError::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(message: Option<String>) -> Self {
        QueueError::NotFound { message }
    }

    /// Create a credential store error
    pub fn credential_store(msg: impl Into<String>) -> Self {
        QueueError::CredentialStore(msg.into())
    }

    /// Map an HTTP status and optional server message onto the taxonomy.
    ///
    /// Only meaningful for non-success statuses.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            401 | 403 => QueueError::Auth(message.unwrap_or_else(|| "credential rejected".into())),
            404 => QueueError::NotFound { message },
            400 | 422 => {
                QueueError::Validation(message.unwrap_or_else(|| "request rejected".into()))
            }
            _ => QueueError::Server { status, message },
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, QueueError::Auth(_))
    }

    /// Text to show a user, preferring what the server said over `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            QueueError::Server {
                message: Some(m), ..
            }
            | QueueError::NotFound { message: Some(m) } => m.clone(),
            QueueError::Validation(m) => m.clone(),
            _ => fallback.to_string(),
        }
    }
}
