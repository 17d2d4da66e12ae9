use thiserror::Error;

use crate::core::catalog::CatalogError;
use crate::core::realtime::RealtimeError;

/// Errors that end a relay session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Receiving from or sending to the client failed
    #[error("Client transport error: {0}")]
    ClientTransport(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] RealtimeError),

    /// The referenced recipe or plan does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// The caller cancelled the session
    #[error("Session cancelled")]
    Cancelled,

    /// A relay task panicked or was aborted
    #[error("Relay task failed: {0}")]
    TaskFailed(String),
}

impl SessionError {
    /// Stable code reported to the client in the `error` frame.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::ClientTransport(_) => "client_transport_error",
            SessionError::Upstream(_) => "upstream_error",
            SessionError::NotFound(_) => "not_found",
            SessionError::InvalidRequest(_) => "invalid_request",
            SessionError::Catalog(_) => "catalog_error",
            SessionError::Cancelled => "cancelled",
            SessionError::TaskFailed(_) => "internal_error",
        }
    }
}

impl From<tokio::task::JoinError> for SessionError {
    fn from(e: tokio::task::JoinError) -> Self {
        SessionError::TaskFailed(e.to_string())
    }
}
