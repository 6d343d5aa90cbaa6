//! Error types for the load-testing harness.
//!
//! The taxonomy mirrors how failures propagate through a test iteration:
//! auth failures and pre-handshake transport failures abort the iteration,
//! everything else degrades into the result object for the caller.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving a simulated client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Credentials rejected even after the register-then-login fallback.
    #[error("Authentication failed for {email}: {reason}")]
    AuthFailed {
        /// Email of the rejected identity.
        email: String,
        /// Server-provided rejection detail.
        reason: String,
    },

    /// Registration rejected for a reason other than "already exists".
    #[error("Registration rejected: {0}")]
    RegistrationRejected(String),

    /// An HTTP endpoint answered with a status outside its contract.
    #[error("Unexpected status {status} from {endpoint}")]
    UnexpectedStatus {
        /// Endpoint path, e.g. `/login`.
        endpoint: String,
        /// HTTP status code received.
        status: u16,
    },

    /// An HTTP body could not be decoded against the API envelope.
    #[error("Malformed response from {endpoint}: {detail}")]
    MalformedResponse {
        /// Endpoint path, e.g. `/login`.
        endpoint: String,
        /// Decode failure detail.
        detail: String,
    },

    /// HTTP transport failure (connection refused, DNS, reset).
    #[error("HTTP transport error: {0}")]
    Http(String),

    /// WebSocket transport failure before or during use.
    #[error("WebSocket transport error: {0}")]
    Transport(String),

    /// The gateway answered the upgrade with a non-101 status.
    #[error("Handshake rejected with status {0}")]
    HandshakeRejected(u16),

    /// The connect attempt exceeded its hard timeout.
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A session without a bearer token was used for WebSocket auth.
    #[error("Session holds no bearer token")]
    MissingToken,

    /// Endpoint URL could not be parsed or adjusted.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// An outbound action could not be serialized into a frame.
    #[error("Frame serialization failed: {0}")]
    Serialize(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Http(response) => Error::HandshakeRejected(response.status().as_u16()),
            other => Error::Transport(other.to_string()),
        }
    }
}

impl Error {
    /// Check whether this error aborts the whole iteration.
    ///
    /// Only auth failures and transport/handshake failures before the
    /// connection was established are fatal; everything else is surfaced
    /// through the interaction result instead of an error path.
    #[must_use]
    pub const fn is_fatal_for_iteration(&self) -> bool {
        matches!(
            self,
            Error::AuthFailed { .. }
                | Error::RegistrationRejected(_)
                | Error::UnexpectedStatus { .. }
                | Error::MalformedResponse { .. }
                | Error::Http(_)
                | Error::Transport(_)
                | Error::HandshakeRejected(_)
                | Error::ConnectTimeout(_)
                | Error::MissingToken
        )
    }
}
