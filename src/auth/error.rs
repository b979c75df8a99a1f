use thiserror::Error;

/// Failure taxonomy for backend calls. `AuthExpired` means the token store
/// has been cleared and the application must drop to the login state.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session expired, please sign in again")]
    AuthExpired,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Transport errors split into `Timeout` and `Network`; everything that
    /// produced a response goes through status triage instead.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
