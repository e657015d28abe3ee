use thiserror::Error;

/// Shown in the transcript when a chat request never produced a usable reply
pub const CONNECTIVITY_FAILURE: &str =
    "Connection error: the patient could not be reached. Please try again.";

/// Shown on the auth screen when login/register could not reach the server
pub const AUTH_CONNECTION_ERROR: &str = "Connection error";

/// Outcome classes of a backend interaction
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Rejected locally before any request was made
    #[error("{0}")]
    Validation(String),

    /// The server answered and reported an application error
    #[error("{0}")]
    Rejected(String),

    /// No usable response: unreachable, timeout, non-2xx or malformed body
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        ClientError::Transport(err.to_string())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::transport(err)
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
