use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{site} login failed: invalid credentials or account blocked")]
    LoginFailure { site: &'static str },
    #[error("Session expired")]
    SessionExpired,
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("Could not parse page: {0}")]
    Parse(String),
    #[error("Add to cart failed: {0}")]
    CartFailure(String),
    #[error("Failed to enter edit mode")]
    EditModeTransition,
    #[error("Invalid site url: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    Network(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    pub(crate) fn parse(msg: impl Into<String>) -> Self {
        ClientError::Parse(msg.into())
    }
}
