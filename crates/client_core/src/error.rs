use shared::error::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server rejected request ({status}): {}", error.message)]
    Api { status: u16, error: ApiError },
    #[error("no game in progress")]
    NoSession,
}

impl ClientError {
    /// Server-side message for rejected requests, if any.
    pub fn api_message(&self) -> Option<&str> {
        match self {
            Self::Api { error, .. } => Some(error.message.as_str()),
            _ => None,
        }
    }
}
