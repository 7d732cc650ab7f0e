use thiserror::Error;

/// Failures from the two hosted backends.
///
/// None of these end a session: the chat loop turns them into notices.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} API key is not configured")]
    MissingCredential(&'static str),
    #[error("{service} returned {status}: {body}")]
    Http {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{service} did not respond in time")]
    Timeout { service: &'static str },
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0} returned an empty response")]
    EmptyResponse(&'static str),
    #[error("voice not found: {0}")]
    UnknownVoice(String),
    #[error("no voice selected")]
    NoVoiceSelected,
}

impl Error {
    /// Classify a reqwest error, separating timeouts from other transport failures.
    pub(crate) fn from_reqwest(service: &'static str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout { service }
        } else {
            Error::Transport(e)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
