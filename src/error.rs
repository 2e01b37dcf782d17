use thiserror::Error;

/// Failure while relaying a single event. Never fatal: the caller logs it
/// and moves on to the next event.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Telegram request failed: {0}")]
    Telegram(String),

    #[error("Discord request failed: {0}")]
    Discord(String),

    #[error("Attachment download failed: {0}")]
    Download(#[from] reqwest::Error),

    #[error("No relayed counterpart recorded for message {0}")]
    MissingCorrespondence(u64),
}

impl From<teloxide::RequestError> for RelayError {
    fn from(err: teloxide::RequestError) -> Self {
        RelayError::Telegram(err.to_string())
    }
}

impl From<serenity::Error> for RelayError {
    fn from(err: serenity::Error) -> Self {
        RelayError::Discord(err.to_string())
    }
}
