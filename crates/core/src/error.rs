//! Error taxonomy for the two update channels.

use thiserror::Error;

/// A failure on either update channel.
///
/// `Transport` covers connect/send/receive failures; `Decode` covers
/// malformed response bodies and unparseable frame payloads. Neither is
/// fatal to the process: the poller skips the tick and retries on the next
/// one, and the stream treats a bad frame as unrecognized.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChannelError::Decode(err.to_string())
        } else {
            ChannelError::Transport(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChannelError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChannelError::Transport(err.to_string())
    }
}
