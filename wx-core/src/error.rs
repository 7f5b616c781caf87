//! Error taxonomy shared by the fetch client, the location layer and the
//! coordinator.
//!
//! Every type here is `Clone`: a single cycle outcome is handed to every
//! caller that joined the cycle and to every completion subscriber.

use thiserror::Error;

use crate::model::RequestKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location permission denied")]
    Denied,
    #[error("timed out waiting for a usable position fix")]
    Timeout,
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("weather service unreachable: {0}")]
    Unreachable(String),
    #[error("weather service request timed out")]
    Timeout,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("weather service returned status {status}: {message}")]
    Service { status: u16, message: String },
    #[error("malformed weather response: {reason}")]
    Decode { reason: String },
}

impl FetchError {
    pub fn decode(reason: impl Into<String>) -> Self {
        FetchError::Decode { reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error("{stage} request failed: {source}")]
    Fetch {
        stage: RequestKind,
        #[source]
        source: FetchError,
    },
    #[error("a refresh is already in progress")]
    Busy,
    #[error("refresh cancelled")]
    Cancelled,
    /// The cycle task panicked before reaching an outcome.
    #[error("refresh aborted unexpectedly")]
    Aborted,
}

impl RefreshError {
    /// The fetch that failed, if the cycle got past position acquisition.
    pub fn failed_request(&self) -> Option<RequestKind> {
        match self {
            RefreshError::Fetch { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
