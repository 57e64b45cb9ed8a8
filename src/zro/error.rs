use super::config::InvalidConfig;
use super::transport::TransportError;
use crate::{ASCOMError, ASCOMErrorCode};
use std::time::Duration;
use thiserror::Error;

/// Failure of a dome operation.
#[derive(Debug, Error)]
pub enum Error {
    /// The message transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The controller answered with a NACK.
    #[error("controller rejected command {0}")]
    CommandRejected(char),
    /// The controller answered a different command than the one in flight.
    #[error("expected a response to command {expected}, got one for {actual}")]
    ProtocolMismatch {
        /// Code of the command in flight.
        expected: char,
        /// Code echoed by the response.
        actual: char,
    },
    /// No response arrived in time.
    #[error("no response to command {code} within {timeout:?}")]
    Timeout {
        /// Code of the command in flight.
        code: char,
        /// How long we waited.
        timeout: Duration,
    },
    /// The dome is not connected.
    #[error("dome is not connected")]
    NotConnected,
    /// The dome has no shutter controller configured.
    #[error("shutter control is disabled in the dome configuration")]
    ShutterDisabled,
    /// An argument is out of range.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// The stored configuration can't be used.
    #[error(transparent)]
    InvalidConfig(#[from] InvalidConfig),
    /// The configuration store failed.
    #[error("configuration store failed: {0:#}")]
    Store(eyre::Report),
    /// A step of the connect sequence failed.
    #[error("{step} failed: {source}")]
    Handshake {
        /// Which step.
        step: String,
        /// Why.
        #[source]
        source: Box<Self>,
    },
}

impl Error {
    pub(crate) fn handshake(step: impl Into<String>, source: Self) -> Self {
        Self::Handshake {
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// ASCOM error number this error is reported with.
    pub fn ascom_code(&self) -> ASCOMErrorCode {
        match self {
            Self::NotConnected => ASCOMErrorCode::NOT_CONNECTED,
            Self::ShutterDisabled => ASCOMErrorCode::NOT_IMPLEMENTED,
            Self::InvalidValue(_) => ASCOMErrorCode::INVALID_VALUE,
            Self::CommandRejected(_) => ASCOMErrorCode::new_for_driver(0),
            Self::Timeout { .. } => ASCOMErrorCode::new_for_driver(1),
            Self::ProtocolMismatch { .. } => ASCOMErrorCode::new_for_driver(2),
            Self::Transport(_) => ASCOMErrorCode::new_for_driver(3),
            Self::InvalidConfig(_) => ASCOMErrorCode::new_for_driver(4),
            Self::Store(_) => ASCOMErrorCode::UNSPECIFIED,
            Self::Handshake { source, .. } => source.ascom_code(),
        }
    }
}

impl From<Error> for ASCOMError {
    fn from(error: Error) -> Self {
        Self::new(error.ascom_code(), error)
    }
}
