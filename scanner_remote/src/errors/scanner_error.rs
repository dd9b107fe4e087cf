use thiserror::Error;

/// Coarse classification used to decide how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal to the session; the core stays disabled for the process lifetime.
    Configuration,
    /// Recoverable by reconnecting after the configured delay.
    Transport,
    /// The offending inbound message is dropped and prior state kept.
    Protocol,
    /// Reported to observability only.
    SideAction,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScannerError {
    #[error("invalid identity {0:?}: expected 4-6 ASCII alphanumeric characters")]
    InvalidIdentity(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("not connected")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed message: {0}")]
    Protocol(String),
    #[error("malformed state snapshot: {0}")]
    MalformedSnapshot(String),
    #[error("reset request failed: {0}")]
    Reset(String),
}

impl ScannerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScannerError::InvalidIdentity(_) | ScannerError::Config(_) => ErrorKind::Configuration,
            ScannerError::NotConnected | ScannerError::Transport(_) => ErrorKind::Transport,
            ScannerError::Protocol(_) | ScannerError::MalformedSnapshot(_) => ErrorKind::Protocol,
            ScannerError::Reset(_) => ErrorKind::SideAction,
        }
    }
}

impl From<url::ParseError> for ScannerError {
    fn from(e: url::ParseError) -> Self {
        ScannerError::Config(format!("bad url: {}", e))
    }
}

impl From<reqwest::Error> for ScannerError {
    fn from(e: reqwest::Error) -> Self {
        ScannerError::Reset(e.to_string())
    }
}
