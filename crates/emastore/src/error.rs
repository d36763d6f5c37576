//! Error types for emastore

use std::fmt;
use std::io;

/// Result type alias for emastore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for key-value store operations
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(io::Error),

    /// Log file is malformed
    Parse(String),

    /// Write would push the live size past the quota
    QuotaExceeded {
        /// Live size (in characters) the write would have produced
        needed: usize,
        /// Configured quota (in characters)
        quota: usize,
    },

    /// Storage is disabled or could not be opened
    Unavailable,

    /// Store has been closed
    Closed,
}

impl Error {
    /// True when the failure is attributable to storage exhaustion
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Error::QuotaExceeded { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::QuotaExceeded { needed, quota } => {
                write!(f, "Quota exceeded: {} chars needed (quota {})", needed, quota)
            }
            Error::Unavailable => write!(f, "Storage unavailable"),
            Error::Closed => write!(f, "Store is closed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        Error::Parse(format!("{:?}", err))
    }
}
