pub mod constants;

use std::fmt;
use std::sync::PoisonError;

/// Crate-wide error type.
///
/// Recoverable conditions (an iterator running off the end of a page, a read
/// beyond EOF, a lock request that loses a Wait-Die race) are reported
/// through `bool`/`Option` return values, not through this enum. `Error` is
/// reserved for I/O failures and malformed input; programmer errors panic.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// OS-level file create/read/write failure.
    Io(String),
    /// Malformed statement, unknown table/field, bad literal.
    InvalidInput(String),
    /// Corrupt or inconsistent stored data.
    InvalidData(String),
    /// A file or page could not be created.
    CreationError,
    /// Every buffer frame is pinned; the caller must release pins and retry.
    BufferPoolExhausted,
    OutOfBounds,
    LockPoisoned,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(msg) => write!(f, "io error: {msg}"),
            Error::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::CreationError => write!(f, "creation failed"),
            Error::BufferPoolExhausted => write!(f, "buffer pool exhausted"),
            Error::OutOfBounds => write!(f, "out of bounds"),
            Error::LockPoisoned => write!(f, "lock poisoned"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<Error> for Result<T> {
    fn from(error: Error) -> Self {
        Err(error)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_err: PoisonError<T>) -> Self {
        Error::LockPoisoned
    }
}

impl From<::config::ConfigError> for Error {
    fn from(err: ::config::ConfigError) -> Self {
        Error::InvalidData(err.to_string())
    }
}

/// Constructs an `Err(Error::InvalidInput)` from a format string.
#[macro_export]
macro_rules! errinput {
    ($($args:tt)*) => {
        ::std::result::Result::Err($crate::common::Error::InvalidInput(format!($($args)*)))
    };
}
