use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;

use crate::common::{atomic, Atomic};

/// Error kinds for quarry operations.
///
/// Each kind names one category of failure so callers can decide how to
/// recover without parsing messages.
///
/// # Examples
///
/// ```rust,ignore
/// use quarry::errors::{QuarryError, ErrorKind, QuarryResult};
///
/// fn example() -> QuarryResult<()> {
///     Err(QuarryError::new("Store unreachable", ErrorKind::ConnectionError))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// The store could not be reached, or a database/collection could not be selected
    ConnectionError,
    /// A direct data operation (such as dropping a collection) failed
    DataError,
    /// A create or update was not acknowledged by the store
    PersistenceError,
    /// A map-reduce command returned an error status
    AggregationError,
    /// A stored reference points at a document that does not exist
    ReferenceResolutionError,

    /// The value cannot be used as a document identity
    InvalidId,
    /// The value has the wrong type for the field it is written to
    InvalidDataType,
    /// The operation is not valid in the current state
    InvalidOperation,
    /// The query or command document is malformed
    InvalidQuery,

    /// The round trip did not complete before the configured deadline
    Timeout,
    /// The connection was cancelled while the round trip was pending
    Cancelled,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ConnectionError => write!(f, "Connection error"),
            ErrorKind::DataError => write!(f, "Data error"),
            ErrorKind::PersistenceError => write!(f, "Persistence error"),
            ErrorKind::AggregationError => write!(f, "Aggregation error"),
            ErrorKind::ReferenceResolutionError => write!(f, "Reference resolution error"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::InvalidDataType => write!(f, "Invalid data type"),
            ErrorKind::InvalidOperation => write!(f, "Invalid operation"),
            ErrorKind::InvalidQuery => write!(f, "Invalid query"),
            ErrorKind::Timeout => write!(f, "Timeout"),
            ErrorKind::Cancelled => write!(f, "Cancelled"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// The error type of every fallible quarry operation.
///
/// `QuarryError` carries a message, an [ErrorKind], an optional cause and
/// the backtrace captured where it was raised. The backtrace is resolved
/// lazily, the first time the error is debug-printed.
///
/// # Examples
///
/// ```rust,ignore
/// use quarry::errors::{QuarryError, ErrorKind};
///
/// let cause = QuarryError::new("connection refused", ErrorKind::ConnectionError);
/// let err = QuarryError::new_with_cause("Could not save post", ErrorKind::PersistenceError, cause);
/// ```
#[derive(Clone)]
pub struct QuarryError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<QuarryError>>,
    backtrace: Atomic<Backtrace>,
}

impl QuarryError {
    /// Creates a new `QuarryError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        QuarryError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    /// Creates a new `QuarryError` that wraps the error which caused it.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: QuarryError) -> Self {
        QuarryError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: atomic(Backtrace::new_unresolved()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&QuarryError> {
        self.cause.as_deref()
    }
}

impl Display for QuarryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for QuarryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}\nCaused by: {:?}", self.error_kind, self.message, cause),
            None => {
                let mut backtrace = self.backtrace.write();
                backtrace.resolve();
                write!(f, "{}: {}\n{:?}", self.error_kind, self.message, *backtrace)
            }
        }
    }
}

impl Error for QuarryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Shorthand for `Result<T, QuarryError>`.
pub type QuarryResult<T> = Result<T, QuarryError>;

impl From<regex::Error> for QuarryError {
    fn from(err: regex::Error) -> Self {
        QuarryError::new(&format!("Invalid regular expression: {}", err), ErrorKind::InvalidQuery)
    }
}

impl From<std::num::ParseIntError> for QuarryError {
    fn from(err: std::num::ParseIntError) -> Self {
        QuarryError::new(
            &format!("Integer parsing error: {}", err),
            ErrorKind::InvalidDataType,
        )
    }
}

impl From<String> for QuarryError {
    fn from(msg: String) -> Self {
        QuarryError::new(&msg, ErrorKind::InternalError)
    }
}

impl From<&str> for QuarryError {
    fn from(msg: &str) -> Self {
        QuarryError::new(msg, ErrorKind::InternalError)
    }
}
