//! `cassia` error types.
use std::{backtrace::Backtrace, fmt, io};

use crate::{message::response::error::ServerError, options::ParseError};

/// A specialized [`Result`] type for `cassia` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible errors from the `cassia` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub(crate) fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// All possible error kinds from the `cassia` library.
#[derive(thiserror::Error, Debug)]
pub enum ErrorKind {
    /// A value could not be encoded into its wire representation.
    #[error("failed to encode value for field `{0}`")]
    Encode(&'static str),
    /// A value could not be decoded from its wire representation.
    #[error("failed to decode value: {0}")]
    Decode(String),
    /// Fewer bytes were available than the frame/message declared.
    #[error("truncated frame: expected {expected} more bytes, got {got}")]
    TruncatedFrame { expected: usize, got: usize },
    /// A frame body exceeded the configured maximum length.
    #[error("frame body of {len} bytes exceeds the configured maximum of {max}")]
    OversizedFrame { len: usize, max: usize },
    /// The peer sent a well-formed but unexpected/illegal message for the current state.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// A request was not answered before its deadline.
    #[error("request timed out")]
    Timeout,
    /// The stream-id pool was exhausted and the caller asked to fail fast instead of waiting.
    #[error("no free stream ids available")]
    QueueFull,
    /// The connection has already been closed or has poisoned itself after a decode error.
    #[error("connection closed")]
    ConnectionClosed,
    /// Authentication with the server failed or was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// An authenticator class was requested that this driver does not implement.
    #[error("unsupported authenticator: {0}")]
    UnsupportedAuthenticator(String),
    /// The server responded with a structured CQL error.
    #[error(transparent)]
    Server(#[from] ServerError),
    /// Connection configuration could not be parsed.
    #[error(transparent)]
    Config(#[from] ParseError),
    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// Malformed UTF-8 in a `[string]`/`[long string]` field.
    #[error(transparent)]
    Utf8(#[from] std::str::Utf8Error),
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self {
            context: String::new(),
            backtrace: Backtrace::capture(),
            kind,
        }
    }
}

macro_rules! from {
    ($ty:ty) => {
        impl From<$ty> for Error {
            fn from(e: $ty) -> Self {
                ErrorKind::from(e).into()
            }
        }
    };
}

from!(ServerError);
from!(ParseError);
from!(io::Error);
from!(std::str::Utf8Error);

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }
        fmt::Display::fmt(&self.kind, f)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
