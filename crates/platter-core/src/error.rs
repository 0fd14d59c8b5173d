use std::{fmt, io};

/// Convenience result alias used across the workspace.
pub type Result<T> = std::result::Result<T, ErrorKind>;

/// Errors that can occur in the channel, transports, and codecs.
#[derive(Debug)]
pub enum ErrorKind {
    /// A failure on the underlying datagram socket.
    IOError(io::Error),
    /// A payload failed to decode at the application layer.
    DecodingError(DecodingErrorKind),
    /// A message exceeded a configured bound and could not be accepted.
    MessageTooLarge {
        /// Length of the rejected message.
        len: usize,
        /// The applicable limit.
        max: usize,
    },
}

/// Which application-layer form failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodingErrorKind {
    /// An `ORDER` line was malformed.
    Order,
    /// A `REPLY` line was malformed.
    Reply,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::IOError(e) => write!(f, "socket error: {}", e),
            ErrorKind::DecodingError(DecodingErrorKind::Order) => {
                write!(f, "malformed ORDER line")
            }
            ErrorKind::DecodingError(DecodingErrorKind::Reply) => {
                write!(f, "malformed REPLY line")
            }
            ErrorKind::MessageTooLarge { len, max } => {
                write!(f, "message of {} bytes exceeds the {} byte limit", len, max)
            }
        }
    }
}

impl std::error::Error for ErrorKind {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ErrorKind::IOError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ErrorKind {
    fn from(e: io::Error) -> Self {
        ErrorKind::IOError(e)
    }
}
