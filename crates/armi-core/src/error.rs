use std::fmt;

use thiserror::Error as ThisError;

/// Named failure modes of the dispatch engine, shared by client and server contexts.
///
/// Each variant carries a stable wire value so it can cross a process boundary inside
/// the `armi` error category (see [`crate::category`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    Ok,
    NoEventLoop,
    ChannelNotConnected,
    InvalidChannelId,
    NoTargetProvided,
    UncaughtServerException,
    ExceptionThrownByReplyHandler,
    ExceptionThrownByMethodStub,
    InvalidMethodId,
    InvalidInterfaceId,
    InvalidArgumentCount,
    InvalidArgumentType,
    InvalidErrorCategory,
    ContextClosed,
    ChannelClosed,
    TransportClosed,
    TimedOut,
}

impl ErrorKind {
    /// Stable numeric value within the `armi` error category.
    pub fn wire_value(self) -> u32 {
        match self {
            ErrorKind::Ok => 0,
            ErrorKind::NoEventLoop => 1,
            ErrorKind::ChannelNotConnected => 2,
            ErrorKind::InvalidChannelId => 3,
            ErrorKind::NoTargetProvided => 4,
            ErrorKind::UncaughtServerException => 5,
            ErrorKind::ExceptionThrownByReplyHandler => 6,
            ErrorKind::ExceptionThrownByMethodStub => 7,
            ErrorKind::InvalidMethodId => 8,
            ErrorKind::InvalidInterfaceId => 9,
            ErrorKind::InvalidArgumentCount => 10,
            ErrorKind::InvalidArgumentType => 11,
            ErrorKind::InvalidErrorCategory => 12,
            ErrorKind::ContextClosed => 13,
            ErrorKind::ChannelClosed => 14,
            ErrorKind::TransportClosed => 15,
            ErrorKind::TimedOut => 16,
        }
    }

    pub fn from_wire_value(value: u32) -> Option<Self> {
        Some(match value {
            0 => ErrorKind::Ok,
            1 => ErrorKind::NoEventLoop,
            2 => ErrorKind::ChannelNotConnected,
            3 => ErrorKind::InvalidChannelId,
            4 => ErrorKind::NoTargetProvided,
            5 => ErrorKind::UncaughtServerException,
            6 => ErrorKind::ExceptionThrownByReplyHandler,
            7 => ErrorKind::ExceptionThrownByMethodStub,
            8 => ErrorKind::InvalidMethodId,
            9 => ErrorKind::InvalidInterfaceId,
            10 => ErrorKind::InvalidArgumentCount,
            11 => ErrorKind::InvalidArgumentType,
            12 => ErrorKind::InvalidErrorCategory,
            13 => ErrorKind::ContextClosed,
            14 => ErrorKind::ChannelClosed,
            15 => ErrorKind::TransportClosed,
            16 => ErrorKind::TimedOut,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Ok => "ok",
            ErrorKind::NoEventLoop => "no_event_loop",
            ErrorKind::ChannelNotConnected => "channel_not_connected",
            ErrorKind::InvalidChannelId => "invalid_channel_id",
            ErrorKind::NoTargetProvided => "no_target_provided",
            ErrorKind::UncaughtServerException => "uncaught_server_exception",
            ErrorKind::ExceptionThrownByReplyHandler => "exception_thrown_by_reply_handler",
            ErrorKind::ExceptionThrownByMethodStub => "exception_thrown_by_method_stub",
            ErrorKind::InvalidMethodId => "invalid_method_id",
            ErrorKind::InvalidInterfaceId => "invalid_interface_id",
            ErrorKind::InvalidArgumentCount => "invalid_argument_count",
            ErrorKind::InvalidArgumentType => "invalid_argument_type",
            ErrorKind::InvalidErrorCategory => "invalid_error_category",
            ErrorKind::ContextClosed => "context_closed",
            ErrorKind::ChannelClosed => "channel_closed",
            ErrorKind::TransportClosed => "transport_closed",
            ErrorKind::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type shared by every component in the dispatch engine.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A failure local to this process, carrying one of the named [`ErrorKind`]s.
    #[error("{kind}: {message}")]
    Local { kind: ErrorKind, message: String },

    /// A failure reported by the remote peer, not resolvable to a known category.
    #[error("remote error (category {category}, code {code}): {message}")]
    Remote {
        category: u32,
        code: u32,
        message: String,
    },

    /// A malformed frame or an encode/decode failure raised by the wire codec.
    #[error("codec error: {0}")]
    Codec(String),

    /// The transport reported an I/O failure while reading or writing a channel.
    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Error::Local {
            kind,
            message: kind.as_str().to_string(),
        }
    }

    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error::Local {
            kind,
            message: message.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Error::Codec(message.into())
    }

    /// The local [`ErrorKind`], if this error originated in this process.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Local { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Error::Local { kind, message } => Error::Local {
                kind: *kind,
                message: message.clone(),
            },
            Error::Remote {
                category,
                code,
                message,
            } => Error::Remote {
                category: *category,
                code: *code,
                message: message.clone(),
            },
            Error::Codec(m) => Error::Codec(m.clone()),
            Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), e.to_string())),
        }
    }
}
