use crate::error::{Error, ErrorKind};

/// Client-local, strictly increasing identifier correlating a request with its reply.
pub type RequestId = u64;

/// Context-local identifier for a live transport connection. 0 is never a valid channel.
pub type ChannelId = u64;

pub const INVALID_CHANNEL_ID: ChannelId = 0;

/// Interface index in the server's stub table, assigned by the generator.
pub type InterfaceId = u32;

/// Method index within one interface's method table, assigned by the generator.
pub type MethodId = u32;

/// Tag distinguishing a value reply from a failure reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Normal,
    Fail,
}

impl ReplyKind {
    pub fn tag(self) -> u8 {
        match self {
            ReplyKind::Normal => 0,
            ReplyKind::Fail => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self, Error> {
        match tag {
            0 => Ok(ReplyKind::Normal),
            1 => Ok(ReplyKind::Fail),
            other => Err(Error::with_message(
                ErrorKind::InvalidArgumentType,
                format!("unknown reply_kind tag {other}"),
            )),
        }
    }
}

/// Envelope fields of a request frame, ahead of the raw (still encoded) argument bytes.
#[derive(Debug, Clone, Copy)]
pub struct RequestHeader {
    pub request_id: RequestId,
    pub interface_id: InterfaceId,
    pub method_id: MethodId,
    pub arg_count: u32,
}

/// Envelope fields of a reply frame, ahead of the raw (still encoded) payload bytes.
#[derive(Debug, Clone, Copy)]
pub struct ReplyHeader {
    pub request_id: RequestId,
    pub reply_kind: ReplyKind,
    pub count: u32,
}

/// A reply as seen by the client context: envelope decoded, payload still raw.
///
/// The payload is handed to the caller's codec to decode into the concrete return type
/// (normal replies) or into `(category, code, message)` (fail replies); the context itself
/// never needs to know the application's value types.
#[derive(Debug, Clone)]
pub struct RawReply {
    pub reply_kind: ReplyKind,
    pub payload: Vec<u8>,
}
