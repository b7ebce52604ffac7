//! The wire codec contract: envelope framing split from application value encoding.
//!
//! `FrameCodec` encodes/decodes the envelope of a request or reply frame: the parts the
//! dispatch engine itself must be able to read in order to route a message (ids, the reply
//! tag, the argument/payload count). It never touches application value types, so it can be
//! stored behind a context without making the context generic over argument types.
//!
//! `ValueCodec` encodes/decodes the application payload: one argument, one return value, or
//! one `(category, code, message)` error triple. It is generic-friendly (used by generated
//! stubs/proxies) rather than object-safe.
//!
//! A concrete codec (see the `armi-codec` crate) implements both halves via [`Codec`].

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Error;
use crate::types::{ReplyHeader, RequestHeader};

pub trait FrameCodec: Send + Sync + 'static {
    fn encode_request_header(&self, header: &RequestHeader) -> Vec<u8>;

    /// Decodes the envelope and returns it along with the remaining (argument) bytes.
    fn decode_request_header<'a>(
        &self,
        bytes: &'a [u8],
    ) -> Result<(RequestHeader, &'a [u8]), Error>;

    fn encode_reply_header(&self, header: &ReplyHeader) -> Vec<u8>;

    fn decode_reply_header<'a>(&self, bytes: &'a [u8]) -> Result<(ReplyHeader, &'a [u8]), Error>;
}

pub trait ValueCodec: Send + Sync + 'static {
    fn encode_value<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, Error>;
    fn decode_value<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, Error>;

    fn encode_error(&self, category: u32, code: u32, message: &str) -> Vec<u8>;
    fn decode_error(&self, bytes: &[u8]) -> Result<(u32, u32, String), Error>;
}

/// A full codec: frame envelope plus application values. Implemented once per wire format.
pub trait Codec: FrameCodec + ValueCodec {}

impl<T: FrameCodec + ValueCodec> Codec for T {}
