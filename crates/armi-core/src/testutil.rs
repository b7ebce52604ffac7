//! Minimal collaborators for exercising the dispatch engine without a real codec or
//! transport. Used by this crate's own integration tests and, via a dev-dependency, by the
//! other `armi-*` crates' test suites.

use std::sync::{Arc, Mutex};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, ErrorKind};
use crate::transport::ChannelWriter;
use crate::types::{ReplyHeader, ReplyKind, RequestHeader};
use crate::wire::{FrameCodec, ValueCodec};

/// A tiny big-endian-length-prefixed codec: enough to exercise the dispatch engine's
/// envelope handling without depending on `armi-codec`. Values are JSON so the tests can use
/// ordinary structs without hand-rolling a binary format.
#[derive(Debug, Default)]
pub struct JsonTestCodec;

impl FrameCodec for JsonTestCodec {
    fn encode_request_header(&self, header: &RequestHeader) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&header.request_id.to_be_bytes());
        out.extend_from_slice(&header.interface_id.to_be_bytes());
        out.extend_from_slice(&header.method_id.to_be_bytes());
        out.extend_from_slice(&header.arg_count.to_be_bytes());
        out
    }

    fn decode_request_header<'a>(
        &self,
        bytes: &'a [u8],
    ) -> Result<(RequestHeader, &'a [u8]), Error> {
        if bytes.len() < 20 {
            return Err(Error::codec("request frame too short"));
        }
        let request_id = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
        let interface_id = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
        let method_id = u32::from_be_bytes(bytes[12..16].try_into().unwrap());
        let arg_count = u32::from_be_bytes(bytes[16..20].try_into().unwrap());
        Ok((
            RequestHeader {
                request_id,
                interface_id,
                method_id,
                arg_count,
            },
            &bytes[20..],
        ))
    }

    fn encode_reply_header(&self, header: &ReplyHeader) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&header.request_id.to_be_bytes());
        out.push(header.reply_kind.tag());
        out.extend_from_slice(&header.count.to_be_bytes());
        out
    }

    fn decode_reply_header<'a>(&self, bytes: &'a [u8]) -> Result<(ReplyHeader, &'a [u8]), Error> {
        if bytes.len() < 13 {
            return Err(Error::codec("reply frame too short"));
        }
        let request_id = u64::from_be_bytes(bytes[0..8].try_into().unwrap());
        let reply_kind = ReplyKind::from_tag(bytes[8])?;
        let count = u32::from_be_bytes(bytes[9..13].try_into().unwrap());
        Ok((
            ReplyHeader {
                request_id,
                reply_kind,
                count,
            },
            &bytes[13..],
        ))
    }
}

impl ValueCodec for JsonTestCodec {
    fn encode_value<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(value).map_err(|e| Error::codec(e.to_string()))
    }

    fn decode_value<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, Error> {
        serde_json::from_slice(bytes).map_err(|e| Error::codec(e.to_string()))
    }

    fn encode_error(&self, category: u32, code: u32, message: &str) -> Vec<u8> {
        serde_json::json!({ "category": category, "code": code, "message": message })
            .to_string()
            .into_bytes()
    }

    fn decode_error(&self, bytes: &[u8]) -> Result<(u32, u32, String), Error> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| Error::codec(e.to_string()))?;
        let category = value["category"]
            .as_u64()
            .ok_or_else(|| Error::new(ErrorKind::InvalidArgumentType))? as u32;
        let code = value["code"]
            .as_u64()
            .ok_or_else(|| Error::new(ErrorKind::InvalidArgumentType))? as u32;
        let message = value["message"].as_str().unwrap_or_default().to_string();
        Ok((category, code, message))
    }
}

/// A channel writer that hands every frame it's given to a closure, e.g. to deliver it
/// straight into the peer context's `handle_reply`/`handle_request` in a same-process test.
pub struct LoopbackWriter<F: Fn(Vec<u8>) -> Result<(), Error> + Send + Sync> {
    on_send: F,
}

impl<F: Fn(Vec<u8>) -> Result<(), Error> + Send + Sync> LoopbackWriter<F> {
    pub fn new(on_send: F) -> Self {
        Self { on_send }
    }
}

impl<F: Fn(Vec<u8>) -> Result<(), Error> + Send + Sync> ChannelWriter for LoopbackWriter<F> {
    fn send(&self, frame: Vec<u8>) -> Result<(), Error> {
        (self.on_send)(frame)
    }
}

/// A writer that records every frame and never delivers it, for cancellation/timeout tests.
#[derive(Default, Clone)]
pub struct RecordingWriter {
    pub frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ChannelWriter for RecordingWriter {
    fn send(&self, frame: Vec<u8>) -> Result<(), Error> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }
}

/// A writer whose `send` always fails, simulating a dead transport.
pub struct FailingWriter;

impl ChannelWriter for FailingWriter {
    fn send(&self, _frame: Vec<u8>) -> Result<(), Error> {
        Err(Error::new(ErrorKind::TransportClosed))
    }
}
