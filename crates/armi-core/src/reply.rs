//! Helpers for building reply frames, shared by `ServerContext` and generated method stubs.

use serde::Serialize;

use crate::category::CategoryRegistry;
use crate::error::Error;
use crate::types::{ReplyHeader, ReplyKind, RequestId};
use crate::wire::Codec;

pub fn encode_normal_reply<C: Codec, V: Serialize>(
    codec: &C,
    request_id: RequestId,
    value: &V,
) -> Result<Vec<u8>, Error> {
    let payload = codec.encode_value(value)?;
    let header = ReplyHeader {
        request_id,
        reply_kind: ReplyKind::Normal,
        count: 1,
    };
    let mut frame = codec.encode_reply_header(&header);
    frame.extend(payload);
    Ok(frame)
}

pub fn encode_void_reply<C: Codec>(codec: &C, request_id: RequestId) -> Vec<u8> {
    let header = ReplyHeader {
        request_id,
        reply_kind: ReplyKind::Normal,
        count: 0,
    };
    codec.encode_reply_header(&header)
}

pub fn encode_fail_reply<C: Codec>(
    codec: &C,
    registry: &CategoryRegistry,
    request_id: RequestId,
    err: &Error,
) -> Vec<u8> {
    let (category, code) = registry.encode(err);
    let message = err.to_string();
    let payload = codec.encode_error(category, code, &message);
    let header = ReplyHeader {
        request_id,
        reply_kind: ReplyKind::Fail,
        count: 1,
    };
    let mut frame = codec.encode_reply_header(&header);
    frame.extend(payload);
    frame
}
