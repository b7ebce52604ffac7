//! A `serde`-driven binary archive built on `bincode`. The frame envelope still uses fixed-
//! width big-endian fields (so both codecs agree on how a reader tells a request from a
//! reply before any application value is touched); only the application payload and the
//! error triple go through `bincode`.

use armi::error::Error;
use armi::types::{ReplyHeader, ReplyKind, RequestHeader};
use armi::wire::{FrameCodec, ValueCodec};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveCodec;

impl FrameCodec for ArchiveCodec {
    fn encode_request_header(&self, header: &RequestHeader) -> Vec<u8> {
        let mut out = Vec::with_capacity(20);
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
        let mut out = Vec::with_capacity(13);
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

#[derive(Serialize, serde::Deserialize)]
struct ErrorTriple {
    category: u32,
    code: u32,
    message: String,
}

impl ValueCodec for ArchiveCodec {
    fn encode_value<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, Error> {
        bincode::serialize(value).map_err(|e| Error::codec(e.to_string()))
    }

    fn decode_value<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, Error> {
        bincode::deserialize(bytes).map_err(|e| Error::codec(e.to_string()))
    }

    fn encode_error(&self, category: u32, code: u32, message: &str) -> Vec<u8> {
        bincode::serialize(&ErrorTriple {
            category,
            code,
            message: message.to_string(),
        })
        .expect("error triple is always serializable")
    }

    fn decode_error(&self, bytes: &[u8]) -> Result<(u32, u32, String), Error> {
        let triple: ErrorTriple =
            bincode::deserialize(bytes).map_err(|e| Error::codec(e.to_string()))?;
        Ok((triple.category, triple.code, triple.message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct CounterSnapshot {
        value: i64,
        generation: u32,
    }

    #[test]
    fn round_trips_a_struct() {
        let codec = ArchiveCodec;
        let value = CounterSnapshot {
            value: -12,
            generation: 9,
        };
        let bytes = codec.encode_value(&value).unwrap();
        let decoded: CounterSnapshot = codec.decode_value(&bytes).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn error_triple_round_trips() {
        let codec = ArchiveCodec;
        let bytes = codec.encode_error(1, 10, "invalid_argument_count");
        let (category, code, message) = codec.decode_error(&bytes).unwrap();
        assert_eq!(category, 1);
        assert_eq!(code, 10);
        assert_eq!(message, "invalid_argument_count");
    }

    #[test]
    fn reply_header_round_trips() {
        let codec = ArchiveCodec;
        let header = ReplyHeader {
            request_id: 7,
            reply_kind: ReplyKind::Fail,
            count: 1,
        };
        let bytes = codec.encode_reply_header(&header);
        let (decoded, rest) = codec.decode_reply_header(&bytes).unwrap();
        assert_eq!(decoded.request_id, 7);
        assert_eq!(decoded.reply_kind, ReplyKind::Fail);
        assert!(rest.is_empty());
    }
}
