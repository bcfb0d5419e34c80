//! Wire framing shared by every socket.
//!
//! A frame is the UTF-8 text `<identity>:<payload>` with no length prefix and no
//! escaping. Decoding splits on the first `:` only, so payloads may contain `:`
//! but identities may not. One read of at most [`MAX_FRAME_LEN`] bytes carries
//! exactly one frame.
//!
//! The payloads [`HELLO`] and [`ACK`] are reserved sentinels. They share the
//! payload field with ordinary chat text, so a user typing `HELLO` produces a
//! frame indistinguishable from a handshake.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::NetworkError;

pub const SEPARATOR: char = ':';
pub const HELLO: &str = "HELLO";
pub const ACK: &str = "ACK";
pub const MAX_FRAME_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub identity: String,
    pub payload: String,
}

impl Frame {
    pub fn new(identity: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            payload: payload.into(),
        }
    }

    pub fn hello(identity: impl Into<String>) -> Self {
        Self::new(identity, HELLO)
    }

    pub fn ack(identity: impl Into<String>) -> Self {
        Self::new(identity, ACK)
    }

    pub fn is_handshake(&self) -> bool {
        self.payload == HELLO
    }

    pub fn is_ack(&self) -> bool {
        self.payload == ACK
    }
}

pub fn encode(identity: &str, payload: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(identity.len() + 1 + payload.len());
    out.extend_from_slice(identity.as_bytes());
    out.push(SEPARATOR as u8);
    out.extend_from_slice(payload.as_bytes());
    out
}

pub fn decode(bytes: &[u8]) -> Result<Frame, NetworkError> {
    let text = std::str::from_utf8(bytes).map_err(|_| NetworkError::InvalidUtf8)?;
    let (identity, payload) = text
        .split_once(SEPARATOR)
        .ok_or(NetworkError::MalformedFrame)?;
    Ok(Frame::new(identity, payload))
}

/// `tokio_util` codec over the single-read framing.
///
/// Whatever bytes are buffered when `decode` runs form one frame, capped at
/// `max_len`; anything past the cap is discarded the same way a fixed-size
/// read buffer would drop it.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_len: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self { max_len }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = NetworkError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, NetworkError> {
        if src.is_empty() {
            return Ok(None);
        }
        let take = src.len().min(self.max_len);
        let chunk = src.split_to(take);
        src.clear();
        decode(&chunk).map(Some)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = NetworkError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), NetworkError> {
        let bytes = encode(&frame.identity, &frame.payload);
        if bytes.len() > self.max_len {
            return Err(NetworkError::FrameTooLarge {
                len: bytes.len(),
                max: self.max_len,
            });
        }
        dst.reserve(bytes.len());
        dst.put_slice(&bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_identity_and_payload() {
        assert_eq!(encode("Alice", "hi there"), b"Alice:hi there".to_vec());
        assert_eq!(encode("Bob", ""), b"Bob:".to_vec());
    }

    #[test]
    fn decode_splits_on_first_separator() {
        let frame = decode(b"Alice:see you at 10:30").unwrap();
        assert_eq!(frame.identity, "Alice");
        assert_eq!(frame.payload, "see you at 10:30");

        let frame = decode(&encode("Bob", "a:b:c")).unwrap();
        assert_eq!(frame, Frame::new("Bob", "a:b:c"));
    }

    #[test]
    fn decode_allows_empty_parts() {
        assert_eq!(decode(b"Bob:").unwrap(), Frame::new("Bob", ""));
        assert_eq!(decode(b":orphan").unwrap(), Frame::new("", "orphan"));
    }

    #[test]
    fn decode_rejects_missing_separator() {
        assert!(matches!(decode(b"no separator"), Err(NetworkError::MalformedFrame)));
        assert!(matches!(decode(b""), Err(NetworkError::MalformedFrame)));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        assert!(matches!(decode(&[0xff, b':', b'x']), Err(NetworkError::InvalidUtf8)));
    }

    #[test]
    fn sentinels_are_plain_payloads() {
        let hello = decode(&encode("Alice", HELLO)).unwrap();
        assert!(hello.is_handshake());
        assert!(!hello.is_ack());
        assert!(decode(b"Bob:ACK").unwrap().is_ack());
        assert_eq!(Frame::hello("x"), Frame::new("x", "HELLO"));
    }

    #[test]
    fn codec_takes_buffer_as_one_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"Alice:hello:world"[..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, Frame::new("Alice", "hello:world"));
        assert!(buf.is_empty());
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn codec_truncates_to_max_len() {
        let mut codec = FrameCodec::with_max_len(8);
        let mut buf = BytesMut::from(&b"Al:12345678"[..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.payload, "12345");
        assert!(buf.is_empty());
    }

    #[test]
    fn codec_refuses_oversized_outbound_frame() {
        let mut codec = FrameCodec::with_max_len(4);
        let mut dst = BytesMut::new();
        let err = codec.encode(Frame::new("Alice", "hi"), &mut dst).unwrap_err();
        assert!(matches!(err, NetworkError::FrameTooLarge { len: 8, max: 4 }));

        let mut codec = FrameCodec::new();
        codec.encode(Frame::ack("Bob"), &mut dst).unwrap();
        assert_eq!(&dst[..], b"Bob:ACK");
    }
}
