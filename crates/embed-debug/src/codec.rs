//! Length-prefixed JSON framing.
//! - read_frame/read_message: u32 big-endian length + UTF-8 JSON payload
//! - write_message: serialize and frame an envelope

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::DEFAULT_MAX_FRAME_LEN;
use crate::error::{DebugError, Result};
use crate::transport::{read_fully, write_fully, Transport};

const LENGTH_PREFIX: usize = 4;

/// Frame decoder with a reusable payload buffer.
///
/// The buffer grows to fit the largest frame seen and never shrinks. A NUL
/// sentinel follows each payload in the buffer; it is never sent or parsed.
#[derive(Debug)]
pub struct MessageCodec {
    buffer: Vec<u8>,
    max_frame_len: usize,
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl MessageCodec {
    #[must_use]
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_len,
        }
    }

    /// Current capacity of the payload buffer, excluding the sentinel.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len().saturating_sub(1)
    }

    /// Read one frame and return its payload.
    pub fn read_frame<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<&[u8]> {
        let mut prefix = [0u8; LENGTH_PREFIX];
        read_fully(transport, &mut prefix)?;
        let len = u32::from_be_bytes(prefix) as usize;
        if len > self.max_frame_len {
            return Err(DebugError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        if len + 1 > self.buffer.len() {
            self.buffer.resize(len + 1, 0);
        }
        read_fully(transport, &mut self.buffer[..len])?;
        self.buffer[len] = 0;
        Ok(&self.buffer[..len])
    }

    /// Read one frame and parse it as `M`.
    pub fn read_message<M, T>(&mut self, transport: &mut T) -> Result<M>
    where
        M: DeserializeOwned,
        T: Transport + ?Sized,
    {
        let payload = self.read_frame(transport)?;
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Serialize `message` and send it as one frame.
pub fn write_message<M, T>(transport: &mut T, message: &M) -> Result<()>
where
    M: Serialize + ?Sized,
    T: Transport + ?Sized,
{
    let payload = serde_json::to_vec(message)?;
    write_frame(transport, &payload)
}

/// Send `payload` as one frame.
pub fn write_frame<T: Transport + ?Sized>(transport: &mut T, payload: &[u8]) -> Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| DebugError::protocol(format!("payload of {} bytes", payload.len())))?;
    write_fully(transport, &len.to_be_bytes())?;
    write_fully(transport, payload)
}

/// Split one frame off the front of `bytes`, if a complete one is present.
///
/// Returns the payload and the remaining bytes.
#[must_use]
pub fn split_frame(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let prefix: [u8; LENGTH_PREFIX] = bytes.get(..LENGTH_PREFIX)?.try_into().ok()?;
    let len = u32::from_be_bytes(prefix) as usize;
    let rest = &bytes[LENGTH_PREFIX..];
    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use serde_json::{json, Value};

    use super::*;

    #[derive(Default)]
    struct Pipe {
        bytes: VecDeque<u8>,
    }

    impl Transport for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let count = buf.len().min(self.bytes.len());
            for slot in &mut buf[..count] {
                *slot = self.bytes.pop_front().unwrap_or_default();
            }
            Ok(count)
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.bytes.extend(buf);
            Ok(buf.len())
        }

        fn peek(&mut self) -> io::Result<usize> {
            Ok(self.bytes.len())
        }

        fn close(&mut self) {}
    }

    #[test]
    fn frame_roundtrip_preserves_nested_unicode() {
        let message = json!({
            "type": "event",
            "event": {"nested": [{"deeper": {"text": "héllo ✓ 𝄞", "n": [1, 2.5, null]}}]}
        });
        let mut pipe = Pipe::default();
        write_message(&mut pipe, &message).unwrap();

        let mut codec = MessageCodec::default();
        let decoded: Value = codec.read_message(&mut pipe).unwrap();
        assert_eq!(decoded, message);
        assert!(pipe.bytes.is_empty());
    }

    #[test]
    fn prefix_is_big_endian_payload_length() {
        let mut pipe = Pipe::default();
        write_frame(&mut pipe, b"{}").unwrap();
        let bytes: Vec<u8> = pipe.bytes.iter().copied().collect();
        assert_eq!(bytes, [0, 0, 0, 2, b'{', b'}']);
        assert_eq!(split_frame(&bytes), Some((&b"{}"[..], &b""[..])));
        assert_eq!(split_frame(&bytes[..5]), None);
    }

    #[test]
    fn buffer_grows_but_never_shrinks() {
        let mut pipe = Pipe::default();
        write_message(&mut pipe, &json!({"text": "x".repeat(100)})).unwrap();
        write_message(&mut pipe, &json!({})).unwrap();

        let mut codec = MessageCodec::default();
        let _: Value = codec.read_message(&mut pipe).unwrap();
        let grown = codec.buffer_len();
        assert!(grown >= 100);

        let small: Value = codec.read_message(&mut pipe).unwrap();
        assert_eq!(small, json!({}));
        assert_eq!(codec.buffer_len(), grown);
    }

    #[test]
    fn truncated_frame_is_a_transport_failure() {
        let mut pipe = Pipe::default();
        pipe.bytes.extend([0, 0, 0, 10, b'{']);
        let mut codec = MessageCodec::default();
        let err = codec.read_frame(&mut pipe).unwrap_err();
        assert!(matches!(err, DebugError::ConnectionClosed));
    }

    #[test]
    fn oversized_frame_is_rejected_before_reading() {
        let mut pipe = Pipe::default();
        pipe.bytes.extend(1024u32.to_be_bytes());
        let mut codec = MessageCodec::new(16);
        let err = codec.read_frame(&mut pipe).unwrap_err();
        assert!(matches!(err, DebugError::FrameTooLarge { len: 1024, max: 16 }));
        assert_eq!(codec.buffer_len(), 0);
    }

    #[test]
    fn invalid_json_is_a_protocol_failure() {
        let mut pipe = Pipe::default();
        write_frame(&mut pipe, b"{not json").unwrap();
        let mut codec = MessageCodec::default();
        let err = codec.read_message::<Value, _>(&mut pipe).unwrap_err();
        assert!(matches!(err, DebugError::Json(_)));
    }
}
