//! Binary frame codec.
//!
//! Every WebSocket binary message carries exactly one frame:
//!
//! ```text
//! ┌────────────┬──────────┬─────────────────────┐
//! │ Request ID │ Command  │ Payload             │
//! │ 4 bytes    │ 2 bytes  │ remaining bytes     │
//! │ uint32 BE  │ uint16 BE│ UTF-8 JSON or empty │
//! └────────────┴──────────┴─────────────────────┘
//! ```
//!
//! There is no length prefix: the transport preserves message boundaries.
//! The codec only slices bytes; UTF-8 and JSON are checked when the payload
//! is read with [`Frame::body`].

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::CommandCode;

// ============================================================================
// Constants
// ============================================================================

/// Size of the fixed header (request id + command).
pub const HEADER_SIZE: usize = 6;

// ============================================================================
// Free Functions
// ============================================================================

/// Encodes a frame into a new buffer of `6 + payload.len()` bytes.
#[must_use]
pub fn encode(request_id: RequestId, command: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&request_id.as_u32().to_be_bytes());
    buf.extend_from_slice(&command.to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Decodes a frame from one transport message.
///
/// # Errors
///
/// Returns [`Error::MalformedFrame`] if the input is shorter than the header.
pub fn decode(bytes: &[u8]) -> Result<Frame> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::malformed_frame(format!(
            "frame is {} bytes, header needs {HEADER_SIZE}",
            bytes.len()
        )));
    }

    let request_id = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let command = u16::from_be_bytes([bytes[4], bytes[5]]);

    Ok(Frame {
        request_id: RequestId::new(request_id),
        command,
        payload: bytes[HEADER_SIZE..].to_vec(),
    })
}

/// Serializes a body into frame payload bytes.
///
/// A body serializing to `null` produces an empty payload.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
pub fn json_payload<T: Serialize + ?Sized>(body: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(body)?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::to_vec(&value)?)
}

// ============================================================================
// Frame
// ============================================================================

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Correlation id, `0` for server events.
    pub request_id: RequestId,
    /// Raw command code. Unknown codes are kept as-is.
    pub command: u16,
    /// UTF-8 JSON bytes, empty for a `null` body.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a frame from raw parts.
    #[inline]
    #[must_use]
    pub fn new(request_id: RequestId, command: impl Into<u16>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            request_id,
            command: command.into(),
            payload: payload.into(),
        }
    }

    /// Creates a frame whose payload is `body` serialized as JSON.
    ///
    /// A body serializing to `null` produces an empty payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn with_body<T: Serialize + ?Sized>(
        request_id: RequestId,
        command: CommandCode,
        body: &T,
    ) -> Result<Self> {
        Ok(Self::new(request_id, command, json_payload(body)?))
    }

    /// Encodes this frame.
    #[inline]
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        encode(self.request_id, self.command, &self.payload)
    }

    /// Decodes a frame. See [`decode`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the input is shorter than the header.
    #[inline]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }

    /// Returns the command if it is a known code.
    #[inline]
    #[must_use]
    pub fn command_code(&self) -> Option<CommandCode> {
        CommandCode::from_code(self.command)
    }

    /// Returns `true` if this frame is a server event.
    #[inline]
    #[must_use]
    pub fn is_event(&self) -> bool {
        self.request_id.is_event()
    }

    /// Returns `true` if this frame carries an error body.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.command == CommandCode::Error.code()
    }

    /// Returns the payload as text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] if the payload is not valid UTF-8.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| Error::malformed_frame(format!("payload is not UTF-8: {e}")))
    }

    /// Parses the payload as JSON. An empty payload is `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] on invalid UTF-8 or JSON.
    pub fn body(&self) -> Result<Value> {
        let text = self.text()?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(text)
            .map_err(|e| Error::malformed_frame(format!("payload is not JSON: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_encode_layout() {
        let bytes = encode(RequestId::new(0x0102_0304), 0x0506, b"{}");
        assert_eq!(bytes, vec![1, 2, 3, 4, 5, 6, b'{', b'}']);
    }

    #[test]
    fn test_encode_empty_payload() {
        let bytes = encode(RequestId::new(7), CommandCode::Login.code(), &[]);
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(bytes, vec![0, 0, 0, 7, 0, 1]);
    }

    #[test]
    fn test_decode_short_input() {
        for len in 0..HEADER_SIZE {
            let bytes = vec![0u8; len];
            assert!(matches!(decode(&bytes), Err(Error::MalformedFrame { .. })));
        }
    }

    #[test]
    fn test_decode_header_only() {
        let frame = decode(&[0, 0, 0, 0, 0, 3]).unwrap();
        assert!(frame.is_event());
        assert_eq!(frame.command_code(), Some(CommandCode::FilesHistoryReport));
        assert!(frame.payload.is_empty());
        assert_eq!(frame.body().unwrap(), Value::Null);
    }

    #[test]
    fn test_unknown_command_survives_codec() {
        let frame = decode(&encode(RequestId::new(1), 999, b"null")).unwrap();
        assert_eq!(frame.command, 999);
        assert_eq!(frame.command_code(), None);
    }

    #[test]
    fn test_invalid_utf8_fails_at_body_stage() {
        let frame = decode(&encode(RequestId::new(1), 4, &[0xff, 0xfe])).unwrap();
        assert!(matches!(frame.body(), Err(Error::MalformedFrame { .. })));
    }

    #[test]
    fn test_invalid_json_fails_at_body_stage() {
        let frame = decode(&encode(RequestId::new(1), 4, b"{not json")).unwrap();
        assert!(matches!(frame.body(), Err(Error::MalformedFrame { .. })));
    }

    #[test]
    fn test_with_body_null_is_empty() {
        let frame = Frame::with_body(RequestId::new(2), CommandCode::DeleteFile, &Value::Null).unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_with_body_json() {
        let frame = Frame::with_body(
            RequestId::new(2),
            CommandCode::DeleteFile,
            &json!({ "fileId": "f1" }),
        )
        .unwrap();
        assert_eq!(frame.text().unwrap(), r#"{"fileId":"f1"}"#);
        assert_eq!(frame.body().unwrap()["fileId"], "f1");
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(
            id in any::<u32>(),
            command in any::<u16>(),
            payload in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let bytes = encode(RequestId::new(id), command, &payload);
            prop_assert_eq!(bytes.len(), HEADER_SIZE + payload.len());

            let frame = decode(&bytes).unwrap();
            prop_assert_eq!(frame.request_id.as_u32(), id);
            prop_assert_eq!(frame.command, command);
            prop_assert_eq!(frame.payload, payload);
        }
    }
}
