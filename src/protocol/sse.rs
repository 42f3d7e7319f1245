//! Server-Sent-Events framing

use bytes::{BufMut, Bytes, BytesMut};

/// Event name used for every handler payload
pub const DATA_EVENT: &str = "data";

/// One SSE frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// `event:` field, omitted when `None`
    pub event: Option<String>,
    /// Payload, one `data:` line per payload line
    pub data: String,
}

impl SseEvent {
    /// Frame carrying a handler payload under the `data` event
    pub fn data(payload: impl Into<String>) -> Self {
        Self {
            event: Some(DATA_EVENT.to_string()),
            data: payload.into(),
        }
    }

    /// Encode to wire format
    ///
    /// A payload containing line breaks is split over several `data:` lines
    /// so the frame boundary (`\n\n`) can only appear at the end.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.data.len() + 32);

        if let Some(ref event) = self.event {
            buf.put_slice(b"event: ");
            buf.put_slice(event.as_bytes());
            buf.put_u8(b'\n');
        }

        for line in self.data.split('\n') {
            buf.put_slice(b"data: ");
            buf.put_slice(line.trim_end_matches('\r').as_bytes());
            buf.put_u8(b'\n');
        }

        buf.put_u8(b'\n');
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_frame() {
        let frame = SseEvent::data("{\"timestamp\":1}").encode();
        assert_eq!(&frame[..], b"event: data\ndata: {\"timestamp\":1}\n\n");
    }

    #[test]
    fn test_multiline_payload_split() {
        let frame = SseEvent::data("{\r\n\"a\":1\n}").encode();
        assert_eq!(&frame[..], b"event: data\ndata: {\ndata: \"a\":1\ndata: }\n\n");
    }

    #[test]
    fn test_no_event_name() {
        let frame = SseEvent {
            event: None,
            data: "x".into(),
        }
        .encode();
        assert_eq!(&frame[..], b"data: x\n\n");
    }
}
