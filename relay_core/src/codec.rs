//! Newline-delimited JSON framing for backend output streams.
//!
//! Backends write one complete JSON value per line. The raw byte stream
//! arrives in arbitrary chunks, so a message may be split across reads or
//! several messages may arrive in one read; [`JsonLineDecoder`] reassembles
//! the chunks into discrete frames. A line that fails to parse is surfaced as
//! [`Frame::Invalid`] rather than an error so one malformed line never stalls
//! the messages behind it.
//!
//! The decoder has no notion of request ids; routing happens in the session.

use bytes::BytesMut;
use serde_json::Value;
use tokio_util::codec::Decoder;

/// One decoded line from a backend's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A complete, parseable JSON message.
    Message(Value),
    /// A non-empty line that was not valid JSON. Carries the offending text.
    Invalid { raw: String },
}

/// Incremental decoder from raw bytes to [`Frame`]s, one per `\n`-terminated
/// line. Whitespace-only lines are skipped. Bytes after the last newline stay
/// buffered until more data arrives.
#[derive(Debug, Default)]
pub struct JsonLineDecoder;

impl JsonLineDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for JsonLineDecoder {
    type Item = Frame;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> std::io::Result<Option<Frame>> {
        loop {
            let Some(pos) = src.iter().position(|b| *b == b'\n') else {
                return Ok(None);
            };
            let line = src.split_to(pos + 1);
            let text = String::from_utf8_lossy(&line[..pos]);
            if text.trim().is_empty() {
                continue;
            }
            return Ok(Some(match serde_json::from_str::<Value>(text.trim()) {
                Ok(value) => Frame::Message(value),
                Err(_) => Frame::Invalid {
                    raw: text.into_owned(),
                },
            }));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> std::io::Result<Option<Frame>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        // An unterminated tail at stream end is not a frame.
        if !src.is_empty() {
            src.clear();
        }
        Ok(None)
    }
}
