//! Stream Decoder
//!
//! Converts the chunked response byte stream into framed protocol events.
//! A frame is one newline-delimited line of the form `data: {json}`; blank
//! lines and lines without the marker are skipped.
//!
//! The decoder is stateful across reads: a multi-byte UTF-8 character split
//! between two chunks is carried over rather than re-decoded or mangled, and
//! a frame split across two reads is buffered until its newline arrives.
//! Malformed JSON after a well-formed marker drops that single frame with a
//! diagnostic; the stream continues.

use serde::Deserialize;

/// The line prefix marking a protocol frame
const FRAME_MARKER: &str = "data: ";

/// A decoded protocol event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment of the assistant response
    Text(String),
    /// The stream completed; `cancelled` is set when the server stopped
    /// generating on request rather than running to the end
    Done {
        /// Whether the server reports the generation as cancelled
        cancelled: bool,
    },
    /// The server reported a generation error
    Error(String),
}

/// One decoded frame: the event plus its dedup fingerprint
///
/// `key` is the verbatim JSON payload text as it appeared on the wire,
/// which is what the session-level duplicate filter keys on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Verbatim payload text (pre-parse)
    pub key: String,
    /// The parsed event
    pub event: StreamEvent,
}

/// Wire schema of a frame payload
///
/// Exactly one of `text`, `done`, `error` is meaningfully present;
/// `cancelled` only accompanies `done: true`.
#[derive(Debug, Deserialize)]
struct FramePayload {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    cancelled: bool,
}

/// Incremental frame decoder for one streaming session
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Undecoded bytes, at most one partial UTF-8 sequence long after `feed`
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a newline
    line_buf: String,
    /// Set once a terminal frame was produced; everything after is discarded
    finished: bool,
}

impl StreamDecoder {
    /// Create a decoder with empty carry-over state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a terminal frame (`done` or `error`) has been decoded
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one chunk of bytes, returning the frames it completes
    ///
    /// Frames are returned in wire order. Once a terminal frame has been
    /// produced, further input is discarded and this returns nothing.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodedFrame> {
        if self.finished {
            return Vec::new();
        }

        self.decode_bytes(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.line_buf.find('\n') {
            let line: String = self.line_buf.drain(..=pos).collect();
            if let Some(frame) = self.parse_line(&line) {
                let terminal = matches!(
                    frame.event,
                    StreamEvent::Done { .. } | StreamEvent::Error(_)
                );
                frames.push(frame);
                if terminal {
                    self.finished = true;
                    self.pending.clear();
                    self.line_buf.clear();
                    break;
                }
            }
        }
        frames
    }

    /// Flush at end-of-stream
    ///
    /// Processes a trailing line that was never newline-terminated. Returns
    /// at most one frame; nothing if the session already saw a terminal
    /// frame or the remainder is not a well-formed frame.
    pub fn finish(&mut self) -> Vec<DecodedFrame> {
        if self.finished {
            return Vec::new();
        }
        let line = std::mem::take(&mut self.line_buf);
        self.pending.clear();
        match self.parse_line(&line) {
            Some(frame) => {
                self.finished = matches!(
                    frame.event,
                    StreamEvent::Done { .. } | StreamEvent::Error(_)
                );
                vec![frame]
            }
            None => Vec::new(),
        }
    }

    /// Decode as much of `pending + chunk` as is valid UTF-8 into `line_buf`
    ///
    /// An incomplete trailing sequence stays in `pending` for the next call.
    /// An invalid sequence becomes U+FFFD, matching lossy text decoding on
    /// the original wire consumer.
    fn decode_bytes(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    self.line_buf.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_len = err.valid_up_to();
                    if let Ok(valid) =
                        std::str::from_utf8(&self.pending[consumed..consumed + valid_len])
                    {
                        self.line_buf.push_str(valid);
                    }
                    consumed += valid_len;
                    match err.error_len() {
                        Some(invalid_len) => {
                            self.line_buf.push(char::REPLACEMENT_CHARACTER);
                            consumed += invalid_len;
                        }
                        // Partial sequence at the tail; wait for more bytes
                        None => break,
                    }
                }
            }
        }
        self.pending.drain(..consumed);
    }

    /// Parse one line into a frame, if it is one
    fn parse_line(&self, line: &str) -> Option<DecodedFrame> {
        let line = line.trim();
        let payload = line.strip_prefix(FRAME_MARKER)?.trim();
        if payload.is_empty() {
            return None;
        }

        let parsed: FramePayload = match serde_json::from_str(payload) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "Dropping frame with malformed JSON payload");
                return None;
            }
        };

        // Precedence mirrors the wire contract: done, then error, then text.
        let event = if parsed.done {
            StreamEvent::Done {
                cancelled: parsed.cancelled,
            }
        } else if let Some(error) = parsed.error {
            StreamEvent::Error(error)
        } else if let Some(text) = parsed.text {
            StreamEvent::Text(text)
        } else {
            tracing::warn!(payload = %payload, "Dropping frame with no recognized field");
            return None;
        };

        Some(DecodedFrame {
            key: payload.to_string(),
            event,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(decoder: &mut StreamDecoder, bytes: &[u8]) -> Vec<DecodedFrame> {
        let mut frames = decoder.feed(bytes);
        frames.extend(decoder.finish());
        frames
    }

    fn collect_text(frames: &[DecodedFrame]) -> String {
        frames
            .iter()
            .filter_map(|f| match &f.event {
                StreamEvent::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_single_text_frame() {
        let mut decoder = StreamDecoder::new();
        let frames = decoder.feed(b"data: {\"text\":\"Hi\"}\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, StreamEvent::Text("Hi".to_string()));
        assert_eq!(frames[0].key, "{\"text\":\"Hi\"}");
    }

    #[test]
    fn test_done_frame_terminates() {
        let mut decoder = StreamDecoder::new();
        let frames = decoder.feed(b"data: {\"done\": true}\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, StreamEvent::Done { cancelled: false });
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_cancelled_done_frame() {
        let mut decoder = StreamDecoder::new();
        let frames = decoder.feed(b"data: {\"done\": true, \"cancelled\": true}\n");
        assert_eq!(frames[0].event, StreamEvent::Done { cancelled: true });
    }

    #[test]
    fn test_error_frame() {
        let mut decoder = StreamDecoder::new();
        let frames = decoder.feed(b"data: {\"error\": \"quota exceeded\"}\n");
        assert_eq!(
            frames[0].event,
            StreamEvent::Error("quota exceeded".to_string())
        );
        assert!(decoder.is_finished());
    }

    #[test]
    fn test_frames_after_done_discarded() {
        let mut decoder = StreamDecoder::new();
        let frames =
            decoder.feed(b"data: {\"done\": true}\ndata: {\"text\":\"late\"}\n");
        assert_eq!(frames.len(), 1);
        assert!(decoder.feed(b"data: {\"text\":\"later\"}\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_frame_split_across_reads() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(b"data: {\"te").is_empty());
        let frames = decoder.feed(b"xt\":\"Hi\"}\n");
        assert_eq!(frames[0].event, StreamEvent::Text("Hi".to_string()));
    }

    #[test]
    fn test_multibyte_char_split_across_reads() {
        // "Здравей" is two bytes per character; split inside the first one.
        let bytes = "data: {\"text\":\"Здравей\"}\n".as_bytes();
        let split = bytes.iter().position(|&b| b >= 0x80).unwrap() + 1;

        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(&bytes[..split]).is_empty());
        let frames = decoder.feed(&bytes[split..]);
        assert_eq!(frames[0].event, StreamEvent::Text("Здравей".to_string()));
    }

    #[test]
    fn test_every_split_point_yields_same_text() {
        let wire = "data: {\"text\":\"Здравей\"}\ndata: {\"text\":\" свят 🌍\"}\ndata: {\"done\":true}\n";
        let bytes = wire.as_bytes();

        for split in 0..=bytes.len() {
            let mut decoder = StreamDecoder::new();
            let mut frames = decoder.feed(&bytes[..split]);
            frames.extend(decoder.feed(&bytes[split..]));
            assert_eq!(
                collect_text(&frames),
                "Здравей свят 🌍",
                "divergence at split offset {split}"
            );
            assert!(decoder.is_finished());
        }
    }

    #[test]
    fn test_one_byte_at_a_time() {
        let wire = "data: {\"text\":\"Hi\"}\ndata: {\"text\":\" there\"}\ndata: {\"done\":true}\n";
        let mut decoder = StreamDecoder::new();
        let mut frames = Vec::new();
        for byte in wire.as_bytes() {
            frames.extend(decoder.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(collect_text(&frames), "Hi there");
    }

    #[test]
    fn test_blank_and_unmarked_lines_skipped() {
        let mut decoder = StreamDecoder::new();
        let frames = feed_all(
            &mut decoder,
            b"\n\nevent: ping\ndata: {\"text\":\"ok\"}\n: comment\n\n",
        );
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, StreamEvent::Text("ok".to_string()));
    }

    #[test]
    fn test_malformed_json_dropped_stream_continues() {
        let mut decoder = StreamDecoder::new();
        let frames = feed_all(
            &mut decoder,
            b"data: {not json}\ndata: {\"text\":\"still here\"}\n",
        );
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frames[0].event,
            StreamEvent::Text("still here".to_string())
        );
    }

    #[test]
    fn test_empty_payload_after_marker_skipped() {
        let mut decoder = StreamDecoder::new();
        assert!(feed_all(&mut decoder, b"data: \n").is_empty());
    }

    #[test]
    fn test_payload_with_no_recognized_field_skipped() {
        let mut decoder = StreamDecoder::new();
        assert!(feed_all(&mut decoder, b"data: {\"other\": 1}\n").is_empty());
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = StreamDecoder::new();
        assert!(decoder.feed(b"data: {\"text\":\"tail\"}").is_empty());
        let frames = decoder.finish();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, StreamEvent::Text("tail".to_string()));
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let mut decoder = StreamDecoder::new();
        // 0xFF is never valid UTF-8; the line around it is not a frame, so
        // decoding must survive and keep going.
        let bytes = b"garbage \xff line\ndata: {\"text\":\"ok\"}\n".to_vec();
        let frames = decoder.feed(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, StreamEvent::Text("ok".to_string()));
    }

    #[test]
    fn test_done_precedence_over_text() {
        let mut decoder = StreamDecoder::new();
        let frames = decoder.feed(b"data: {\"text\":\"x\",\"done\":true}\n");
        assert_eq!(frames[0].event, StreamEvent::Done { cancelled: false });
    }
}
