//! Line-based codec for tokio.
//!
//! Splits the inbound byte stream into protocol lines and terminates
//! outbound commands with CRLF. Bytes after the last delimiter stay in the
//! read buffer until the next chunk completes the line.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, warn};

use crate::error::ClientError;

/// Longest inbound line accepted before it is discarded.
pub const MAX_IRC_LINE_LEN: usize = 8191;

/// Codec producing one `String` per CRLF (or bare LF) terminated line.
///
/// Decoding never fails on content: invalid UTF-8 is replaced lossily and
/// over-long lines are skipped, so a single bad line cannot end the
/// session.
#[derive(Debug)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length
    max_len: usize,
    /// Dropping bytes until the end of an over-long line
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the default inbound limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_IRC_LINE_LEN)
    }

    /// Create a new codec with custom max line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ClientError> {
        loop {
            // Look for newline starting from where we left off
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                // One extra byte for the CR of a full-length line whose LF
                // has not arrived yet.
                if src.len() > self.max_len + 1 {
                    warn!(len = src.len(), "discarding over-long inbound line");
                    src.clear();
                    self.discarding = true;
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let mut line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if std::mem::take(&mut self.discarding) {
                continue;
            }

            line.truncate(line.len() - 1);
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if line.is_empty() {
                continue;
            }
            if line.len() > self.max_len {
                warn!(len = line.len(), "discarding over-long inbound line");
                continue;
            }

            return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, ClientError> {
        match self.decode(src)? {
            Some(line) => Ok(Some(line)),
            None => {
                if !src.is_empty() {
                    debug!(len = src.len(), "dropping unterminated fragment at eof");
                    src.advance(src.len());
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ClientError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), ClientError> {
        // Never let a caller smuggle a second command into one write.
        let line = line
            .split(['\r', '\n'])
            .next()
            .unwrap_or_default();
        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
