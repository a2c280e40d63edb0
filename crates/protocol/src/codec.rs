//! Frame-to-payload decoding
//!
//! The gateway delivers payloads either as plain text frames (one JSON
//! payload per frame) or, with `compress=zlib-stream`, as binary chunks of
//! a single zlib stream that lives for the whole connection. A logical
//! message ends when a frame's last four bytes are the zlib sync-flush
//! marker `00 00 FF FF`; a message may span several frames, and a frame
//! never contains more than one message.

use bytes::BytesMut;
use flate2::{Decompress, FlushDecompress, Status};

use crate::error::{ProtocolError, Result};
use crate::payload::Payload;

/// Suffix marking the end of a logical message in zlib-stream mode.
pub const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

const INFLATE_CHUNK: usize = 16 * 1024;

/// Decodes received frames into gateway payloads.
///
/// One decoder corresponds to one connection: in zlib-stream mode the
/// decompression context is shared by every payload on the connection and
/// must never be reset mid-stream.
pub enum PayloadDecoder {
    /// Each text frame is a complete JSON payload.
    Plain,
    /// Binary frames feed a connection-scoped zlib stream.
    ZlibStream(Inflater),
}

impl PayloadDecoder {
    /// Creates a decoder for a new connection.
    pub fn new(zlib_stream: bool) -> Self {
        if zlib_stream {
            Self::ZlibStream(Inflater::new())
        } else {
            Self::Plain
        }
    }

    /// Decodes a text frame.
    ///
    /// Text frames only occur in plain mode; in zlib-stream mode every
    /// inbound payload arrives as binary chunks.
    pub fn decode_text(&mut self, text: &str) -> Result<Option<Payload>> {
        match self {
            Self::Plain => Payload::from_json(text).map(Some),
            Self::ZlibStream(_) => Err(ProtocolError::UnexpectedTextFrame),
        }
    }

    /// Decodes a binary frame, returning a payload once a full logical
    /// message has been accumulated and inflated.
    pub fn decode_binary(&mut self, chunk: &[u8]) -> Result<Option<Payload>> {
        match self {
            Self::Plain => Err(ProtocolError::UnexpectedBinaryFrame),
            Self::ZlibStream(inflater) => match inflater.push(chunk)? {
                None => Ok(None),
                Some(bytes) => {
                    let text = String::from_utf8(bytes)?;
                    Payload::from_json(&text).map(Some)
                }
            },
        }
    }
}

/// Streaming zlib decompressor with sync-flush framing.
pub struct Inflater {
    decompress: Decompress,
    buffer: BytesMut,
}

impl Inflater {
    fn new() -> Self {
        Self {
            decompress: Decompress::new(true),
            buffer: BytesMut::new(),
        }
    }

    /// Buffers a chunk; once a chunk ends with the sync-flush marker the
    /// accumulated bytes are inflated and returned as one message.
    fn push(&mut self, chunk: &[u8]) -> Result<Option<Vec<u8>>> {
        self.buffer.extend_from_slice(chunk);
        if !self.buffer.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        let mut inflated = Vec::with_capacity(self.buffer.len().max(INFLATE_CHUNK));
        let mut consumed = 0usize;
        while consumed < self.buffer.len() {
            if inflated.len() == inflated.capacity() {
                inflated.reserve(INFLATE_CHUNK);
            }
            let read_before = self.decompress.total_in();
            let status = self
                .decompress
                .decompress_vec(&self.buffer[consumed..], &mut inflated, FlushDecompress::Sync)
                .map_err(|e| ProtocolError::Decompress(e.to_string()))?;
            let read = (self.decompress.total_in() - read_before) as usize;
            consumed += read;

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    if read == 0 && inflated.len() < inflated.capacity() {
                        return Err(ProtocolError::Decompress(
                            "inflater stalled before the end of the message".to_string(),
                        ));
                    }
                }
            }
        }

        self.buffer.clear();
        Ok(Some(inflated))
    }
}
