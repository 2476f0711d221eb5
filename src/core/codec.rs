use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::core::cipher::{CipherPipeline, CipherSpec};
use crate::core::frame_reader::{FrameMode, FrameReader};
use crate::error::{ProtocolError, Result};

/// Line codec for the client side of a negotiated connection.
///
/// Outgoing lines are newline-terminated and encoded; incoming ciphertext is
/// decoded as it arrives and split into lines. The spec itself must already
/// have been written to the stream (see [`crate::transport::connect`]).
pub struct CipherCodec {
    pipeline: CipherPipeline,
    decoded: FrameReader,
    max_line_length: usize,
}

impl CipherCodec {
    pub fn new(spec: CipherSpec) -> Self {
        Self {
            pipeline: CipherPipeline::new(spec),
            decoded: FrameReader::new(),
            max_line_length: crate::config::MAX_FRAME_LENGTH,
        }
    }

    /// Bound on a buffered line that has no terminator yet.
    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn pipeline(&self) -> &CipherPipeline {
        &self.pipeline
    }
}

impl Decoder for CipherCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if !src.is_empty() {
            // Every ciphertext byte is decoded exactly once, in arrival order
            let mut chunk = src.split();
            self.pipeline.decode(&mut chunk);
            self.decoded.push(&chunk);
        }

        match self.decoded.next_frame(FrameMode::LINE) {
            Some(frame) => Ok(self.decoded.take(frame)),
            None if self.decoded.pending() > self.max_line_length => {
                Err(ProtocolError::OversizedFrame(self.decoded.pending()))
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Bytes> for CipherCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: Bytes, dst: &mut BytesMut) -> Result<()> {
        let start = dst.len();
        dst.reserve(line.len() + 1);
        dst.extend_from_slice(&line);
        dst.put_u8(b'\n');
        self.pipeline.encode(&mut dst[start..]);
        Ok(())
    }
}
