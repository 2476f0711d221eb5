//! # Frame Reader
//!
//! Incremental frame extraction over bytes that arrive in arbitrary chunks.
//!
//! [`StreamBuffer`] stores the unreleased tail of a byte stream together
//! with two cursors, expressed as absolute stream offsets:
//! - `consumed`: everything before it has been released
//! - `examined`: everything before it has already been scanned for the
//!   current delimiter without a match
//!
//! [`FrameReader`] scans that buffer without consuming anything. A frame is
//! only released when the caller calls [`FrameReader::consume`] (or
//! [`FrameReader::take`]); until then [`FrameReader::next_frame`] keeps
//! returning the same frame.
//!
//! ```rust
//! use cipherline::core::frame_reader::{FrameMode, FrameReader};
//!
//! let mut reader = FrameReader::new();
//! reader.push(b"3x1,5x");
//! assert!(reader.next_frame(FrameMode::LINE).is_none());
//!
//! reader.push(b"2\nrest");
//! let frame = reader.next_frame(FrameMode::LINE).unwrap();
//! assert_eq!(reader.peek(&frame), b"3x1,5x2");
//! reader.consume(frame.end());
//! assert_eq!(reader.pending(), 4);
//! ```

use bytes::{Buf, Bytes, BytesMut};

/// Default initial capacity of a stream buffer
const DEFAULT_BUFFER_CAPACITY: usize = 4 * 1024;

/// How frames are delimited in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Frame ends at the first occurrence of the sentinel byte (excluded from the payload)
    Delimited(u8),
    /// Frame is exactly this many bytes; a size of zero never yields a frame
    FixedSize(usize),
}

impl FrameMode {
    /// Newline-terminated lines
    pub const LINE: FrameMode = FrameMode::Delimited(b'\n');
}

/// Location of a complete frame inside a [`StreamBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    start: u64,
    len: usize,
    delimiter_len: usize,
}

impl Frame {
    /// Absolute stream offset of the first payload byte
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Payload length, delimiter excluded
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute stream offset just past the frame, delimiter included
    pub fn end(&self) -> u64 {
        self.start + (self.len + self.delimiter_len) as u64
    }
}

/// Append-only byte stream with `consumed` and `examined` cursors.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    /// Unreleased bytes; `data[0]` sits at stream offset `consumed`
    data: BytesMut,
    consumed: u64,
    examined: u64,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            consumed: 0,
            examined: 0,
        }
    }

    /// Append bytes to the logical end of the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Offset of the first unreleased byte.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Offset up to which the current delimiter has been searched for.
    pub fn examined(&self) -> u64 {
        self.examined.max(self.consumed)
    }

    /// Offset just past the last byte appended.
    pub fn end(&self) -> u64 {
        self.consumed + self.data.len() as u64
    }

    /// Unreleased bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Release every byte strictly before `up_to` (clamped to the buffered range).
    pub fn consume(&mut self, up_to: u64) {
        let up_to = up_to.min(self.end());
        if up_to <= self.consumed {
            return;
        }
        self.data.advance((up_to - self.consumed) as usize);
        self.consumed = up_to;
        self.examined = self.examined.max(up_to);
    }

    /// Record that bytes before `up_to` were scanned without a match.
    fn mark_examined(&mut self, up_to: u64) {
        self.examined = up_to.clamp(self.consumed, self.end());
    }

    /// Release bytes up to `up_to` and hand them out without copying.
    fn split_to(&mut self, up_to: u64) -> Bytes {
        let up_to = up_to.clamp(self.consumed, self.end());
        let bytes = self.data.split_to((up_to - self.consumed) as usize).freeze();
        self.consumed = up_to;
        self.examined = self.examined.max(up_to);
        bytes
    }

    fn offset_of(&self, pos: u64) -> usize {
        (pos - self.consumed) as usize
    }
}

/// Non-destructive frame scanner over a [`StreamBuffer`].
#[derive(Debug, Default)]
pub struct FrameReader {
    buffer: StreamBuffer,
    /// Sentinel the `examined` cursor currently refers to
    examined_for: Option<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: StreamBuffer::with_capacity(capacity),
            examined_for: None,
        }
    }

    /// Append freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    pub fn buffer(&self) -> &StreamBuffer {
        &self.buffer
    }

    /// Number of unreleased bytes.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Find the next complete frame starting at the `consumed` cursor.
    ///
    /// Returns `None` when the buffer does not yet hold a full frame; the
    /// partial tail stays buffered and delimiter scanning resumes from the
    /// `examined` cursor on the next call.
    pub fn next_frame(&mut self, mode: FrameMode) -> Option<Frame> {
        let start = self.buffer.consumed();
        match mode {
            FrameMode::FixedSize(size) => {
                // An empty frame would never advance the stream
                if size == 0 || self.buffer.len() < size {
                    return None;
                }
                Some(Frame {
                    start,
                    len: size,
                    delimiter_len: 0,
                })
            }
            FrameMode::Delimited(sentinel) => {
                let resume = if self.examined_for == Some(sentinel) {
                    self.buffer.examined()
                } else {
                    start
                };
                let from = self.buffer.offset_of(resume);
                let found = self.buffer.as_slice()[from..]
                    .iter()
                    .position(|&b| b == sentinel);

                match found {
                    Some(idx) => {
                        let len = from + idx;
                        self.buffer.mark_examined(start + len as u64);
                        self.examined_for = Some(sentinel);
                        Some(Frame {
                            start,
                            len,
                            delimiter_len: 1,
                        })
                    }
                    None => {
                        let end = self.buffer.end();
                        self.buffer.mark_examined(end);
                        self.examined_for = Some(sentinel);
                        None
                    }
                }
            }
        }
    }

    /// Payload bytes of a frame that has not been consumed yet.
    ///
    /// Returns an empty slice for frames that were already released.
    pub fn peek(&self, frame: &Frame) -> &[u8] {
        if frame.start < self.buffer.consumed() || frame.end() > self.buffer.end() {
            return &[];
        }
        let from = self.buffer.offset_of(frame.start);
        &self.buffer.as_slice()[from..from + frame.len]
    }

    /// Release every byte strictly before `up_to`.
    pub fn consume(&mut self, up_to: u64) {
        self.buffer.consume(up_to);
    }

    /// Release a frame and return its payload without copying.
    ///
    /// Returns `None` if the frame does not start at the `consumed` cursor.
    pub fn take(&mut self, frame: Frame) -> Option<Bytes> {
        if frame.start != self.buffer.consumed() || frame.end() > self.buffer.end() {
            return None;
        }
        let payload = self.buffer.split_to(frame.start + frame.len as u64);
        self.buffer.consume(frame.end());
        Some(payload)
    }

    /// Drop everything buffered; the stream offsets keep counting.
    pub fn clear(&mut self) {
        let end = self.buffer.end();
        self.buffer.consume(end);
        self.examined_for = None;
    }
}
