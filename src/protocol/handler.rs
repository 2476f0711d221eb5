use crate::core::frame_reader::FrameMode;
use crate::error::Result;

/// Interprets the frames of one connection.
///
/// A handler owns whatever per-connection state its protocol needs; the
/// session calls it sequentially, one frame at a time, and never shares it
/// with another connection.
pub trait FrameHandler: Send {
    /// How this protocol delimits frames in the decoded stream.
    fn frame_mode(&self) -> FrameMode;

    /// Handle one frame (delimiter excluded).
    ///
    /// Returns the plaintext response to send, if any. An error is
    /// connection-fatal and nothing is sent for the failing frame.
    fn handle_frame(&mut self, frame: &[u8]) -> Result<Option<Vec<u8>>>;
}

impl<H: FrameHandler + ?Sized> FrameHandler for Box<H> {
    fn frame_mode(&self) -> FrameMode {
        (**self).frame_mode()
    }

    fn handle_frame(&mut self, frame: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).handle_frame(frame)
    }
}
