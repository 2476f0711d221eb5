//! # Protocol Layer
//!
//! Frame handlers and the per-connection session engine.
//!
//! ## Components
//! - **Handler**: the `FrameHandler` seam between framing and interpretation
//! - **Selection**: ciphered line protocol picking the largest counted item
//! - **Price Record**: plaintext 9-byte record protocol (insert / range mean)
//! - **Session**: `AwaitingCipherSpec → Streaming → Closed` state machine

pub mod handler;
pub mod price_record;
pub mod selection;
pub mod session;

pub use handler::FrameHandler;
pub use session::{Session, SessionState};
