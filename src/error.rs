//! # Error Types
//!
//! Error handling for the cipherline protocol core.
//!
//! This module defines every failure a session can hit, from low-level I/O
//! errors to cipher negotiation and request violations.
//!
//! ## Error Categories
//! - **I/O Errors**: Transport read/write failures
//! - **Negotiation Errors**: Unknown opcodes, no-op or oversized cipher specs
//! - **Request Errors**: Malformed selection lines, unknown record types
//! - **Framing Errors**: Pending frames exceeding the configured bound
//! - **Configuration Errors**: Invalid or unreadable configuration
//!
//! "Need more data" is never an error: negotiation reports it through
//! [`Negotiation::NeedMoreData`](crate::core::negotiation::Negotiation) and
//! framing through `Option::None`.
//!
//! ## Example Usage
//! ```rust
//! use cipherline::core::negotiation::{negotiate, Negotiation};
//! use cipherline::error::ProtocolError;
//!
//! match negotiate(&[0x06, 0x00]) {
//!     Err(ProtocolError::InvalidOperation(op)) => assert_eq!(op, 0x06),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! # let _ = Negotiation::NeedMoreData;
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Request validation errors
    pub const ERR_EMPTY_REQUEST: &str = "Request contains no fields";
    pub const ERR_MISSING_SEPARATOR: &str = "Field is missing the 'x' separator";
    pub const ERR_NON_DIGIT_COUNT: &str = "Field count contains a non-digit byte";
    pub const ERR_EMPTY_COUNT: &str = "Field count is empty";
    pub const ERR_COUNT_OVERFLOW: &str = "Field count does not fit in 64 bits";
}

/// ProtocolError is the primary error type for all session operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid cipher operation: 0x{0:02x}")]
    InvalidOperation(u8),

    #[error("Cipher spec leaves data unchanged")]
    NoOpCipher,

    #[error("Cipher spec exceeds {0} bytes")]
    OversizedSpec(usize),

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Unknown record type: 0x{0:02x}")]
    UnknownRecordType(u8),

    #[error("Frame too large: {0} bytes pending without a delimiter")]
    OversizedFrame(usize),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// True for errors raised while negotiating the cipher spec.
    pub fn is_negotiation_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::InvalidOperation(_)
                | ProtocolError::NoOpCipher
                | ProtocolError::OversizedSpec(_)
        )
    }

    /// True for errors raised while interpreting a decoded frame.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedRequest(_) | ProtocolError::UnknownRecordType(_)
        )
    }

    /// Every error reaching a session terminates it; there is no retry at this layer.
    pub fn is_connection_fatal(&self) -> bool {
        !matches!(self, ProtocolError::ConfigError(_))
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
