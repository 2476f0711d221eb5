//! # Cipher Negotiation
//!
//! Parses the cipher spec a client sends as the very first bytes of a
//! connection.
//!
//! ## Wire Format
//! ```text
//! [op] | [op][operand] ... [0x00]
//!
//! 0x01 reversebits      0x02 N  xor(N)      0x03 xorpos
//! 0x04 N  add(N)        0x05 addpos         0x00 end of spec
//! ```
//!
//! Scanning is sequential, so an operand byte of `0x00` is never mistaken
//! for the terminator. Nothing past the terminator is touched: it belongs
//! to the ciphertext stream.

use crate::core::cipher::{
    CipherOperation, CipherSpec, OP_ADD_CONSTANT, OP_ADD_POSITION, OP_END, OP_REVERSE_BITS,
    OP_XOR_CONSTANT, OP_XOR_POSITION,
};
use crate::error::{ProtocolError, Result};
use tracing::debug;

/// Default bound on a serialized spec, terminator included
pub const MAX_SPEC_LENGTH: usize = 80;

/// Outcome of a negotiation attempt over the bytes received so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiation {
    /// The terminator has been seen and the spec is usable.
    Complete {
        spec: CipherSpec,
        /// Bytes of input belonging to the spec, terminator included
        consumed: usize,
    },
    /// The terminator (or a pending operand) has not arrived yet.
    NeedMoreData,
}

/// Incremental spec parser.
///
/// Bytes are fed as they arrive and each byte is looked at exactly once:
/// parsed operations and a half-read operation are kept between calls, so
/// nothing is buffered or rescanned.
#[derive(Debug, Clone)]
pub struct Negotiator {
    operations: Vec<CipherOperation>,
    /// Opcode still waiting for its operand byte
    pending_opcode: Option<u8>,
    consumed: usize,
    max_spec_length: usize,
}

impl Default for Negotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl Negotiator {
    pub fn new() -> Self {
        Self::with_max_spec_length(MAX_SPEC_LENGTH)
    }

    /// Negotiator rejecting specs longer than `max_spec_length` bytes (terminator included).
    pub fn with_max_spec_length(max_spec_length: usize) -> Self {
        Self {
            operations: Vec::new(),
            pending_opcode: None,
            consumed: 0,
            max_spec_length,
        }
    }

    /// Spec bytes accepted so far, across every call to [`feed`](Self::feed).
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Continue parsing with the next bytes of the stream.
    ///
    /// Parsing stops at the terminator; on `Complete`, `consumed` is the
    /// total spec length, so `bytes[consumed - before..]` (with `before` the
    /// value of [`consumed`](Self::consumed) prior to this call) is ciphertext.
    ///
    /// # Errors
    /// - `ProtocolError::InvalidOperation` on an unknown opcode
    /// - `ProtocolError::NoOpCipher` if the spec is empty or leaves data unchanged
    /// - `ProtocolError::OversizedSpec` once the spec outgrows its bound
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Negotiation> {
        for &byte in bytes {
            if self.consumed >= self.max_spec_length {
                return Err(ProtocolError::OversizedSpec(self.max_spec_length));
            }
            self.consumed += 1;

            if let Some(opcode) = self.pending_opcode.take() {
                self.operations.push(if opcode == OP_XOR_CONSTANT {
                    CipherOperation::XorConstant(byte)
                } else {
                    CipherOperation::AddConstant(byte)
                });
                continue;
            }

            match byte {
                OP_END => return self.finish(),
                OP_REVERSE_BITS => self.operations.push(CipherOperation::ReverseBits),
                OP_XOR_POSITION => self.operations.push(CipherOperation::XorPosition),
                OP_ADD_POSITION => self.operations.push(CipherOperation::AddPosition),
                OP_XOR_CONSTANT | OP_ADD_CONSTANT => self.pending_opcode = Some(byte),
                other => return Err(ProtocolError::InvalidOperation(other)),
            }
        }

        Ok(Negotiation::NeedMoreData)
    }

    fn finish(&mut self) -> Result<Negotiation> {
        let operations = std::mem::take(&mut self.operations);
        if operations.is_empty() {
            debug!("Rejecting empty cipher spec");
            return Err(ProtocolError::NoOpCipher);
        }
        let spec = CipherSpec::new(operations)?;
        let consumed = self.consumed;
        debug!(consumed, ops = spec.operations().len(), "Cipher spec negotiated");
        Ok(Negotiation::Complete { spec, consumed })
    }
}

/// Negotiate a cipher spec from the start of `bytes` under the default bound.
///
/// # Errors
/// Same as [`Negotiator::feed`].
pub fn negotiate(bytes: &[u8]) -> Result<Negotiation> {
    Negotiator::new().feed(bytes)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    fn complete(bytes: &[u8]) -> (CipherSpec, usize) {
        match negotiate(bytes).expect("negotiation should succeed") {
            Negotiation::Complete { spec, consumed } => (spec, consumed),
            Negotiation::NeedMoreData => panic!("expected a complete spec"),
        }
    }

    #[test]
    fn test_parses_every_operation() {
        let (spec, consumed) = complete(&[0x01, 0x02, 0x7b, 0x03, 0x04, 0x10, 0x05, 0x00]);
        assert_eq!(consumed, 8);
        assert_eq!(
            spec.operations(),
            &[
                CipherOperation::ReverseBits,
                CipherOperation::XorConstant(0x7b),
                CipherOperation::XorPosition,
                CipherOperation::AddConstant(0x10),
                CipherOperation::AddPosition,
            ]
        );
    }

    #[test]
    fn test_stops_at_terminator() {
        let (_, consumed) = complete(&[0x02, 0x01, 0x00, 0xAA, 0xBB, 0x00]);
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_zero_operand_is_not_terminator() {
        let (spec, consumed) = complete(&[0x02, 0x00, 0x05, 0x00]);
        assert_eq!(consumed, 4);
        assert_eq!(
            spec.operations(),
            &[CipherOperation::XorConstant(0), CipherOperation::AddPosition]
        );
    }

    #[test]
    fn test_need_more_data() {
        assert_eq!(negotiate(&[]).unwrap(), Negotiation::NeedMoreData);
        assert_eq!(negotiate(&[0x01, 0x05]).unwrap(), Negotiation::NeedMoreData);
        // Operand not yet arrived
        assert_eq!(negotiate(&[0x01, 0x02]).unwrap(), Negotiation::NeedMoreData);
    }

    #[test]
    fn test_empty_spec_is_noop() {
        assert!(matches!(negotiate(&[0x00]), Err(ProtocolError::NoOpCipher)));
    }

    #[test]
    fn test_identity_spec_is_noop() {
        assert!(matches!(
            negotiate(&[0x02, 0x00, 0x00]),
            Err(ProtocolError::NoOpCipher)
        ));
        assert!(matches!(
            negotiate(&[0x01, 0x01, 0x00]),
            Err(ProtocolError::NoOpCipher)
        ));
    }

    #[test]
    fn test_unknown_opcode() {
        assert!(matches!(
            negotiate(&[0x06]),
            Err(ProtocolError::InvalidOperation(0x06))
        ));
        // Rejected as soon as it is seen, without waiting for the terminator
        assert!(matches!(
            negotiate(&[0x01, 0xFF, 0x03]),
            Err(ProtocolError::InvalidOperation(0xFF))
        ));
    }

    #[test]
    fn test_roundtrips_serialized_spec() {
        let original = CipherSpec::new(vec![
            CipherOperation::AddConstant(3),
            CipherOperation::XorPosition,
        ])
        .unwrap();
        let (spec, consumed) = complete(&original.to_bytes());
        assert_eq!(spec, original);
        assert_eq!(consumed, original.wire_len());
    }

    #[test]
    fn test_resumes_across_chunks() {
        let mut negotiator = Negotiator::new();
        assert_eq!(negotiator.feed(&[0x01, 0x02]).unwrap(), Negotiation::NeedMoreData);
        assert_eq!(negotiator.consumed(), 2);
        // Operand arrives in the next chunk
        assert_eq!(negotiator.feed(&[0x00]).unwrap(), Negotiation::NeedMoreData);
        match negotiator.feed(&[0x05, 0x00, 0xAA]).unwrap() {
            Negotiation::Complete { spec, consumed } => {
                assert_eq!(consumed, 5);
                assert_eq!(
                    spec.operations(),
                    &[
                        CipherOperation::ReverseBits,
                        CipherOperation::XorConstant(0),
                        CipherOperation::AddPosition,
                    ]
                );
            }
            Negotiation::NeedMoreData => panic!("expected a complete spec"),
        }
    }

    #[test]
    fn test_spec_at_bound_is_accepted() {
        let mut negotiator = Negotiator::with_max_spec_length(4);
        assert!(matches!(
            negotiator.feed(&[0x02, 0x05, 0x01, 0x00]),
            Ok(Negotiation::Complete { consumed: 4, .. })
        ));
    }

    #[test]
    fn test_spec_over_bound_is_rejected() {
        let mut negotiator = Negotiator::with_max_spec_length(4);
        assert_eq!(negotiator.feed(&[0x01, 0x01, 0x01, 0x05]).unwrap(), Negotiation::NeedMoreData);
        assert!(matches!(
            negotiator.feed(&[0x00]),
            Err(ProtocolError::OversizedSpec(4))
        ));
    }

    #[test]
    fn test_default_bound_applies_to_long_specs() {
        let long = vec![0x01; MAX_SPEC_LENGTH + 1];
        assert!(matches!(
            negotiate(&long),
            Err(ProtocolError::OversizedSpec(MAX_SPEC_LENGTH))
        ));
    }
}
