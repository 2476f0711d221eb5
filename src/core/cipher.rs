//! # Cipher Pipeline
//!
//! Position-dependent byte cipher negotiated per connection.
//!
//! A [`CipherSpec`] is an ordered list of [`CipherOperation`]s. Encoding
//! applies the operations in spec order; decoding applies their inverses in
//! reverse order. The position-dependent operations read a running counter
//! that spans the whole connection, one counter per direction, so the output
//! never depends on how the stream was chunked:
//!
//! ```rust
//! use cipherline::core::cipher::{CipherOperation, CipherPipeline, CipherSpec};
//!
//! let spec = CipherSpec::new(vec![CipherOperation::AddPosition]).unwrap();
//!
//! let mut whole = CipherPipeline::new(spec.clone());
//! let mut data = *b"hello world";
//! whole.encode(&mut data);
//!
//! let mut chunked = CipherPipeline::new(spec);
//! let (mut a, mut b) = (*b"hello", *b" world");
//! chunked.encode(&mut a);
//! chunked.encode(&mut b);
//!
//! assert_eq!(&data[..5], &a);
//! assert_eq!(&data[5..], &b);
//! ```

use crate::error::{ProtocolError, Result};
use rand::Rng;

/// Spec terminator
pub const OP_END: u8 = 0x00;
/// Reverse the bit order of each byte
pub const OP_REVERSE_BITS: u8 = 0x01;
/// XOR with a constant operand
pub const OP_XOR_CONSTANT: u8 = 0x02;
/// XOR with the stream position
pub const OP_XOR_POSITION: u8 = 0x03;
/// Add a constant operand
pub const OP_ADD_CONSTANT: u8 = 0x04;
/// Add the stream position
pub const OP_ADD_POSITION: u8 = 0x05;

/// Size of the random probe used to reject identity specs
pub const NOOP_PROBE_LEN: usize = 32;

/// A single reversible byte transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherOperation {
    ReverseBits,
    XorConstant(u8),
    XorPosition,
    AddConstant(u8),
    AddPosition,
}

impl CipherOperation {
    /// Wire opcode of this operation.
    pub fn opcode(&self) -> u8 {
        match self {
            CipherOperation::ReverseBits => OP_REVERSE_BITS,
            CipherOperation::XorConstant(_) => OP_XOR_CONSTANT,
            CipherOperation::XorPosition => OP_XOR_POSITION,
            CipherOperation::AddConstant(_) => OP_ADD_CONSTANT,
            CipherOperation::AddPosition => OP_ADD_POSITION,
        }
    }

    /// Operand byte, for the operations that carry one.
    pub fn operand(&self) -> Option<u8> {
        match self {
            CipherOperation::XorConstant(n) | CipherOperation::AddConstant(n) => Some(*n),
            _ => None,
        }
    }

    /// Number of bytes this operation occupies on the wire.
    pub fn wire_len(&self) -> usize {
        1 + usize::from(self.operand().is_some())
    }

    /// Forward transform. `pos` is the stream position of `data[0]`.
    fn encode(self, data: &mut [u8], pos: u64) {
        match self {
            CipherOperation::ReverseBits => {
                data.iter_mut().for_each(|b| *b = b.reverse_bits());
            }
            CipherOperation::XorConstant(n) => {
                data.iter_mut().for_each(|b| *b ^= n);
            }
            CipherOperation::XorPosition => {
                for (i, b) in data.iter_mut().enumerate() {
                    *b ^= position_byte(pos, i);
                }
            }
            CipherOperation::AddConstant(n) => {
                data.iter_mut().for_each(|b| *b = b.wrapping_add(n));
            }
            CipherOperation::AddPosition => {
                for (i, b) in data.iter_mut().enumerate() {
                    *b = b.wrapping_add(position_byte(pos, i));
                }
            }
        }
    }

    /// Inverse transform. `pos` is the stream position of `data[0]`.
    fn decode(self, data: &mut [u8], pos: u64) {
        match self {
            // Involutions
            CipherOperation::ReverseBits
            | CipherOperation::XorConstant(_)
            | CipherOperation::XorPosition => self.encode(data, pos),
            CipherOperation::AddConstant(n) => {
                data.iter_mut().for_each(|b| *b = b.wrapping_sub(n));
            }
            CipherOperation::AddPosition => {
                for (i, b) in data.iter_mut().enumerate() {
                    *b = b.wrapping_sub(position_byte(pos, i));
                }
            }
        }
    }
}

#[inline]
fn position_byte(pos: u64, i: usize) -> u8 {
    // (pos + i) mod 256
    (pos.wrapping_add(i as u64) & 0xFF) as u8
}

/// An ordered, non-empty, non-identity list of cipher operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherSpec {
    operations: Vec<CipherOperation>,
}

impl CipherSpec {
    /// Build a spec from operations, rejecting empty and identity specs.
    ///
    /// # Errors
    /// Returns `ProtocolError::NoOpCipher` if the operations leave a random
    /// probe unchanged.
    pub fn new(operations: Vec<CipherOperation>) -> Result<Self> {
        if operations.is_empty() || leaves_probe_unchanged(&operations) {
            return Err(ProtocolError::NoOpCipher);
        }
        Ok(Self { operations })
    }

    /// Operations in encode order.
    pub fn operations(&self) -> &[CipherOperation] {
        &self.operations
    }

    /// Serialize to the negotiation wire format, terminator included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        for op in &self.operations {
            out.push(op.opcode());
            if let Some(n) = op.operand() {
                out.push(n);
            }
        }
        out.push(OP_END);
        out
    }

    /// Length of the serialized spec, terminator included.
    pub fn wire_len(&self) -> usize {
        self.operations.iter().map(CipherOperation::wire_len).sum::<usize>() + 1
    }
}

/// Encode a fresh random probe from position 0 and compare it to itself.
///
/// A single sample can miss specs that are the identity only on some
/// inputs; this is a known limitation of the check.
pub(crate) fn leaves_probe_unchanged(operations: &[CipherOperation]) -> bool {
    let mut probe = [0u8; NOOP_PROBE_LEN];
    rand::rng().fill(&mut probe);

    let mut encoded = probe;
    for op in operations {
        op.encode(&mut encoded, 0);
    }
    encoded == probe
}

/// Running stream positions for the two directions of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CipherState {
    /// Bytes encoded so far (outgoing direction)
    pub encode_position: u64,
    /// Bytes decoded so far (incoming direction)
    pub decode_position: u64,
}

/// Applies a negotiated spec to a connection's traffic.
#[derive(Debug, Clone)]
pub struct CipherPipeline {
    spec: CipherSpec,
    state: CipherState,
}

impl CipherPipeline {
    /// Both positions start at zero.
    pub fn new(spec: CipherSpec) -> Self {
        Self {
            spec,
            state: CipherState::default(),
        }
    }

    pub fn spec(&self) -> &CipherSpec {
        &self.spec
    }

    pub fn state(&self) -> CipherState {
        self.state
    }

    /// Encode `data` in place and advance the encode position.
    pub fn encode(&mut self, data: &mut [u8]) {
        let pos = self.state.encode_position;
        for op in &self.spec.operations {
            op.encode(data, pos);
        }
        self.state.encode_position += data.len() as u64;
    }

    /// Decode `data` in place and advance the decode position.
    pub fn decode(&mut self, data: &mut [u8]) {
        let pos = self.state.decode_position;
        for op in self.spec.operations.iter().rev() {
            op.decode(data, pos);
        }
        self.state.decode_position += data.len() as u64;
    }
}
