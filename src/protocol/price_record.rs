//! # Price Records
//!
//! Binary record protocol built on fixed-size framing.
//!
//! ## Wire Format
//! ```text
//! [Type(1)] [A: i32 BE] [B: i32 BE]        (9 bytes, no delimiter)
//!
//! 'I' timestamp price     insert, no response
//! 'Q' mintime  maxtime    respond with mean price in range as i32 BE
//! ```
//!
//! The store lives for one connection only.

use std::collections::BTreeMap;

use crate::core::frame_reader::FrameMode;
use crate::error::{ProtocolError, Result};
use crate::protocol::handler::FrameHandler;
use tracing::trace;

/// Size of one record on the wire
pub const RECORD_SIZE: usize = 9;

const TYPE_INSERT: u8 = b'I';
const TYPE_QUERY: u8 = b'Q';

/// A decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceRecord {
    Insert { timestamp: i32, price: i32 },
    Query { min_time: i32, max_time: i32 },
}

impl PriceRecord {
    /// Decode a record from exactly [`RECORD_SIZE`] bytes.
    ///
    /// # Errors
    /// - `ProtocolError::UnknownRecordType` for a type byte other than `I` or `Q`
    /// - `ProtocolError::MalformedRequest` if `bytes` has the wrong length
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record: &[u8; RECORD_SIZE] = bytes.try_into().map_err(|_| {
            ProtocolError::MalformedRequest(format!(
                "record must be {RECORD_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;

        let a = i32::from_be_bytes([record[1], record[2], record[3], record[4]]);
        let b = i32::from_be_bytes([record[5], record[6], record[7], record[8]]);

        match record[0] {
            TYPE_INSERT => Ok(PriceRecord::Insert {
                timestamp: a,
                price: b,
            }),
            TYPE_QUERY => Ok(PriceRecord::Query {
                min_time: a,
                max_time: b,
            }),
            other => Err(ProtocolError::UnknownRecordType(other)),
        }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let (kind, a, b) = match *self {
            PriceRecord::Insert { timestamp, price } => (TYPE_INSERT, timestamp, price),
            PriceRecord::Query { min_time, max_time } => (TYPE_QUERY, min_time, max_time),
        };
        let mut out = [0u8; RECORD_SIZE];
        out[0] = kind;
        out[1..5].copy_from_slice(&a.to_be_bytes());
        out[5..9].copy_from_slice(&b.to_be_bytes());
        out
    }
}

/// Per-connection price store answering range queries.
#[derive(Debug, Default)]
pub struct PriceRecordHandler {
    prices: BTreeMap<i32, i32>,
}

impl PriceRecordHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a price; the first price seen for a timestamp is kept.
    pub fn insert(&mut self, timestamp: i32, price: i32) {
        self.prices.entry(timestamp).or_insert(price);
    }

    /// Mean of prices with `min_time <= timestamp <= max_time`, truncated; 0 if none.
    pub fn mean(&self, min_time: i32, max_time: i32) -> i32 {
        if min_time > max_time {
            return 0;
        }
        let (sum, count) = self
            .prices
            .range(min_time..=max_time)
            .fold((0i64, 0i64), |(sum, count), (_, &price)| {
                (sum + i64::from(price), count + 1)
            });
        if count == 0 {
            0
        } else {
            // Mean of i32 values always fits in i32
            (sum / count) as i32
        }
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl FrameHandler for PriceRecordHandler {
    fn frame_mode(&self) -> FrameMode {
        FrameMode::FixedSize(RECORD_SIZE)
    }

    fn handle_frame(&mut self, frame: &[u8]) -> Result<Option<Vec<u8>>> {
        match PriceRecord::from_bytes(frame)? {
            PriceRecord::Insert { timestamp, price } => {
                trace!(timestamp, price, "Insert");
                self.insert(timestamp, price);
                Ok(None)
            }
            PriceRecord::Query { min_time, max_time } => {
                let mean = self.mean(min_time, max_time);
                trace!(min_time, max_time, mean, "Query");
                Ok(Some(mean.to_be_bytes().to_vec()))
            }
        }
    }
}
