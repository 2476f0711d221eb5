//! # Selection Requests
//!
//! A request line lists counted items; the response repeats the item with
//! the largest count.
//!
//! ```text
//! request:  <digits>x<token>(,<digits>x<token>)*\n
//! response: <winning field>\n
//! ```
//!
//! Only a strictly larger count replaces the current best, so the first of
//! several equal maxima wins.

use crate::core::frame_reader::FrameMode;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::handler::FrameHandler;

const FIELD_SEPARATOR: u8 = b',';
const COUNT_SEPARATOR: u8 = b'x';
const LINE_TERMINATOR: u8 = b'\n';

/// One parsed field, borrowing the request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub count: u64,
    pub token: &'a [u8],
    /// The field exactly as it appeared on the line
    pub raw: &'a [u8],
}

/// Parse a single `<digits>x<token>` field.
pub fn parse_field(raw: &[u8]) -> Result<Field<'_>> {
    let sep = raw
        .iter()
        .position(|&b| b == COUNT_SEPARATOR)
        .ok_or_else(|| malformed(constants::ERR_MISSING_SEPARATOR))?;

    let digits = &raw[..sep];
    if digits.is_empty() {
        return Err(malformed(constants::ERR_EMPTY_COUNT));
    }

    let mut count: u64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(malformed(constants::ERR_NON_DIGIT_COUNT));
        }
        count = count
            .checked_mul(10)
            .and_then(|c| c.checked_add(u64::from(b - b'0')))
            .ok_or_else(|| malformed(constants::ERR_COUNT_OVERFLOW))?;
    }

    Ok(Field {
        count,
        token: &raw[sep + 1..],
        raw,
    })
}

/// Pick the field with the largest count from a request line (terminator excluded).
///
/// # Errors
/// `ProtocolError::MalformedRequest` if any field is malformed or the line is empty.
pub fn select(line: &[u8]) -> Result<Field<'_>> {
    if line.is_empty() {
        return Err(malformed(constants::ERR_EMPTY_REQUEST));
    }

    let mut best: Option<Field<'_>> = None;
    for raw in line.split(|&b| b == FIELD_SEPARATOR) {
        let field = parse_field(raw)?;
        if best.map_or(true, |current| field.count > current.count) {
            best = Some(field);
        }
    }

    best.ok_or_else(|| malformed(constants::ERR_EMPTY_REQUEST))
}

fn malformed(reason: &str) -> ProtocolError {
    ProtocolError::MalformedRequest(reason.to_string())
}

/// Line handler answering selection requests.
#[derive(Debug, Default)]
pub struct SelectionHandler;

impl SelectionHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FrameHandler for SelectionHandler {
    fn frame_mode(&self) -> FrameMode {
        FrameMode::Delimited(LINE_TERMINATOR)
    }

    fn handle_frame(&mut self, frame: &[u8]) -> Result<Option<Vec<u8>>> {
        let winner = select(frame)?;
        let mut response = Vec::with_capacity(winner.raw.len() + 1);
        response.extend_from_slice(winner.raw);
        response.push(LINE_TERMINATOR);
        Ok(Some(response))
    }
}
