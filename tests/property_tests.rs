//! Property-based tests using proptest
//!
//! These tests validate cipher and framing invariants across a wide range of
//! randomly generated specs, payloads and chunk boundaries.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use cipherline::config::SessionConfig;
use cipherline::core::cipher::{CipherOperation, CipherPipeline, CipherSpec};
use cipherline::core::frame_reader::{FrameMode, FrameReader};
use cipherline::core::negotiation::{negotiate, Negotiation};
use cipherline::protocol::selection::SelectionHandler;
use cipherline::protocol::Session;
use proptest::prelude::*;

fn operation() -> impl Strategy<Value = CipherOperation> {
    prop_oneof![
        Just(CipherOperation::ReverseBits),
        any::<u8>().prop_map(CipherOperation::XorConstant),
        Just(CipherOperation::XorPosition),
        any::<u8>().prop_map(CipherOperation::AddConstant),
        Just(CipherOperation::AddPosition),
    ]
}

/// Specs the negotiator would accept
fn valid_spec() -> impl Strategy<Value = CipherSpec> {
    prop::collection::vec(operation(), 1..8)
        .prop_filter_map("identity spec", |ops| CipherSpec::new(ops).ok())
}

// Property: decode(encode(bytes)) restores the input when both positions start at zero
proptest! {
    #[test]
    fn prop_decode_inverts_encode(
        spec in valid_spec(),
        data in prop::collection::vec(any::<u8>(), 0..2048),
    ) {
        let mut sender = CipherPipeline::new(spec.clone());
        let mut receiver = CipherPipeline::new(spec);

        let mut wire = data.clone();
        sender.encode(&mut wire);
        receiver.decode(&mut wire);

        prop_assert_eq!(wire, data);
    }
}

// Property: encoding in two calls matches encoding in one call, for any split point
proptest! {
    #[test]
    fn prop_encode_chunking_invariant(
        spec in valid_spec(),
        data in prop::collection::vec(any::<u8>(), 0..1024),
        split in any::<prop::sample::Index>(),
    ) {
        let at = split.index(data.len() + 1);

        let mut whole = data.clone();
        CipherPipeline::new(spec.clone()).encode(&mut whole);

        let mut chunked = CipherPipeline::new(spec);
        let (mut a, mut b) = (data[..at].to_vec(), data[at..].to_vec());
        chunked.encode(&mut a);
        chunked.encode(&mut b);
        a.extend(b);

        prop_assert_eq!(a, whole);
    }
}

// Property: decoding is chunking invariant as well
proptest! {
    #[test]
    fn prop_decode_chunking_invariant(
        spec in valid_spec(),
        data in prop::collection::vec(any::<u8>(), 0..1024),
        sizes in prop::collection::vec(1usize..64, 1..32),
    ) {
        let mut whole = data.clone();
        CipherPipeline::new(spec.clone()).decode(&mut whole);

        let mut chunked = CipherPipeline::new(spec);
        let mut out = Vec::with_capacity(data.len());
        let mut rest = &data[..];
        for size in sizes.iter().cycle() {
            if rest.is_empty() {
                break;
            }
            let n = (*size).min(rest.len());
            let mut chunk = rest[..n].to_vec();
            chunked.decode(&mut chunk);
            out.extend(chunk);
            rest = &rest[n..];
        }

        prop_assert_eq!(out, whole);
        prop_assert_eq!(chunked.state().decode_position, data.len() as u64);
    }
}

// Property: every accepted spec survives serialization and renegotiation
proptest! {
    #[test]
    fn prop_negotiation_roundtrip(
        spec in valid_spec(),
        trailing in prop::collection::vec(any::<u8>(), 0..16),
    ) {
        let mut wire = spec.to_bytes();
        wire.extend(&trailing);

        match negotiate(&wire) {
            Ok(Negotiation::Complete { spec: parsed, consumed }) => {
                prop_assert_eq!(consumed, spec.wire_len());
                prop_assert_eq!(parsed, spec);
            }
            other => prop_assert!(false, "unexpected negotiation result: {:?}", other),
        }
    }
}

// Property: negotiation never panics on arbitrary input
proptest! {
    #[test]
    fn prop_negotiation_never_panics(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = negotiate(&data);
    }
}

// Property: line framing yields the same frames however the stream is chunked
proptest! {
    #[test]
    fn prop_line_framing_chunk_invariant(
        lines in prop::collection::vec(prop::collection::vec(1u8..=255, 0..40), 0..20),
        sizes in prop::collection::vec(1usize..17, 1..16),
    ) {
        let mut stream = Vec::new();
        for line in &lines {
            stream.extend(line.iter().map(|&b| if b == b'\n' { b' ' } else { b }));
            stream.push(b'\n');
        }
        let expected: Vec<Vec<u8>> = stream
            .split(|&b| b == b'\n')
            .take(lines.len())
            .map(<[u8]>::to_vec)
            .collect();

        let mut reader = FrameReader::new();
        let mut frames = Vec::new();
        let mut rest = &stream[..];
        for size in sizes.iter().cycle() {
            if rest.is_empty() {
                break;
            }
            let n = (*size).min(rest.len());
            reader.push(&rest[..n]);
            rest = &rest[n..];
            while let Some(frame) = reader.next_frame(FrameMode::LINE) {
                frames.push(reader.take(frame).expect("frame starts at consumed").to_vec());
            }
        }

        prop_assert_eq!(frames, expected);
        prop_assert_eq!(reader.pending(), 0);
    }
}

// Property: a session answers identically whatever the read boundaries
proptest! {
    #[test]
    fn prop_session_chunk_invariant(
        spec in valid_spec(),
        counts in prop::collection::vec((0u32..1000, 0u8..26), 1..6),
        sizes in prop::collection::vec(1usize..9, 1..8),
    ) {
        let line: Vec<u8> = counts
            .iter()
            .map(|(n, c)| format!("{n}x{}", (b'a' + c) as char))
            .collect::<Vec<_>>()
            .join(",")
            .into_bytes();
        let mut plain = line.clone();
        plain.push(b'\n');
        plain.extend_from_slice(&line);
        plain.push(b'\n');

        let mut client = CipherPipeline::new(spec.clone());
        let mut body = plain.clone();
        client.encode(&mut body);
        let mut wire = spec.to_bytes();
        wire.extend(body);

        let run = |chunks: &[usize]| {
            let mut session = Session::ciphered(SelectionHandler::new(), SessionConfig::default());
            let mut out = Vec::new();
            let mut rest = &wire[..];
            for size in chunks.iter().cycle() {
                if rest.is_empty() {
                    break;
                }
                let n = (*size).min(rest.len());
                session.ingest(&rest[..n]).expect("valid input");
                while let Some(r) = session.next_response().expect("valid request") {
                    out.extend(r);
                }
                rest = &rest[n..];
            }
            out
        };

        let whole = run(&[wire.len()]);
        let chunked = run(&sizes);
        prop_assert_eq!(&whole, &chunked);

        // Both responses decode to the winning field
        let mut decoded = whole;
        client.decode(&mut decoded);
        let best = counts.iter().map(|(n, _)| *n).max().unwrap();
        let first = counts.iter().position(|(n, _)| *n == best).unwrap();
        let winner = format!("{}x{}\n", counts[first].0, (b'a' + counts[first].1) as char);
        prop_assert_eq!(decoded, winner.repeat(2).into_bytes());
    }
}
