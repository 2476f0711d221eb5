//! # Core Protocol Components
//!
//! Cipher negotiation, the cipher pipeline and incremental framing.
//!
//! ## Components
//! - **Cipher**: operations, specs and the two-direction pipeline
//! - **Negotiation**: parsing the spec prefix of a connection
//! - **Frame Reader**: delimiter and fixed-size framing over a two-cursor buffer
//! - **Codec**: Tokio codec for the client side of a negotiated line stream
//!
//! ## Dataflow
//! ```text
//! raw ─► negotiate (once) ─► decode ─► FrameReader ─► handler ─► encode ─► raw
//! ```

pub mod cipher;
pub mod codec;
pub mod frame_reader;
pub mod negotiation;
