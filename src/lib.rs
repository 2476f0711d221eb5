//! # cipherline
//!
//! Streaming protocol core that sits directly on a raw byte connection.
//!
//! Every connection starts with a client-chosen cipher spec: an ordered list
//! of reversible, possibly position-dependent byte transforms. Once it is
//! negotiated, all traffic in both directions passes through the cipher,
//! frames are extracted from the decoded stream however the bytes happen to
//! be chunked, and each frame is answered by a protocol handler.
//!
//! ## Modules
//! - [`core`]: cipher operations and pipeline, negotiation, frame reader, client codec
//! - [`protocol`]: frame handlers and the session state machine
//! - [`transport`]: the transport seam, TCP server and client helper
//! - [`config`]: TOML / environment configuration
//! - [`utils`]: logging, metrics, timeouts
//!
//! ## Example
//! ```rust
//! use cipherline::config::SessionConfig;
//! use cipherline::core::cipher::{CipherOperation, CipherPipeline, CipherSpec};
//! use cipherline::protocol::selection::SelectionHandler;
//! use cipherline::protocol::Session;
//!
//! let spec = CipherSpec::new(vec![CipherOperation::XorConstant(1), CipherOperation::ReverseBits])
//!     .unwrap();
//!
//! // What a client puts on the wire
//! let mut client = CipherPipeline::new(spec.clone());
//! let mut line = b"4x dog,5x car\n".to_vec();
//! client.encode(&mut line);
//! let mut wire = spec.to_bytes();
//! wire.extend(line);
//!
//! let mut session = Session::ciphered(SelectionHandler::new(), SessionConfig::default());
//! session.ingest(&wire).unwrap();
//! let mut response = session.next_response().unwrap().unwrap();
//! client.decode(&mut response);
//! assert_eq!(response, b"5x car\n");
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use crate::core::cipher::{CipherOperation, CipherPipeline, CipherSpec};
pub use crate::error::{ProtocolError, Result};
