//! # Transport Layer
//!
//! The byte-stream collaborator a session runs on, plus a TCP server and a
//! client helper.
//!
//! Any ordered, bidirectional Tokio stream is a transport: reads deliver
//! chunks (a zero-length read is end-of-stream) and writes are awaited until
//! the stream accepts them. Sessions never create sockets themselves.

use tokio::io::{AsyncRead, AsyncWrite};

pub mod tcp;

pub use tcp::{connect, serve, start_server, start_server_with_shutdown};

/// Ordered byte stream a [`Session`](crate::protocol::Session) can run on.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}
