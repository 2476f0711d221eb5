//! # Session Engine
//!
//! Drives one connection through its lifetime:
//!
//! ```text
//! AwaitingCipherSpec ──spec ok──► Streaming ──EOF / error──► Closed
//!         │                                                    ▲
//!         └──────────────── negotiation error ─────────────────┘
//! ```
//!
//! The engine itself is transport-agnostic: [`Session::ingest`] accepts raw
//! bytes and [`Session::next_response`] yields encoded responses one frame
//! at a time. [`Session::run`] wires both to an async transport, awaiting
//! every write before scanning for the next frame.
//!
//! Plaintext sessions skip negotiation and start in `Streaming`.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument, trace, warn};

use crate::config::SessionConfig;
use crate::core::cipher::CipherPipeline;
use crate::core::frame_reader::{FrameMode, FrameReader};
use crate::core::negotiation::{Negotiation, Negotiator};
use crate::error::{ProtocolError, Result};
use crate::protocol::handler::FrameHandler;
use crate::transport::Transport;
use crate::utils::metrics::{global_metrics, Timer};
use crate::utils::timeout::{with_optional_timeout, with_timeout_error};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accumulating the cipher spec; nothing is treated as plaintext yet
    AwaitingCipherSpec,
    /// Decoding input, answering frames
    Streaming,
    /// Terminal; buffers released
    Closed,
}

/// Per-connection protocol engine.
pub struct Session<H> {
    handler: H,
    state: SessionState,
    /// `None` for plaintext sessions and before negotiation completes
    pipeline: Option<CipherPipeline>,
    /// Spec parsing progress; each spec byte is examined once
    negotiator: Negotiator,
    decoded: FrameReader,
    mode: FrameMode,
    config: SessionConfig,
}

impl<H: FrameHandler> Session<H> {
    /// Session that negotiates a cipher spec before streaming.
    pub fn ciphered(handler: H, config: SessionConfig) -> Self {
        Self::with_state(handler, config, SessionState::AwaitingCipherSpec)
    }

    /// Session without a cipher; starts streaming immediately.
    pub fn plaintext(handler: H, config: SessionConfig) -> Self {
        Self::with_state(handler, config, SessionState::Streaming)
    }

    fn with_state(handler: H, config: SessionConfig, state: SessionState) -> Self {
        let mode = handler.frame_mode();
        Self {
            handler,
            state,
            pipeline: None,
            negotiator: Negotiator::with_max_spec_length(config.max_spec_length),
            decoded: FrameReader::with_capacity(config.read_buffer_size),
            mode,
            config,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn pipeline(&self) -> Option<&CipherPipeline> {
        self.pipeline.as_ref()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Feed raw bytes read from the transport.
    ///
    /// # Errors
    /// Negotiation errors, oversized specs included, close the session.
    pub fn ingest(&mut self, chunk: &[u8]) -> Result<()> {
        match self.state {
            SessionState::Closed => Err(ProtocolError::ConnectionClosed),
            SessionState::AwaitingCipherSpec => self.negotiate(chunk),
            SessionState::Streaming => {
                self.accept_ciphertext(chunk);
                Ok(())
            }
        }
    }

    fn negotiate(&mut self, chunk: &[u8]) -> Result<()> {
        let before = self.negotiator.consumed();
        match self.negotiator.feed(chunk) {
            Ok(Negotiation::Complete { spec, consumed }) => {
                global_metrics().negotiation_success();
                debug!(ops = ?spec.operations(), "Cipher negotiated");

                self.negotiator = Negotiator::with_max_spec_length(0);
                self.pipeline = Some(CipherPipeline::new(spec));
                self.state = SessionState::Streaming;
                self.accept_ciphertext(&chunk[consumed - before..]);
                Ok(())
            }
            Ok(Negotiation::NeedMoreData) => {
                trace!(consumed = self.negotiator.consumed(), "Cipher spec incomplete");
                Ok(())
            }
            Err(e) => {
                global_metrics().negotiation_failed();
                Err(self.fail(e))
            }
        }
    }

    fn accept_ciphertext(&mut self, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        match self.pipeline.as_mut() {
            Some(pipeline) => {
                let mut plain = chunk.to_vec();
                pipeline.decode(&mut plain);
                self.decoded.push(&plain);
            }
            None => self.decoded.push(chunk),
        }
    }

    /// Interpret buffered frames until one produces a response.
    ///
    /// Returns the response already encoded for the wire, or `None` once no
    /// complete frame is buffered.
    ///
    /// # Errors
    /// A handler error or an oversized pending frame closes the session.
    pub fn next_response(&mut self) -> Result<Option<Vec<u8>>> {
        if self.state != SessionState::Streaming {
            return Ok(None);
        }

        while let Some(frame) = self.decoded.next_frame(self.mode) {
            global_metrics().frame_processed();
            let reply = self.handler.handle_frame(self.decoded.peek(&frame));
            let reply = match reply {
                Ok(reply) => reply,
                Err(e) => {
                    global_metrics().request_error();
                    return Err(self.fail(e));
                }
            };
            self.decoded.consume(frame.end());

            if let Some(mut response) = reply {
                if let Some(pipeline) = self.pipeline.as_mut() {
                    pipeline.encode(&mut response);
                }
                return Ok(Some(response));
            }
        }

        if self.decoded.pending() > self.config.max_frame_length {
            return Err(self.fail(ProtocolError::OversizedFrame(self.decoded.pending())));
        }
        Ok(None)
    }

    /// Move to `Closed` and release buffers.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.negotiator = Negotiator::with_max_spec_length(0);
        self.decoded = FrameReader::with_capacity(0);
    }

    fn fail(&mut self, error: ProtocolError) -> ProtocolError {
        self.close();
        error
    }

    /// Serve the connection until end-of-stream or a fatal error.
    ///
    /// Responses are written and flushed before the next frame is scanned.
    /// Any partially buffered frame is discarded when the session ends.
    #[instrument(skip_all, level = "debug")]
    pub async fn run<T: Transport>(mut self, io: &mut T) -> Result<()> {
        let _timer = Timer::start("session");
        let metrics = global_metrics();
        metrics.session_opened();

        let result = self.serve(io).await;
        self.close();
        metrics.session_closed();

        match &result {
            Ok(()) => debug!("Session finished"),
            Err(e) if e.is_negotiation_error() || e.is_request_error() => {
                debug!(error = %e, "Session rejected peer input");
            }
            Err(e) => {
                metrics.connection_error();
                warn!(error = %e, "Session terminated");
            }
        }

        // Best effort: the peer may already be gone
        let _ = io.shutdown().await;
        result
    }

    async fn serve<T: Transport>(&mut self, io: &mut T) -> Result<()> {
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];
        let read_timeout = self.config.read_timeout;
        let write_timeout = self.config.write_timeout;

        loop {
            let n = with_optional_timeout(
                async { io.read(&mut buf).await.map_err(ProtocolError::from) },
                read_timeout,
            )
            .await?;

            if n == 0 {
                if self.state == SessionState::AwaitingCipherSpec {
                    debug!(
                        consumed = self.negotiator.consumed(),
                        "Peer closed before cipher spec completed"
                    );
                }
                return Ok(());
            }
            global_metrics().bytes_read(n as u64);

            self.ingest(&buf[..n])?;

            let mut wrote = false;
            while let Some(response) = self.next_response()? {
                with_timeout_error(
                    async { io.write_all(&response).await.map_err(ProtocolError::from) },
                    write_timeout,
                )
                .await?;
                global_metrics().response_sent(response.len() as u64);
                wrote = true;
            }
            if wrote {
                with_timeout_error(
                    async { io.flush().await.map_err(ProtocolError::from) },
                    write_timeout,
                )
                .await?;
            }
        }
    }
}
