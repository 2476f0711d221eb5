use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::codec::Framed;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

use crate::config::{NetworkConfig, ServiceKind};
use crate::core::cipher::CipherSpec;
use crate::core::codec::CipherCodec;
use crate::error::Result;
use crate::protocol::price_record::PriceRecordHandler;
use crate::protocol::selection::SelectionHandler;
use crate::protocol::Session;
use crate::utils::metrics::global_metrics;

/// Start a TCP server that stops on CTRL+C
#[instrument(skip(config), fields(address = %config.server.address))]
pub async fn start_server(config: NetworkConfig) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    start_server_with_shutdown(config, shutdown_rx).await
}

/// Bind the configured address and serve until `shutdown_rx` fires
#[instrument(skip(config, shutdown_rx), fields(address = %config.server.address))]
pub async fn start_server_with_shutdown(
    config: NetworkConfig,
    shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let listener = TcpListener::bind(&config.server.address).await?;
    serve(listener, config, shutdown_rx).await
}

/// Accept connections on an already bound listener, one session per connection
pub async fn serve(
    listener: TcpListener,
    config: NetworkConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let local_addr = listener.local_addr()?;
    let max_connections = config.server.max_connections;
    let service = config.server.service;
    info!(address = %local_addr, ?service, "Listening");

    let slots = Arc::new(Semaphore::new(max_connections));

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down server. Waiting for connections to close...");

                let timeout = tokio::time::sleep(config.server.shutdown_timeout);
                tokio::pin!(timeout);

                loop {
                    let active = max_connections - slots.available_permits();
                    if active == 0 {
                        info!("All connections closed, shutting down");
                        break;
                    }
                    tokio::select! {
                        _ = &mut timeout => {
                            warn!(connections = active, "Shutdown timeout reached, forcing exit");
                            break;
                        }
                        _ = tokio::time::sleep(Duration::from_millis(100)) => {
                            debug!(connections = active, "Waiting for connections to close");
                        }
                    }
                }

                global_metrics().log_metrics();
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((mut stream, peer)) => {
                        let Ok(permit) = slots.clone().try_acquire_owned() else {
                            warn!(peer = %peer, max_connections, "Connection limit reached, rejecting");
                            continue;
                        };
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(error = %e, "Failed to set TCP_NODELAY");
                        }

                        let session_config = config.session.clone();
                        tokio::spawn(
                            async move {
                                let _permit = permit;
                                debug!("Connection established");
                                let result = match service {
                                    ServiceKind::Selection => {
                                        Session::ciphered(SelectionHandler::new(), session_config)
                                            .run(&mut stream)
                                            .await
                                    }
                                    ServiceKind::PriceRecords => {
                                        Session::plaintext(PriceRecordHandler::new(), session_config)
                                            .run(&mut stream)
                                            .await
                                    }
                                };
                                debug!(ok = result.is_ok(), "Connection closed");
                            }
                            .instrument(info_span!("connection", peer = %peer)),
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}

/// Connect to a selection server and negotiate `spec`
///
/// The returned stream sends lines (without terminator) and yields response
/// lines, both passed through the cipher.
#[instrument(skip(addr, spec))]
pub async fn connect<A: ToSocketAddrs>(
    addr: A,
    spec: &CipherSpec,
) -> Result<Framed<TcpStream, CipherCodec>> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(&spec.to_bytes()).await?;
    debug!(ops = spec.operations().len(), "Cipher spec sent");
    Ok(Framed::new(stream, CipherCodec::new(spec.clone())))
}
