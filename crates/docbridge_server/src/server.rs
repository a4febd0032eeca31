//! TCP listener and per-connection loop.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{RpcServer, Session};
use bytes::BytesMut;
use docbridge_core::ErrorKind;
use docbridge_protocol::{decode_frame, encode_frame, ProtocolError, Request, Response};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

/// The DocBridge server.
///
/// Accepts TCP connections and serves each one on its own task. Requests
/// on a connection are handled strictly in order.
///
/// # Example
///
/// ```no_run
/// use docbridge_server::{DocServer, ServerConfig};
///
/// # async fn run() -> docbridge_server::ServerResult<()> {
/// let server = DocServer::new(ServerConfig::default().with_data_dir("/var/lib/docbridge"));
/// server.serve().await
/// # }
/// ```
pub struct DocServer {
    rpc: Arc<RpcServer>,
    limiter: Arc<Semaphore>,
}

impl DocServer {
    /// Creates a server.
    pub fn new(config: ServerConfig) -> Self {
        let limiter = Arc::new(Semaphore::new(config.max_connections.max(1)));
        Self {
            rpc: Arc::new(RpcServer::new(config)),
            limiter,
        }
    }

    /// Returns the request dispatcher.
    pub fn rpc(&self) -> &Arc<RpcServer> {
        &self.rpc
    }

    /// Binds the configured address and serves until an I/O error.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.rpc.config().bind_addr).await?;
        self.serve_until(listener, std::future::pending()).await
    }

    /// Serves connections from `listener` until `shutdown` completes.
    pub async fn serve_until(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> ServerResult<()> {
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "listening");
        tokio::pin!(shutdown);

        loop {
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = Arc::clone(&self.limiter).acquire_owned() => permit
                    .map_err(|e| ServerError::InvalidRequest(e.to_string()))?,
            };
            let (stream, peer) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => accepted?,
            };

            let rpc = Arc::clone(&self.rpc);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, rpc).await {
                    tracing::warn!(peer = %peer, error = %e, "connection error");
                }
                drop(permit);
            });
        }

        tracing::info!(addr = %local, "shutting down");
        self.rpc.shutdown();
        Ok(())
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    rpc: Arc<RpcServer>,
) -> ServerResult<()> {
    let max_frame_size = rpc.config().max_frame_size;
    let timeout = rpc.config().request_timeout;
    let mut session = Session::new();
    let mut buf = BytesMut::with_capacity(8 * 1024);
    tracing::info!(peer = %peer, session = %session.id(), "connection accepted");

    loop {
        let request = match decode_frame::<Request>(&mut buf, max_frame_size) {
            Ok(Some(request)) => request,
            Ok(None) => {
                if stream.read_buf(&mut buf).await? == 0 {
                    if !buf.is_empty() {
                        return Err(ProtocolError::ConnectionClosed.into());
                    }
                    tracing::debug!(peer = %peer, session = %session.id(), "connection closed");
                    return Ok(());
                }
                continue;
            }
            Err(e) => {
                // the stream cannot be resynchronized after a bad frame
                let response = ServerError::Protocol(e).to_response();
                send(&mut stream, &response).await?;
                return Ok(());
            }
        };

        let name = request.name();
        let worker = Arc::clone(&rpc);
        let outcome = run_blocking(peer, name, timeout, move || {
            let response = worker.handle(&mut session, request);
            (response, session)
        })
        .await;
        match outcome {
            Ok((response, returned)) => {
                session = returned;
                send(&mut stream, &response).await?;
            }
            Err(response) => {
                // the session went down with the handler
                send(&mut stream, &response).await?;
                return Ok(());
            }
        }
    }
}

/// Runs a request handler on the blocking pool and waits for it.
///
/// A handler still running after `timeout` is only reported: its changes
/// may already be committed, so the caller always gets its real outcome.
/// A panicking handler yields an internal error response.
async fn run_blocking<F>(
    peer: SocketAddr,
    name: &'static str,
    timeout: Duration,
    handler: F,
) -> Result<(Response, Session), Response>
where
    F: FnOnce() -> (Response, Session) + Send + 'static,
{
    let mut task = tokio::task::spawn_blocking(handler);
    let joined = match tokio::time::timeout(timeout, &mut task).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::warn!(
                peer = %peer,
                request = name,
                timeout_ms = timeout.as_millis(),
                "request exceeded timeout, waiting for it to finish"
            );
            task.await
        }
    };
    joined.map_err(|join| {
        tracing::error!(peer = %peer, request = name, error = %join, "request handler failed");
        Response::Error {
            kind: ErrorKind::Internal,
            message: format!("request {name} failed: {join}"),
        }
    })
}

async fn send(stream: &mut TcpStream, response: &Response) -> ServerResult<()> {
    let frame = encode_frame(response)?;
    stream.write_all(&frame).await?;
    Ok(())
}
