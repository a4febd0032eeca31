//! A server running on its own thread, for tests and embedding.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::server::DocServer;
use std::net::SocketAddr;
use std::thread::JoinHandle;
use tokio::sync::oneshot;

/// A [`DocServer`] running on a dedicated thread with its own runtime.
///
/// The server stops when this value is dropped.
///
/// ```
/// use docbridge_server::{BackgroundServer, ServerConfig};
///
/// let server = BackgroundServer::start(ServerConfig::default()).unwrap();
/// let dsn = server.dsn("main");
/// assert!(dsn.starts_with("cproto://127.0.0.1:"));
/// ```
pub struct BackgroundServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl BackgroundServer {
    /// Starts a server on an ephemeral loopback port. The configured bind
    /// address is ignored.
    pub fn start(config: ServerConfig) -> ServerResult<Self> {
        let listener = std::net::TcpListener::bind(("127.0.0.1", 0))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;
        let (shutdown, signal) = oneshot::channel::<()>();

        let thread = std::thread::Builder::new()
            .name(format!("docbridge-server-{}", addr.port()))
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(listener) => listener,
                        Err(e) => {
                            tracing::error!(error = %e, "cannot register listener");
                            return;
                        }
                    };
                    let server = DocServer::new(ServerConfig { bind_addr: addr, ..config });
                    let stop = async {
                        let _ = signal.await;
                    };
                    if let Err(e) = server.serve_until(listener, stop).await {
                        tracing::error!(error = %e, "server stopped");
                    }
                });
            })?;

        Ok(Self {
            addr,
            shutdown: Some(shutdown),
            thread: Some(thread),
        })
    }

    /// Address the server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Remote DSN for a database on this server.
    pub fn dsn(&self, database: &str) -> String {
        format!("cproto://{}/{database}", self.addr)
    }

    /// Stops the server and waits for its thread.
    pub fn stop(mut self) {
        self.shutdown_now();
    }

    fn shutdown_now(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for BackgroundServer {
    fn drop(&mut self) {
        self.shutdown_now();
    }
}
