//! Request transports.

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use docbridge_protocol::{read_frame, write_frame, ProtocolError, Request, Response};
use std::io::BufReader;
use std::net::{TcpStream, ToSocketAddrs};

/// Carries one request to the server and brings back its response.
pub trait Transport: Send {
    /// Sends a request and waits for the matching response.
    fn round_trip(&mut self, request: &Request) -> ClientResult<Response>;
}

/// Blocking TCP transport speaking framed CBOR.
pub struct TcpTransport {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    max_frame_size: usize,
}

impl TcpTransport {
    /// Connects to `host:port`, trying every resolved address in turn.
    pub fn connect(host: &str, port: u16, config: &ClientConfig) -> ClientResult<Self> {
        let mut last_error = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, config.connect_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(Some(config.request_timeout))?;
                    stream.set_write_timeout(Some(config.request_timeout))?;
                    tracing::debug!(addr = %addr, "connected");
                    return Ok(Self {
                        reader: BufReader::new(stream.try_clone()?),
                        writer: stream,
                        max_frame_size: config.max_frame_size,
                    });
                }
                Err(e) => {
                    tracing::debug!(addr = %addr, error = %e, "connect attempt failed");
                    last_error = Some(e);
                }
            }
        }
        Err(match last_error {
            Some(e) => e.into(),
            None => ClientError::Protocol(ProtocolError::ConnectionClosed),
        })
    }
}

impl Transport for TcpTransport {
    fn round_trip(&mut self, request: &Request) -> ClientResult<Response> {
        write_frame(&mut self.writer, request)?;
        Ok(read_frame(&mut self.reader, self.max_frame_size)?)
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("peer", &self.writer.peer_addr().ok())
            .finish()
    }
}
