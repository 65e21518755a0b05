//! TCP transport.

use super::Transport;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// Blocking TCP connection with read/write timeouts.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
    connected: bool,
}

impl TcpTransport {
    /// Connects to `host:port`, trying each resolved address in turn.
    pub fn connect(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        io_timeout: Option<Duration>,
    ) -> io::Result<Self> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(io_timeout)?;
                    stream.set_write_timeout(io_timeout)?;
                    stream.set_nodelay(true)?;
                    debug!(peer = %addr, "connected");
                    return Ok(Self {
                        stream,
                        peer: addr,
                        connected: true,
                    });
                }
                Err(e) => {
                    debug!(peer = %addr, error = %e, "connect attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no address for {}:{}", host, port),
            )
        }))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn mark_on_error<T>(&mut self, result: io::Result<T>) -> io::Result<T> {
        if let Err(e) = &result {
            if !super::is_timeout(e) && e.kind() != io::ErrorKind::Interrupted {
                self.connected = false;
            }
        }
        result
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        let result = self.stream.write_all(data).map(|()| data.len());
        self.mark_on_error(result)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.stream.read(buf);
        if let Ok(0) = result {
            if !buf.is_empty() {
                self.connected = false;
            }
        }
        self.mark_on_error(result)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.connected = false;
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
