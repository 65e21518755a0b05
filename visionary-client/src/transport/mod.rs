//! Byte transports.
//!
//! The protocol handler and the data stream only need blocking `send` and
//! `recv`; everything above this layer is transport-agnostic.

use std::io;

mod mock;
mod tcp;

pub use mock::MockTransport;
pub use tcp::TcpTransport;

/// Blocking byte transport.
pub trait Transport: Send {
    /// Sends `data`, returning the number of bytes written.
    fn send(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Receives up to `buf.len()` bytes. `Ok(0)` means the peer closed.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Receives exactly `buf.len()` bytes.
    ///
    /// Fails with `UnexpectedEof` when the peer closes first.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.recv(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("connection closed after {} of {} bytes", filled, buf.len()),
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Closes the connection.
    fn shutdown(&mut self) -> io::Result<()>;

    /// Returns whether the transport is believed to be usable.
    fn is_connected(&self) -> bool {
        true
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).send(data)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv(buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        (**self).read(buf)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        (**self).shutdown()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}

/// Returns whether an I/O error is a timeout rather than a broken connection.
pub(crate) fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
