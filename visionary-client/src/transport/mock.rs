//! Scripted in-memory transport.

use super::Transport;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

/// In-memory transport with a scripted receive buffer.
///
/// Clones share state, so a test can keep a handle after moving the
/// transport into a handler or stream.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

#[derive(Default)]
struct MockInner {
    read_buffer: VecDeque<u8>,
    written: Vec<u8>,
    fail_sends: bool,
    send_limit: Option<usize>,
    recv_error: Option<io::ErrorKind>,
    max_chunk: Option<usize>,
    recv_calls: usize,
    shut_down: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that will yield `data`.
    pub fn with_buffer(data: &[u8]) -> Self {
        let transport = Self::new();
        transport.inject_read(data);
        transport
    }

    /// Replaces the pending receive data.
    pub fn set_buffer(&self, data: &[u8]) {
        let mut inner = self.inner.lock();
        inner.read_buffer.clear();
        inner.read_buffer.extend(data);
    }

    /// Appends to the pending receive data.
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Makes every subsequent `send` fail.
    pub fn fail_sends(&self, fail: bool) {
        self.inner.lock().fail_sends = fail;
    }

    /// Caps the bytes accepted by a single `send`, producing short writes.
    pub fn set_send_limit(&self, limit: Option<usize>) {
        self.inner.lock().send_limit = limit;
    }

    /// Makes every subsequent `recv` fail with `kind`.
    pub fn set_recv_error(&self, kind: Option<io::ErrorKind>) {
        self.inner.lock().recv_error = kind;
    }

    /// Caps the bytes returned by a single `recv`.
    pub fn set_max_chunk(&self, max: usize) {
        self.inner.lock().max_chunk = Some(max.max(1));
    }

    /// Everything sent so far.
    pub fn written(&self) -> Vec<u8> {
        self.inner.lock().written.clone()
    }

    pub fn clear_written(&self) {
        self.inner.lock().written.clear();
    }

    pub fn pending(&self) -> usize {
        self.inner.lock().read_buffer.len()
    }

    pub fn recv_calls(&self) -> usize {
        self.inner.lock().recv_calls
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.lock().shut_down
    }
}

impl Transport for MockTransport {
    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        if inner.fail_sends || inner.shut_down {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "send failed"));
        }
        let n = data.len().min(inner.send_limit.unwrap_or(usize::MAX));
        inner.written.extend_from_slice(&data[..n]);
        Ok(n)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();
        inner.recv_calls += 1;
        if let Some(kind) = inner.recv_error {
            return Err(io::Error::new(kind, "recv failed"));
        }
        let limit = inner.max_chunk.unwrap_or(usize::MAX);
        let n = inner.read_buffer.len().min(buf.len()).min(limit);
        for (slot, byte) in buf.iter_mut().zip(inner.read_buffer.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.inner.lock().shut_down = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.inner.lock().shut_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recv_drains_buffer() {
        let mut transport = MockTransport::with_buffer(b"abcdef");
        let mut buf = [0u8; 4];
        assert_eq!(transport.recv(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(transport.pending(), 2);
        assert_eq!(transport.recv(&mut buf).unwrap(), 2);
        assert_eq!(transport.recv(&mut buf).unwrap(), 0);
        assert_eq!(transport.recv_calls(), 3);
    }

    #[test]
    fn test_read_loops_over_chunks() {
        let mut transport = MockTransport::with_buffer(b"0123456789");
        transport.set_max_chunk(3);
        let mut buf = [0u8; 8];
        transport.read(&mut buf).unwrap();
        assert_eq!(&buf, b"01234567");
        assert_eq!(transport.recv_calls(), 3);
    }

    #[test]
    fn test_read_short_is_eof() {
        let mut transport = MockTransport::with_buffer(b"abc");
        let mut buf = [0u8; 4];
        let err = transport.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_send_recording_and_failure() {
        let handle = MockTransport::new();
        let mut transport = handle.clone();
        transport.send(b"hello").unwrap();
        assert_eq!(handle.written(), b"hello");

        handle.fail_sends(true);
        assert!(transport.send(b"x").is_err());
        assert_eq!(handle.written(), b"hello");
    }

    #[test]
    fn test_send_limit_and_recv_error() {
        let mut transport = MockTransport::with_buffer(b"abc");
        transport.set_send_limit(Some(2));
        assert_eq!(transport.send(b"hello").unwrap(), 2);
        assert_eq!(transport.written(), b"he");

        transport.set_recv_error(Some(io::ErrorKind::WouldBlock));
        let mut buf = [0u8; 3];
        let err = transport.recv(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert_eq!(transport.pending(), 3);

        transport.set_recv_error(None);
        assert_eq!(transport.recv(&mut buf).unwrap(), 3);
    }

    #[test]
    fn test_shutdown() {
        let mut transport = MockTransport::new();
        assert!(transport.is_connected());
        transport.shutdown().unwrap();
        assert!(!transport.is_connected());
        assert!(transport.send(b"x").is_err());
    }
}
