//! Camera façade: one control connection plus one stream connection.

use crate::config::{CameraConfig, LoginAttempt};
use crate::control::Control;
use crate::error::ClientError;
use crate::frame::Frame;
use crate::handler::{Framing, ProtocolHandler};
use crate::stream::{DataStream, StreamStats};
use crate::transport::{TcpTransport, Transport};
use tracing::{debug, info, warn};

/// A connected camera.
///
/// Dropping the camera disconnects it.
pub struct Camera<T: Transport = TcpTransport> {
    control: Control<T>,
    stream: DataStream<T>,
    config: CameraConfig,
    last_frame_number: u32,
    connected: bool,
}

impl Camera<TcpTransport> {
    /// Opens both TCP connections and brings the device into the configured
    /// acquisition mode.
    pub fn connect(config: CameraConfig) -> Result<Self, ClientError> {
        let net = &config.network;
        let stream = TcpTransport::connect(
            &net.host,
            net.stream_port,
            net.connect_timeout(),
            net.io_timeout(),
        )?;
        let control = TcpTransport::connect(
            &net.host,
            net.control_port,
            net.connect_timeout(),
            net.io_timeout(),
        )?;
        info!(
            host = %net.host,
            control_port = net.control_port,
            stream_port = net.stream_port,
            "connected to camera"
        );
        Self::from_transports(control, stream, config)
    }
}

impl<T: Transport> Camera<T> {
    /// Builds a camera over already-open transports.
    ///
    /// On failure both transports are shut down.
    pub fn from_transports(
        control: T,
        stream: T,
        config: CameraConfig,
    ) -> Result<Self, ClientError> {
        let handler = ProtocolHandler::new(control, config.protocol.framing)
            .with_client_id(config.protocol.client_id.clone());
        let mut camera = Self {
            control: Control::new(handler),
            stream: DataStream::new(stream).with_verify_crc(config.protocol.verify_crc),
            config,
            last_frame_number: 0,
            connected: false,
        };

        if let Err(e) = camera.initialize() {
            camera.shutdown_transports();
            return Err(e);
        }
        camera.connected = true;
        Ok(camera)
    }

    fn initialize(&mut self) -> Result<(), ClientError> {
        if self.config.protocol.framing == Framing::Cola2
            && !self
                .control
                .open_session(self.config.protocol.session_timeout_ms)
        {
            return Err(ClientError::SessionFailed);
        }

        if !self.config.auth.attempts.is_empty() {
            login(&mut self.control, &self.config.auth.attempts)?;
        }

        let single_step = self.config.acquisition.single_step;
        let ok = if single_step {
            self.control.stop_acquisition()
        } else {
            self.control.start_acquisition()
        };
        if !ok {
            warn!(single_step, "could not set initial acquisition mode");
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Connected and the stream transport still alive.
    pub fn healthy(&self) -> bool {
        self.connected && self.stream.is_connected()
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn control(&mut self) -> &mut Control<T> {
        &mut self.control
    }

    pub fn stream_stats(&self) -> StreamStats {
        self.stream.stats()
    }

    pub fn last_frame_number(&self) -> u32 {
        self.last_frame_number
    }

    pub fn start_acquisition(&mut self) -> bool {
        self.connected && self.control.start_acquisition()
    }

    pub fn stop_acquisition(&mut self) -> bool {
        self.connected && self.control.stop_acquisition()
    }

    pub fn step_acquisition(&mut self) -> bool {
        self.connected && self.control.step_acquisition()
    }

    /// Reads the next frame.
    ///
    /// A frame whose number did not advance is re-read once when
    /// `stale_frame_retry` is on; the newer frame wins, otherwise the first
    /// one is returned.
    pub fn get_frame(&mut self) -> Result<Frame, ClientError> {
        if !self.connected {
            return Err(ClientError::NotConnected);
        }

        let mut frame = self.next_frame()?;
        let number = frame.frame_number();
        if !self.config.acquisition.stale_frame_retry || number == 0 {
            return Ok(frame);
        }

        if number <= self.last_frame_number {
            warn!(
                frame_number = number,
                last = self.last_frame_number,
                "stale frame, retrying"
            );
            match self.next_frame() {
                Ok(retry) if retry.frame_number() > self.last_frame_number => {
                    info!(frame_number = retry.frame_number(), "retry produced a new frame");
                    frame = retry;
                }
                Ok(retry) => {
                    warn!(frame_number = retry.frame_number(), "retry still stale");
                }
                Err(e) => {
                    warn!(error = %e, "retry failed");
                }
            }
        }
        self.last_frame_number = frame.frame_number();
        Ok(frame)
    }

    fn next_frame(&mut self) -> Result<Frame, ClientError> {
        if self.config.acquisition.single_step && !self.control.step_acquisition() {
            debug!("step trigger failed");
        }
        Ok(self.stream.get_next_frame()?)
    }

    /// Stops acquisition, logs out, closes the session and both transports.
    ///
    /// Idempotent; failures are logged.
    pub fn disconnect(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;

        self.control.stop_acquisition();
        if !self.config.auth.attempts.is_empty() {
            if let Err(e) = self.control.logout() {
                warn!(error = %e, "logout failed");
            }
        }
        self.control.close_session();
        self.shutdown_transports();
        self.last_frame_number = 0;
        info!("camera disconnected");
    }

    fn shutdown_transports(&mut self) {
        if let Err(e) = self.control.handler_mut().transport_mut().shutdown() {
            debug!(error = %e, "control shutdown failed");
        }
        if let Err(e) = self.stream.close() {
            debug!(error = %e, "stream shutdown failed");
        }
    }
}

impl<T: Transport> Drop for Camera<T> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Tries each set of credentials in order; the last failure is returned.
fn login<T: Transport>(
    control: &mut Control<T>,
    attempts: &[LoginAttempt],
) -> Result<(), ClientError> {
    let mut last_err = ClientError::LoginFailed("no credentials configured".to_string());
    for attempt in attempts {
        match control.login(attempt.level, &attempt.password) {
            Ok(()) => return Ok(()),
            Err(e) => {
                warn!(level = %attempt.level, error = %e, "login attempt failed");
                last_err = e;
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use visionary_protocol::auth::{UserLevel, CHALLENGE_SIZE, SALT_SIZE};
    use visionary_protocol::{frame, BinarySegment, BlobEncoder, CameraParameters, XmlMetadata};

    fn framed(payload: &[u8]) -> Vec<u8> {
        frame::encode(payload).unwrap().to_vec()
    }

    fn challenge(status: u8) -> Vec<u8> {
        let mut answer = b"AN GetChallenge ".to_vec();
        answer.push(status);
        answer.extend_from_slice(&[0x11; CHALLENGE_SIZE]);
        answer.extend_from_slice(&[0x22; SALT_SIZE]);
        answer
    }

    fn blob(frame_number: u32) -> Vec<u8> {
        let segment = BinarySegment {
            frame_number,
            distance: vec![4; 6],
            intensity: vec![20; 6],
            confidence: vec![1; 6],
            ..Default::default()
        };
        BlobEncoder::new(XmlMetadata::depth_map(CameraParameters::new(3, 2)), segment)
            .encode()
            .unwrap()
            .to_vec()
    }

    /// Session, one successful login, initial acquisition mode.
    fn connect_answers(control: &MockTransport, acquisition: &[u8]) {
        control.inject_read(&framed(&[0, 0, 0, 9]));
        control.inject_read(&framed(&challenge(0)));
        control.inject_read(&framed(b"AN SetUserLevel \x00"));
        control.inject_read(&framed(acquisition));
    }

    fn config(single_step: bool) -> CameraConfig {
        let mut config = CameraConfig::default();
        config.acquisition.single_step = single_step;
        config
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_connect_continuous() {
        let control = MockTransport::new();
        let stream = MockTransport::new();
        connect_answers(&control, b"AN PLAYSTART");

        let camera =
            Camera::from_transports(control.clone(), stream.clone(), config(false)).unwrap();
        assert!(camera.is_connected());
        assert!(camera.healthy());

        let written = control.written();
        assert!(contains(&written, b"Ox"));
        assert!(contains(&written, b"MN GetChallenge"));
        assert!(contains(&written, b"MN SetUserLevel"));
        assert!(contains(&written, b"MN PLAYSTART"));
        assert_eq!(control.pending(), 0);
    }

    #[test]
    fn test_connect_falls_back_to_second_login() {
        let control = MockTransport::new();
        control.inject_read(&framed(&[0, 0, 0, 9]));
        control.inject_read(&framed(&challenge(0)));
        control.inject_read(&framed(b"AN SetUserLevel \x01"));
        control.inject_read(&framed(&challenge(0)));
        control.inject_read(&framed(b"AN SetUserLevel \x00"));
        control.inject_read(&framed(b"AN PLAYSTOP"));

        let camera = Camera::from_transports(control.clone(), MockTransport::new(), config(true));
        assert!(camera.is_ok());

        // Second GetChallenge asks for AuthorizedClient (3)
        let written = control.written();
        let marker = b"MN GetChallenge ";
        let levels: Vec<u8> = written
            .windows(marker.len() + 1)
            .filter(|w| &w[..marker.len()] == marker)
            .map(|w| w[marker.len()])
            .collect();
        assert_eq!(levels, vec![UserLevel::Service.code(), UserLevel::AuthorizedClient.code()]);
    }

    #[test]
    fn test_connect_login_exhausted() {
        let control = MockTransport::new();
        let stream = MockTransport::new();
        control.inject_read(&framed(&[0, 0, 0, 9]));
        control.inject_read(&framed(&challenge(1)));
        control.inject_read(&framed(&challenge(1)));

        let result = Camera::from_transports(control.clone(), stream.clone(), config(true));
        assert!(matches!(result, Err(ClientError::LoginFailed(_))));
        assert!(control.is_shut_down());
        assert!(stream.is_shut_down());
    }

    #[test]
    fn test_connect_session_failure() {
        let control = MockTransport::new();
        control.inject_read(&framed(&[0, 0, 0, 0]));
        let result = Camera::from_transports(control, MockTransport::new(), config(true));
        assert!(matches!(result, Err(ClientError::SessionFailed)));
    }

    #[test]
    fn test_colab_skips_session() {
        let control = MockTransport::new();
        control.inject_read(&colab_answer(b"AN PLAYSTOP"));

        let mut config = config(true);
        config.protocol.framing = Framing::ColaB;
        config.auth.attempts.clear();

        let camera = Camera::from_transports(control.clone(), MockTransport::new(), config);
        assert!(camera.is_ok());
        assert!(!contains(&control.written(), b"Ox"));
    }

    fn colab_answer(body: &[u8]) -> Vec<u8> {
        let mut payload = b"s".to_vec();
        payload.extend_from_slice(body);
        let mut buf = framed(&payload);
        buf.push(visionary_protocol::colab::checksum(&payload));
        buf
    }

    #[test]
    fn test_single_step_get_frame() {
        let control = MockTransport::new();
        let stream = MockTransport::new();
        connect_answers(&control, b"AN PLAYSTOP");
        let mut camera =
            Camera::from_transports(control.clone(), stream.clone(), config(true)).unwrap();

        control.clear_written();
        control.inject_read(&framed(b"AN PLAYNEXT"));
        stream.inject_read(&blob(5));

        let frame = camera.get_frame().unwrap();
        assert_eq!(frame.frame_number(), 5);
        assert_eq!(frame.distance_mm(), vec![1.0; 6]);
        assert_eq!(camera.last_frame_number(), 5);
        assert!(contains(&control.written(), b"MN PLAYNEXT"));
    }

    #[test]
    fn test_stale_frame_retry() {
        let control = MockTransport::new();
        let stream = MockTransport::new();
        connect_answers(&control, b"AN PLAYSTART");
        let mut camera =
            Camera::from_transports(control.clone(), stream.clone(), config(false)).unwrap();

        stream.inject_read(&blob(7));
        stream.inject_read(&blob(7));
        stream.inject_read(&blob(8));
        assert_eq!(camera.get_frame().unwrap().frame_number(), 7);
        assert_eq!(camera.get_frame().unwrap().frame_number(), 8);
        assert_eq!(camera.stream_stats().frames, 3);
    }

    #[test]
    fn test_stale_frame_kept_when_retry_stale() {
        let control = MockTransport::new();
        let stream = MockTransport::new();
        connect_answers(&control, b"AN PLAYSTART");
        let mut camera =
            Camera::from_transports(control.clone(), stream.clone(), config(false)).unwrap();

        stream.inject_read(&blob(9));
        stream.inject_read(&blob(3));
        stream.inject_read(&blob(2));
        assert_eq!(camera.get_frame().unwrap().frame_number(), 9);
        assert_eq!(camera.get_frame().unwrap().frame_number(), 3);
        assert_eq!(camera.last_frame_number(), 3);
    }

    #[test]
    fn test_stale_retry_disabled() {
        let control = MockTransport::new();
        let stream = MockTransport::new();
        connect_answers(&control, b"AN PLAYSTART");
        let mut config = config(false);
        config.acquisition.stale_frame_retry = false;
        let mut camera = Camera::from_transports(control, stream.clone(), config).unwrap();

        stream.inject_read(&blob(4));
        stream.inject_read(&blob(4));
        assert_eq!(camera.get_frame().unwrap().frame_number(), 4);
        assert_eq!(camera.get_frame().unwrap().frame_number(), 4);
        assert_eq!(camera.stream_stats().frames, 2);
    }

    #[test]
    fn test_disconnect_idempotent() {
        let control = MockTransport::new();
        let stream = MockTransport::new();
        connect_answers(&control, b"AN PLAYSTART");
        let mut camera =
            Camera::from_transports(control.clone(), stream.clone(), config(false)).unwrap();

        control.clear_written();
        control.inject_read(&framed(b"AN PLAYSTOP"));
        control.inject_read(&framed(b"AN Run \x01"));
        control.inject_read(&framed(b"CX"));
        camera.disconnect();

        let written = control.written();
        assert!(contains(&written, b"MN PLAYSTOP"));
        assert!(contains(&written, b"MN Run"));
        assert!(contains(&written, b"Cx"));
        assert!(control.is_shut_down());
        assert!(stream.is_shut_down());
        assert!(!camera.healthy());

        control.clear_written();
        camera.disconnect();
        drop(camera);
        assert!(control.written().is_empty());
    }

    #[test]
    fn test_get_frame_after_disconnect() {
        let mut config = config(false);
        config.protocol.framing = Framing::ColaB;
        config.auth.attempts.clear();

        let mut camera =
            Camera::from_transports(MockTransport::new(), MockTransport::new(), config).unwrap();
        camera.disconnect();
        assert!(matches!(camera.get_frame(), Err(ClientError::NotConnected)));
        assert!(!camera.start_acquisition());
    }
}
