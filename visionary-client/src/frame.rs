//! Decoded depth frame.

use visionary_protocol::{BinarySegment, CameraParameters};

/// Millimetres per raw distance unit.
pub const DISTANCE_UNIT_MM: f32 = 0.25;

/// One fully validated frame. Owns all of its data.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    blob_id: u16,
    camera: CameraParameters,
    data: BinarySegment,
}

impl Frame {
    pub fn new(blob_id: u16, camera: CameraParameters, data: BinarySegment) -> Self {
        Self {
            blob_id,
            camera,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.camera.width
    }

    pub fn height(&self) -> u32 {
        self.camera.height
    }

    pub fn blob_id(&self) -> u16 {
        self.blob_id
    }

    pub fn frame_number(&self) -> u32 {
        self.data.frame_number
    }

    /// Raw packed device timestamp.
    pub fn timestamp(&self) -> u64 {
        self.data.timestamp
    }

    /// Milliseconds since midnight, decoded from the packed timestamp.
    pub fn timestamp_ms(&self) -> u64 {
        let ts = self.data.timestamp;
        let field = |shift: u32, bits: u32| (ts >> shift) & ((1 << bits) - 1);
        let millis = field(14, 10);
        let seconds = field(24, 6);
        let minutes = field(30, 6);
        let hours = field(36, 5);
        ((hours * 60 + minutes) * 60 + seconds) * 1000 + millis
    }

    pub fn quality(&self) -> u8 {
        self.data.quality
    }

    pub fn status(&self) -> u8 {
        self.data.status
    }

    pub fn camera_parameters(&self) -> &CameraParameters {
        &self.camera
    }

    pub fn distance_raw(&self) -> &[u16] {
        &self.data.distance
    }

    /// Distance plane in millimetres.
    pub fn distance_mm(&self) -> Vec<f32> {
        self.data
            .distance
            .iter()
            .map(|&d| f32::from(d) * DISTANCE_UNIT_MM)
            .collect()
    }

    pub fn intensity(&self) -> &[u16] {
        &self.data.intensity
    }

    /// Intensity scaled to 8 bits for display.
    pub fn intensity_u8(&self) -> Vec<u8> {
        self.data
            .intensity
            .iter()
            .map(|&v| (f32::from(v) * 0.05 + 1.0).clamp(0.0, 255.0) as u8)
            .collect()
    }

    pub fn confidence(&self) -> &[u16] {
        &self.data.confidence
    }
}
