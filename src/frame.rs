use crate::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;

/// Pixel layout of a raw preview frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Planar YUV with a leading full-resolution luma plane (Android preview
    /// default). Chroma is interleaved after the luma plane and ignored here.
    Nv21,
    /// Packed YUV 4:2:2, luma on every even byte.
    Yuyv,
    /// Single-channel 8-bit luminance.
    Gray8,
}

impl FrameFormat {
    /// Minimum buffer length for a frame of the given dimensions.
    pub fn min_buffer_len(&self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            FrameFormat::Nv21 => pixels + pixels / 2,
            FrameFormat::Yuyv => pixels * 2,
            FrameFormat::Gray8 => pixels,
        }
    }
}

/// Rotation correction needed to bring a frame into display orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    None,
    /// 90 degrees clockwise.
    Rotate90,
    Rotate180,
    /// 270 degrees clockwise (90 counter-clockwise).
    Rotate270,
}

impl Rotation {
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::None => 0,
            Rotation::Rotate90 => 90,
            Rotation::Rotate180 => 180,
            Rotation::Rotate270 => 270,
        }
    }

    /// Whether the rotation swaps width and height.
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Rotate90 | Rotation::Rotate270)
    }
}

/// A raw preview frame as delivered by the capture callback.
///
/// Frames are created once per callback, consumed by exactly one decode
/// attempt and then released; the `Arc` exists so the capture context can
/// hand the buffer off without copying.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic frame identifier assigned by the source.
    pub id: u64,
    /// Capture timestamp.
    pub timestamp: SystemTime,
    /// Raw pixel data.
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub format: FrameFormat,
    /// Rotation correction to apply before decoding.
    pub rotation: Rotation,
    /// Optional capture-region override, in pre-rotation frame coordinates.
    pub capture_rect: Option<Rect>,
}

impl Frame {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
            rotation: Rotation::None,
            capture_rect: None,
        }
    }

    /// Build a frame over an already-shared buffer, avoiding a copy when the
    /// source reuses one allocation across frames.
    pub fn from_shared(
        id: u64,
        timestamp: SystemTime,
        data: Arc<Vec<u8>>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data,
            width,
            height,
            format,
            rotation: Rotation::None,
            capture_rect: None,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Validate dimensions and buffer length against the declared format.
    pub fn validate(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() >= self.format.min_buffer_len(self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_buffer_lengths() {
        assert_eq!(FrameFormat::Nv21.min_buffer_len(640, 480), 640 * 480 * 3 / 2);
        assert_eq!(FrameFormat::Yuyv.min_buffer_len(640, 480), 640 * 480 * 2);
        assert_eq!(FrameFormat::Gray8.min_buffer_len(640, 480), 640 * 480);
    }

    #[test]
    fn test_rotation_axis_swap() {
        assert!(Rotation::Rotate90.swaps_axes());
        assert!(Rotation::Rotate270.swaps_axes());
        assert!(!Rotation::None.swaps_axes());
        assert!(!Rotation::Rotate180.swaps_axes());
    }

    #[test]
    fn test_frame_validation() {
        let good = Frame::new(
            1,
            SystemTime::now(),
            vec![0u8; 640 * 480],
            640,
            480,
            FrameFormat::Gray8,
        );
        assert!(good.validate());

        let short = Frame::new(
            2,
            SystemTime::now(),
            vec![0u8; 100],
            640,
            480,
            FrameFormat::Gray8,
        );
        assert!(!short.validate());

        let zero = Frame::new(3, SystemTime::now(), vec![], 0, 480, FrameFormat::Gray8);
        assert!(!zero.validate());
    }
}
