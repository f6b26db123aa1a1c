use crate::error::{Result, ScanError};
use crate::frame::{Frame, FrameFormat, Rotation};
use crate::geometry::Rect;
use crate::viewfinder::ViewfinderState;
use std::sync::Arc;
use tracing::trace;

/// A display-oriented 8-bit luminance plane plus the crop window the decode
/// engine should search.
///
/// Owned by the decode cycle that created it and discarded when the attempt
/// completes.
#[derive(Debug, Clone)]
pub struct LuminanceSource {
    pub plane: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub crop: Rect,
}

impl LuminanceSource {
    /// Copy the cropped window into a contiguous buffer for the codec
    /// delegate. Only the crop region is copied.
    pub fn crop_to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.crop.width as usize * self.crop.height as usize);
        let stride = self.width as usize;
        for row in self.crop.top..self.crop.bottom() {
            let start = row as usize * stride + self.crop.left as usize;
            out.extend_from_slice(&self.plane[start..start + self.crop.width as usize]);
        }
        out
    }
}

/// Converts raw preview frames into rotation-corrected luminance planes.
///
/// Extraction is byte-level only: the luma channel is sliced or strided out
/// of the native layout, never computed per pixel in floating point.
pub struct LuminanceExtractor {
    viewfinder: ViewfinderState,
}

impl LuminanceExtractor {
    pub fn new(viewfinder: ViewfinderState) -> Self {
        Self { viewfinder }
    }

    pub fn viewfinder_mut(&mut self) -> &mut ViewfinderState {
        &mut self.viewfinder
    }

    /// Extract the luminance plane and crop rect for one frame.
    ///
    /// Fails with `ScanError::InvalidFrame` for zero dimensions or a buffer
    /// shorter than the declared format requires; the caller skips the frame
    /// and the loop continues.
    pub fn extract(&mut self, frame: &Frame) -> Result<LuminanceSource> {
        if frame.width == 0 || frame.height == 0 {
            return Err(ScanError::invalid_frame(format!(
                "frame {} has zero dimension ({}x{})",
                frame.id, frame.width, frame.height
            )));
        }
        if !frame.validate() {
            return Err(ScanError::invalid_frame(format!(
                "frame {} buffer too short for {:?} {}x{}: {} bytes",
                frame.id,
                frame.format,
                frame.width,
                frame.height,
                frame.data.len()
            )));
        }

        let width = frame.width as usize;
        let height = frame.height as usize;

        // Gray frames that need no rotation can share the capture buffer.
        let (plane, out_w, out_h) =
            if frame.format == FrameFormat::Gray8 && frame.rotation == Rotation::None {
                (Arc::clone(&frame.data), frame.width, frame.height)
            } else {
                let luma = match frame.format {
                    FrameFormat::Nv21 => frame.data[..width * height].to_vec(),
                    FrameFormat::Gray8 => frame.data[..width * height].to_vec(),
                    FrameFormat::Yuyv => {
                        let mut luma = Vec::with_capacity(width * height);
                        luma.extend(frame.data[..width * height * 2].iter().step_by(2));
                        luma
                    }
                };
                let (rotated, w, h) = rotate_plane(&luma, width, height, frame.rotation);
                (Arc::new(rotated), w, h)
            };

        self.viewfinder.set_preview_resolution(out_w, out_h);

        // Manual capture rect (capture-space coordinates) wins over the
        // viewfinder mapping. It follows the plane through the rotation, then
        // is clamped to the rotated dimensions.
        let crop = match frame.capture_rect {
            Some(rect) => {
                rotate_rect(rect, frame.width, frame.height, frame.rotation)
                    .clamped_to(out_w, out_h)
            }
            None => self
                .viewfinder
                .framing_rect_in_preview()
                .unwrap_or(Rect::new(0, 0, out_w, out_h)),
        };
        let crop = if crop.is_empty() {
            Rect::new(0, 0, out_w, out_h)
        } else {
            crop
        };

        trace!(
            "Extracted {}x{} luminance plane for frame {} (crop {:?})",
            out_w,
            out_h,
            frame.id,
            crop
        );

        Ok(LuminanceSource {
            plane,
            width: out_w,
            height: out_h,
            crop,
        })
    }
}

/// Rotate a luminance plane. Returns the rotated buffer and its dimensions.
pub(crate) fn rotate_plane(data: &[u8], width: usize, height: usize, rotation: Rotation) -> (Vec<u8>, u32, u32) {
    match rotation {
        Rotation::None => (data.to_vec(), width as u32, height as u32),
        Rotation::Rotate180 => {
            let mut out = data[..width * height].to_vec();
            out.reverse();
            (out, width as u32, height as u32)
        }
        Rotation::Rotate90 => {
            // (x, y) -> (height - 1 - y, x), output is height x width.
            let mut out = vec![0u8; width * height];
            for y in 0..height {
                for x in 0..width {
                    out[x * height + (height - 1 - y)] = data[y * width + x];
                }
            }
            (out, height as u32, width as u32)
        }
        Rotation::Rotate270 => {
            // (x, y) -> (y, width - 1 - x), output is height x width.
            let mut out = vec![0u8; width * height];
            for y in 0..height {
                for x in 0..width {
                    out[(width - 1 - x) * height + y] = data[y * width + x];
                }
            }
            (out, height as u32, width as u32)
        }
    }
}

/// Map a capture-space rectangle into the display orientation produced by
/// [`rotate_plane`] on a `width` x `height` plane.
pub(crate) fn rotate_rect(rect: Rect, width: u32, height: u32, rotation: Rotation) -> Rect {
    match rotation {
        Rotation::None => rect,
        Rotation::Rotate90 => Rect {
            left: height.saturating_sub(rect.top + rect.height),
            top: rect.left,
            width: rect.height,
            height: rect.width,
        },
        Rotation::Rotate180 => Rect {
            left: width.saturating_sub(rect.left + rect.width),
            top: height.saturating_sub(rect.top + rect.height),
            width: rect.width,
            height: rect.height,
        },
        Rotation::Rotate270 => Rect {
            left: rect.top,
            top: width.saturating_sub(rect.left + rect.width),
            width: rect.height,
            height: rect.width,
        },
    }
}
