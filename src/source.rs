use crate::error::{Result, ScanError};
use crate::frame::{Frame, FrameFormat, Rotation};
use crate::geometry::Rect;
use crate::slot::FrameSlot;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Device boundary of the pipeline. Implementations deliver preview frames
/// into a [`FrameSlot`] at their own cadence; the pipeline never pulls from
/// the device directly.
#[async_trait]
pub trait FrameSource: Send {
    /// Open the device. Fails with `ScanError::CameraUnavailable` when the
    /// device cannot be acquired.
    async fn open(&mut self) -> Result<()>;

    /// Release the device. Safe to call when already closed.
    async fn close(&mut self);

    /// Begin delivering frames into the slot. Requires an open device.
    fn start_delivery(&mut self, slot: Arc<FrameSlot>) -> Result<()>;

    /// Stop delivering frames. Safe to call when delivery is not running.
    fn stop_delivery(&mut self);

    /// Native preview resolution, valid after `open`.
    fn preview_resolution(&self) -> (u32, u32);

    /// Restrict capture to a centered region of the given size. Frames
    /// delivered afterwards carry the region as their capture rect.
    fn set_manual_capture_region(&mut self, width: u32, height: u32);

    /// Request assist illumination on or off. Advisory for sources without a
    /// torch.
    async fn set_torch(&mut self, on: bool);
}

/// Frame source that replays a grayscale still image at a fixed rate.
///
/// Stands in for a camera in tests and in the CLI: every delivered frame
/// shares one buffer, so the replay loop is allocation-free after open.
pub struct SyntheticFrameSource {
    plane: Option<Arc<Vec<u8>>>,
    width: u32,
    height: u32,
    fps: u32,
    rotation: Rotation,
    manual_region: Option<(u32, u32)>,
    image_path: Option<std::path::PathBuf>,
    frame_counter: Arc<AtomicU64>,
    is_running: Arc<AtomicBool>,
    torch_on: bool,
    delivery_task: Option<JoinHandle<()>>,
}

impl SyntheticFrameSource {
    /// Source backed by an image file, loaded on `open`.
    pub fn from_image_path(path: impl AsRef<Path>, fps: u32) -> Self {
        Self {
            plane: None,
            width: 0,
            height: 0,
            fps: fps.max(1),
            rotation: Rotation::None,
            manual_region: None,
            image_path: Some(path.as_ref().to_path_buf()),
            frame_counter: Arc::new(AtomicU64::new(0)),
            is_running: Arc::new(AtomicBool::new(false)),
            torch_on: false,
            delivery_task: None,
        }
    }

    /// Source backed by an in-memory luminance plane.
    pub fn from_plane(plane: Vec<u8>, width: u32, height: u32, fps: u32) -> Self {
        Self {
            plane: Some(Arc::new(plane)),
            width,
            height,
            fps: fps.max(1),
            rotation: Rotation::None,
            manual_region: None,
            image_path: None,
            frame_counter: Arc::new(AtomicU64::new(0)),
            is_running: Arc::new(AtomicBool::new(false)),
            torch_on: false,
            delivery_task: None,
        }
    }

    /// Tag every delivered frame with a rotation for the extractor to undo.
    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn open(&mut self) -> Result<()> {
        if self.plane.is_none() {
            let path = self.image_path.as_ref().ok_or_else(|| {
                ScanError::camera_unavailable("synthetic source has no image or plane")
            })?;
            let image = image::open(path).map_err(|e| {
                ScanError::camera_unavailable(format!(
                    "failed to load {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let gray = image.to_luma8();
            self.width = gray.width();
            self.height = gray.height();
            self.plane = Some(Arc::new(gray.into_raw()));
            info!(
                "Loaded synthetic frame source image ({}x{})",
                self.width, self.height
            );
        }
        if self.width == 0 || self.height == 0 {
            return Err(ScanError::camera_unavailable(
                "synthetic source image has zero dimension",
            ));
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.stop_delivery();
        debug!("Synthetic frame source closed");
    }

    fn start_delivery(&mut self, slot: Arc<FrameSlot>) -> Result<()> {
        if self.is_running.load(Ordering::Relaxed) {
            warn!("Synthetic frame delivery is already running");
            return Ok(());
        }
        let plane = self
            .plane
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| ScanError::camera_unavailable("synthetic source is not open"))?;

        self.is_running.store(true, Ordering::Relaxed);
        let is_running = Arc::clone(&self.is_running);
        let frame_counter = Arc::clone(&self.frame_counter);
        let interval = Duration::from_millis(1000 / self.fps as u64);
        let (width, height) = (self.width, self.height);
        let rotation = self.rotation;
        // The region request is stored as a size and resolved here, once the
        // preview dimensions are known.
        let capture_rect = self.manual_region.map(|(w, h)| {
            let rect = Rect::centered_in(w.min(width), h.min(height), width, height);
            debug!("Manual capture region resolved to {:?}", rect);
            rect
        });

        info!(
            "Starting synthetic frame delivery ({}x{} @ {}fps)",
            width, height, self.fps
        );
        self.delivery_task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            while is_running.load(Ordering::Relaxed) {
                ticker.tick().await;
                if !is_running.load(Ordering::Relaxed) {
                    break;
                }
                let id = frame_counter.fetch_add(1, Ordering::Relaxed);
                let mut frame = Frame::from_shared(
                    id,
                    SystemTime::now(),
                    Arc::clone(&plane),
                    width,
                    height,
                    FrameFormat::Gray8,
                )
                .with_rotation(rotation);
                frame.capture_rect = capture_rect;
                trace!("Delivering synthetic frame {}", id);
                slot.offer(frame);
            }
            debug!("Synthetic frame delivery loop exited");
        }));
        Ok(())
    }

    fn stop_delivery(&mut self) {
        if self.is_running.swap(false, Ordering::Relaxed) {
            debug!("Stopping synthetic frame delivery");
        }
        if let Some(task) = self.delivery_task.take() {
            task.abort();
        }
    }

    fn preview_resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn set_manual_capture_region(&mut self, width: u32, height: u32) {
        // Deferred: the centered rect needs the preview dimensions, which an
        // image-backed source only has after open.
        debug!("Manual capture region requested: {}x{}", width, height);
        self.manual_region = Some((width, height));
    }

    async fn set_torch(&mut self, on: bool) {
        if self.torch_on != on {
            debug!("Torch recommendation applied: {}", on);
            self.torch_on = on;
        }
    }
}

impl Drop for SyntheticFrameSource {
    fn drop(&mut self) {
        self.stop_delivery();
    }
}
