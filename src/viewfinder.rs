use crate::geometry::Rect;
use tracing::debug;

const MIN_FRAME_WIDTH: u32 = 240;
const MIN_FRAME_HEIGHT: u32 = 240;
const MAX_FRAME_WIDTH: u32 = 1200;
const MAX_FRAME_HEIGHT: u32 = 675;

/// Framing-rect state shared between the UI viewfinder and the decode crop.
///
/// The UI-coordinate rect is derived from the screen resolution (or a manual
/// override); the preview-coordinate rect maps it into camera pixel space.
/// Both are cached and recomputed whenever the screen resolution, preview
/// resolution or manual override changes, so the preview rect is never stale
/// across a decode.
#[derive(Debug, Clone)]
pub struct ViewfinderState {
    screen: (u32, u32),
    preview: Option<(u32, u32)>,
    manual: Option<(u32, u32)>,
    framing_rect: Option<Rect>,
    framing_rect_in_preview: Option<Rect>,
}

impl ViewfinderState {
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Self {
            screen: (screen_width, screen_height),
            preview: None,
            manual: None,
            framing_rect: None,
            framing_rect_in_preview: None,
        }
    }

    /// Record the camera preview resolution. Invalidates cached rects when it
    /// changes.
    pub fn set_preview_resolution(&mut self, width: u32, height: u32) {
        if self.preview != Some((width, height)) {
            debug!("Preview resolution set to {}x{}", width, height);
            self.preview = Some((width, height));
            self.framing_rect_in_preview = None;
        }
    }

    /// Manual capture-region override, clamped to the screen bounds.
    pub fn set_manual_framing_rect(&mut self, width: u32, height: u32) {
        let width = width.min(self.screen.0);
        let height = height.min(self.screen.1);
        debug!("Manual framing rect set to {}x{}", width, height);
        self.manual = Some((width, height));
        self.framing_rect = None;
        self.framing_rect_in_preview = None;
    }

    /// Framing rect in UI coordinates: 5/8 of each screen dimension within
    /// fixed bounds, centred; or the manual override.
    pub fn framing_rect(&mut self) -> Rect {
        if let Some(rect) = self.framing_rect {
            return rect;
        }
        let (screen_w, screen_h) = self.screen;
        let rect = match self.manual {
            Some((w, h)) => Rect::centered_in(w, h, screen_w, screen_h),
            None => {
                let width = desired_dimension(screen_w, MIN_FRAME_WIDTH, MAX_FRAME_WIDTH);
                let height = desired_dimension(screen_h, MIN_FRAME_HEIGHT, MAX_FRAME_HEIGHT);
                Rect::centered_in(width, height, screen_w, screen_h)
            }
        };
        debug!("Calculated framing rect: {:?}", rect);
        self.framing_rect = Some(rect);
        rect
    }

    /// Framing rect mapped into camera preview coordinates, or `None` until
    /// the preview resolution is known.
    pub fn framing_rect_in_preview(&mut self) -> Option<Rect> {
        if let Some(rect) = self.framing_rect_in_preview {
            return Some(rect);
        }
        let (preview_w, preview_h) = self.preview?;
        let (screen_w, screen_h) = self.screen;
        if screen_w == 0 || screen_h == 0 {
            return None;
        }
        let ui = self.framing_rect();
        let rect = Rect {
            left: ui.left * preview_w / screen_w,
            top: ui.top * preview_h / screen_h,
            width: ui.width * preview_w / screen_w,
            height: ui.height * preview_h / screen_h,
        }
        .clamped_to(preview_w, preview_h);
        debug!("Calculated framing rect in preview: {:?}", rect);
        self.framing_rect_in_preview = Some(rect);
        Some(rect)
    }
}

/// 5/8 of the available resolution, clamped to the hard bounds.
fn desired_dimension(resolution: u32, min: u32, max: u32) -> u32 {
    (resolution * 5 / 8).clamp(min.min(resolution), max)
}
