use crate::config::ScanConfig;
use crate::engine::DecodeEngine;
use crate::error::Result;
use crate::events::{EventBus, ScanEvent};
use crate::format;
use crate::luminance::LuminanceExtractor;
use crate::postprocess::{DisplayTarget, PresentationModel};
use crate::request::{ScanRequest, SessionOverrides};
use crate::slot::{FrameSlot, SlotStatsSnapshot};
use crate::source::FrameSource;
use crate::timers::{AmbientLightManager, InactivityTimer};
use crate::viewfinder::ViewfinderState;
use crate::worker::{DecodeSettings, DecodeWorker, WorkerHandle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_PROMPT: &str = "Place a barcode inside the viewfinder rectangle to scan it";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
}

/// Owns the full pipeline for one scanning surface: frame source, handoff
/// slot, decode worker, timers and the event bus.
///
/// Lifecycle is start/stop symmetric and idempotent. `stop` is synchronous
/// with respect to the worker: when it returns, no decode attempt is running
/// and the device is closed.
pub struct ScanSession {
    config: ScanConfig,
    source: Box<dyn FrameSource>,
    slot: Arc<FrameSlot>,
    bus: EventBus,
    worker: Option<WorkerHandle>,
    inactivity: InactivityTimer,
    ambient: AmbientLightManager,
    last_result: Arc<Mutex<Option<PresentationModel>>>,
    overrides: SessionOverrides,
    state: SessionState,
}

impl ScanSession {
    pub fn new(config: ScanConfig, source: Box<dyn FrameSource>) -> Self {
        let bus = EventBus::new(config.session.event_capacity);
        let inactivity = InactivityTimer::new(
            Duration::from_secs(config.inactivity.idle_timeout_secs),
            Duration::from_millis(config.inactivity.poll_interval_ms),
            bus.clone(),
        );
        let ambient = AmbientLightManager::new(
            config.ambient_light.too_dark_lux,
            config.ambient_light.bright_enough_lux,
        );
        Self {
            config,
            source,
            slot: Arc::new(FrameSlot::new()),
            bus,
            worker: None,
            inactivity,
            ambient,
            last_result: Arc::new(Mutex::new(None)),
            overrides: SessionOverrides::default(),
            state: SessionState::Idle,
        }
    }

    /// Apply a caller request. Only effective before `start`.
    pub fn apply_request(&mut self, request: &ScanRequest) {
        if self.state == SessionState::Scanning {
            warn!("Ignoring scan request applied while scanning");
            return;
        }
        self.overrides = request.resolve();
        debug!("Applied scan request: {:?}", self.overrides);
    }

    /// Bus handle for subscribers; valid across start/stop cycles.
    pub fn event_bus(&self) -> EventBus {
        self.bus.clone()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn slot_stats(&self) -> SlotStatsSnapshot {
        self.slot.stats()
    }

    /// Last successful decode of this session, if any.
    pub fn last_result(&self) -> Option<PresentationModel> {
        self.last_result.lock().clone()
    }

    pub fn prompt_message(&self) -> String {
        self.overrides
            .prompt_message
            .clone()
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string())
    }

    /// Open the device and start the pipeline. Idempotent; a second start
    /// while scanning is a no-op.
    pub async fn start(&mut self) -> Result<()> {
        if self.state == SessionState::Scanning {
            warn!("Session is already scanning");
            return Ok(());
        }
        info!("Starting scan session");

        // Device acquisition failure is reported once, not retried here.
        self.source.open().await?;
        // The region needs the preview dimensions, so it is applied only once
        // the device is open.
        if let Some((width, height)) = self.overrides.manual_region {
            self.source.set_manual_capture_region(width, height);
        }

        let (preview_w, preview_h) = self.source.preview_resolution();
        let mut viewfinder = ViewfinderState::new(
            self.config.viewfinder.screen_width,
            self.config.viewfinder.screen_height,
        );
        viewfinder.set_preview_resolution(preview_w, preview_h);

        let settings = self.decode_settings();
        debug!(
            "Decode settings: {} formats, try_harder={}, also_inverted={}, budget={}",
            if settings.formats.is_empty() {
                "all".to_string()
            } else {
                settings.formats.len().to_string()
            },
            settings.try_harder,
            settings.also_inverted,
            settings.max_extra_attempts
        );

        self.slot.clear();
        self.last_result.lock().take();
        self.ambient.reset();

        let worker = DecodeWorker::new(
            Arc::clone(&self.slot),
            LuminanceExtractor::new(viewfinder),
            Box::new(DecodeEngine::new()),
            settings,
            self.bus.clone(),
            Arc::clone(&self.last_result),
            Some(DisplayTarget {
                width: preview_w,
                height: preview_h,
            }),
            self.config.session.scale_factor,
        );
        self.worker = Some(worker.spawn());

        self.source.start_delivery(Arc::clone(&self.slot))?;
        self.inactivity.start();
        self.state = SessionState::Scanning;
        info!("Scan session started ({}x{} preview)", preview_w, preview_h);
        Ok(())
    }

    /// Stop the pipeline and release the device. Waits for any in-flight
    /// decode attempt; the device is closed only after the worker has exited.
    /// Idempotent.
    pub async fn stop(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        info!("Stopping scan session");
        self.inactivity.stop();
        self.source.stop_delivery();
        if let Some(mut worker) = self.worker.take() {
            worker.stop().await;
        }
        self.source.close().await;
        self.slot.clear();
        self.state = SessionState::Idle;

        let stats = self.slot.stats();
        info!(
            "Scan session stopped ({} frames offered, {} decoded attempts, {} coalesced)",
            stats.offered, stats.delivered, stats.dropped
        );
    }

    /// Resume scanning after a reported success, clearing the sticky result.
    /// `delay` defaults to the configured result display duration.
    pub fn restart_scanning(&self, delay: Option<Duration>) {
        let delay =
            delay.unwrap_or(Duration::from_millis(self.config.session.result_duration_ms));
        self.last_result.lock().take();
        if let Some(worker) = &self.worker {
            debug!("Restarting preview after {:?}", delay);
            worker.restart_preview(delay);
        }
    }

    /// Feed an ambient light reading; forwards torch recommendations to the
    /// source and the bus.
    pub async fn report_light_level(&mut self, lux: f32) {
        if let Some(on) = self.ambient.sample(lux) {
            self.source.set_torch(on).await;
            self.bus.publish(ScanEvent::TorchRecommendation { on });
        }
    }

    /// Mark user activity (touch, key press) for the inactivity timer.
    pub fn on_user_activity(&self) {
        self.inactivity.on_activity();
    }

    /// Stop and consume the session.
    pub async fn teardown(mut self) {
        self.stop().await;
        debug!("Scan session torn down");
    }

    fn decode_settings(&self) -> DecodeSettings {
        let defaults = &self.config.engine;
        let formats = if self.overrides.formats.is_empty() {
            format::parse_format_set(defaults.formats.iter().map(String::as_str))
        } else {
            self.overrides.formats.clone()
        };
        DecodeSettings {
            formats,
            try_harder: self.overrides.try_harder.unwrap_or(defaults.try_harder),
            also_inverted: self
                .overrides
                .also_inverted
                .unwrap_or(defaults.also_inverted),
            character_set: self
                .overrides
                .character_set
                .clone()
                .or_else(|| defaults.character_set.clone()),
            max_extra_attempts: defaults.max_extra_attempts,
        }
    }
}
