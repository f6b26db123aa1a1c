use crate::events::{EventBus, EventFilter, EventReceiver, ScanEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Lux level at or below which assist illumination is recommended on.
pub const TOO_DARK_LUX: f32 = 45.0;
/// Lux level at or above which assist illumination is recommended off.
pub const BRIGHT_ENOUGH_LUX: f32 = 450.0;

/// Watches the event bus for activity and requests shutdown after a quiet
/// period, so an abandoned scanner does not burn the camera forever.
pub struct InactivityTimer {
    idle_timeout: Duration,
    poll_interval: Duration,
    last_activity: Arc<Mutex<Instant>>,
    bus: EventBus,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl InactivityTimer {
    pub fn new(idle_timeout: Duration, poll_interval: Duration, bus: EventBus) -> Self {
        Self {
            idle_timeout,
            poll_interval,
            last_activity: Arc::new(Mutex::new(Instant::now())),
            bus,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Mark activity from outside the event bus (touch, key press).
    pub fn on_activity(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Start watching. Idempotent; a second start is a no-op.
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        self.on_activity();
        let idle_timeout = self.idle_timeout;
        let poll_interval = self.poll_interval;
        let last_activity = Arc::clone(&self.last_activity);
        let bus = self.bus.clone();
        let cancel = self.cancel.clone();
        let mut events = EventReceiver::new(
            self.bus.subscribe(),
            EventFilter::EventTypes(vec!["frame_processed", "decode_succeeded"]),
            "inactivity-timer".to_string(),
        );

        debug!("Starting inactivity timer ({:?} timeout)", idle_timeout);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => {
                        if event.is_none() {
                            break;
                        }
                        *last_activity.lock() = Instant::now();
                    }
                    _ = ticker.tick() => {
                        let idle = last_activity.lock().elapsed();
                        if idle >= idle_timeout {
                            info!("No activity for {:?}, requesting shutdown", idle);
                            bus.publish(ScanEvent::ShutdownRequested {
                                reason: format!("inactive for {}s", idle.as_secs()),
                            });
                            break;
                        }
                    }
                }
            }
            debug!("Inactivity timer exited");
        }));
    }

    /// Stop watching. Idempotent.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.cancel = CancellationToken::new();
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Hysteresis band between dark and bright thresholds so torch advice does
/// not flicker near a boundary.
pub struct AmbientLightManager {
    too_dark_lux: f32,
    bright_enough_lux: f32,
    torch_on: bool,
}

impl AmbientLightManager {
    pub fn new(too_dark_lux: f32, bright_enough_lux: f32) -> Self {
        Self {
            too_dark_lux,
            bright_enough_lux,
            torch_on: false,
        }
    }

    /// Feed one ambient light reading. Returns the recommended torch state
    /// when it changes, `None` inside the hysteresis band or when the advice
    /// is already in effect.
    pub fn sample(&mut self, lux: f32) -> Option<bool> {
        if lux <= self.too_dark_lux && !self.torch_on {
            self.torch_on = true;
            debug!("Ambient light {:.0} lux: recommending torch on", lux);
            Some(true)
        } else if lux >= self.bright_enough_lux && self.torch_on {
            self.torch_on = false;
            debug!("Ambient light {:.0} lux: recommending torch off", lux);
            Some(false)
        } else {
            None
        }
    }

    /// Forget the current recommendation, e.g. when scanning restarts.
    pub fn reset(&mut self) {
        self.torch_on = false;
    }
}

impl Default for AmbientLightManager {
    fn default() -> Self {
        Self::new(TOO_DARK_LUX, BRIGHT_ENOUGH_LUX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    #[test]
    fn test_ambient_light_hysteresis() {
        let mut manager = AmbientLightManager::default();
        // Dark: recommend on, once.
        assert_eq!(manager.sample(10.0), Some(true));
        assert_eq!(manager.sample(10.0), None);
        // Mid-band readings change nothing in either direction.
        assert_eq!(manager.sample(200.0), None);
        assert_eq!(manager.sample(100.0), None);
        // Bright: recommend off, once.
        assert_eq!(manager.sample(500.0), Some(false));
        assert_eq!(manager.sample(500.0), None);
        // Mid-band still quiet with the torch off.
        assert_eq!(manager.sample(200.0), None);
    }

    #[test]
    fn test_ambient_light_reset() {
        let mut manager = AmbientLightManager::default();
        assert_eq!(manager.sample(10.0), Some(true));
        manager.reset();
        assert_eq!(manager.sample(10.0), Some(true));
    }

    #[tokio::test]
    async fn test_inactivity_requests_shutdown() {
        let bus = EventBus::new(16);
        let mut shutdown = EventReceiver::new(
            bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "test".to_string(),
        );
        let mut timer = InactivityTimer::new(
            Duration::from_millis(30),
            Duration::from_millis(10),
            bus.clone(),
        );
        timer.start();

        let event = tokio::time::timeout(Duration::from_secs(2), shutdown.recv())
            .await
            .expect("shutdown should be requested")
            .unwrap();
        assert!(matches!(event, ScanEvent::ShutdownRequested { .. }));
        timer.stop();
    }

    #[tokio::test]
    async fn test_activity_defers_shutdown() {
        let bus = EventBus::new(16);
        let mut shutdown = EventReceiver::new(
            bus.subscribe(),
            EventFilter::EventTypes(vec!["shutdown_requested"]),
            "test".to_string(),
        );
        let mut timer = InactivityTimer::new(
            Duration::from_millis(80),
            Duration::from_millis(10),
            bus.clone(),
        );
        timer.start();

        // Keep feeding activity for a while; no shutdown may fire meanwhile.
        for i in 0..5u64 {
            tokio::time::sleep(Duration::from_millis(30)).await;
            bus.publish(ScanEvent::FrameProcessed {
                frame_id: i,
                timestamp: SystemTime::now(),
            });
        }
        let early = tokio::time::timeout(Duration::from_millis(20), shutdown.recv()).await;
        assert!(early.is_err(), "shutdown fired despite activity");

        // Once activity stops the timeout elapses.
        let event = tokio::time::timeout(Duration::from_secs(2), shutdown.recv())
            .await
            .expect("shutdown should be requested")
            .unwrap();
        assert!(matches!(event, ScanEvent::ShutdownRequested { .. }));
        timer.stop();
    }
}
