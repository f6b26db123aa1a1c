pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod format;
pub mod frame;
pub mod geometry;
pub mod luminance;
pub mod postprocess;
pub mod request;
pub mod session;
pub mod slot;
pub mod source;
pub mod timers;
pub mod viewfinder;
pub mod worker;

pub use config::ScanConfig;
pub use engine::{DecodeEngine, DecodeOutcome, DecodeRequest, Decoded, Decoder, Metadata, MetadataKey};
pub use error::{Result, ScanError};
pub use events::{EventBus, EventFilter, EventReceiver, ScanEvent};
pub use format::BarcodeFormat;
pub use frame::{Frame, FrameFormat, Rotation};
pub use geometry::{Point, Rect};
pub use luminance::{LuminanceExtractor, LuminanceSource};
pub use postprocess::{ContentKind, DisplayTarget, OverlayShape, PresentationModel, ResultPostProcessor};
pub use request::{IntentSource, ScanRequest, SessionOverrides};
pub use session::{ScanSession, SessionState};
pub use slot::{FrameSlot, SlotStatsSnapshot};
pub use source::{FrameSource, SyntheticFrameSource};
pub use timers::{AmbientLightManager, InactivityTimer};
pub use viewfinder::ViewfinderState;
pub use worker::{DecodeSettings, DecodeWorker, WorkerHandle, WorkerState};
