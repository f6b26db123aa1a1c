use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScanConfig {
    pub session: SessionConfig,
    pub engine: EngineConfig,
    pub viewfinder: ViewfinderConfig,
    pub inactivity: InactivityConfig,
    pub ambient_light: AmbientLightConfig,
    pub synthetic: SyntheticConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Display scale factor applied to overlay coordinates
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f32,

    /// Event bus channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Preview restart delay after an externally requested result, in ms
    #[serde(default = "default_result_duration_ms")]
    pub result_duration_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EngineConfig {
    /// Format or family identifiers to decode; empty means all formats
    #[serde(default)]
    pub formats: Vec<String>,

    /// Spend more time per frame for difficult symbols
    #[serde(default = "default_try_harder")]
    pub try_harder: bool,

    /// Also try the inverted image when the primary attempt finds nothing
    #[serde(default = "default_also_inverted")]
    pub also_inverted: bool,

    /// Extra decode attempts allowed per frame beyond the primary one
    #[serde(default = "default_max_extra_attempts")]
    pub max_extra_attempts: u32,

    /// Character set hint for text payloads (e.g. "UTF-8")
    #[serde(default)]
    pub character_set: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ViewfinderConfig {
    /// Screen width in pixels
    #[serde(default = "default_screen_width")]
    pub screen_width: u32,

    /// Screen height in pixels
    #[serde(default = "default_screen_height")]
    pub screen_height: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InactivityConfig {
    /// Seconds without activity before shutdown is requested
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Idle check interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AmbientLightConfig {
    /// Lux at or below which the torch is recommended on
    #[serde(default = "default_too_dark_lux")]
    pub too_dark_lux: f32,

    /// Lux at or above which the torch is recommended off
    #[serde(default = "default_bright_enough_lux")]
    pub bright_enough_lux: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyntheticConfig {
    /// Replay rate for the synthetic frame source
    #[serde(default = "default_synthetic_fps")]
    pub fps: u32,
}

fn default_scale_factor() -> f32 {
    1.0
}

fn default_event_capacity() -> usize {
    100
}

fn default_result_duration_ms() -> u64 {
    1500
}

fn default_try_harder() -> bool {
    false
}

fn default_also_inverted() -> bool {
    false
}

fn default_max_extra_attempts() -> u32 {
    2
}

fn default_screen_width() -> u32 {
    1080
}

fn default_screen_height() -> u32 {
    1920
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_too_dark_lux() -> f32 {
    crate::timers::TOO_DARK_LUX
}

fn default_bright_enough_lux() -> f32 {
    crate::timers::BRIGHT_ENOUGH_LUX
}

fn default_synthetic_fps() -> u32 {
    15
}

impl ScanConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("framescan.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("session.scale_factor", default_scale_factor() as f64)?
            .set_default("session.event_capacity", default_event_capacity() as i64)?
            .set_default(
                "session.result_duration_ms",
                default_result_duration_ms() as i64,
            )?
            .set_default("engine.formats", Vec::<String>::new())?
            .set_default("engine.try_harder", default_try_harder())?
            .set_default("engine.also_inverted", default_also_inverted())?
            .set_default(
                "engine.max_extra_attempts",
                default_max_extra_attempts() as i64,
            )?
            .set_default("viewfinder.screen_width", default_screen_width())?
            .set_default("viewfinder.screen_height", default_screen_height())?
            .set_default(
                "inactivity.idle_timeout_secs",
                default_idle_timeout_secs() as i64,
            )?
            .set_default(
                "inactivity.poll_interval_ms",
                default_poll_interval_ms() as i64,
            )?
            .set_default("ambient_light.too_dark_lux", default_too_dark_lux() as f64)?
            .set_default(
                "ambient_light.bright_enough_lux",
                default_bright_enough_lux() as f64,
            )?
            .set_default("synthetic.fps", default_synthetic_fps())?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(Environment::with_prefix("FRAMESCAN").separator("__"))
            .build()?;

        let config: ScanConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.scale_factor <= 0.0 {
            return Err(ConfigError::Message(
                "Session scale_factor must be greater than 0".to_string(),
            ));
        }

        if self.session.event_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        if self.viewfinder.screen_width == 0 || self.viewfinder.screen_height == 0 {
            return Err(ConfigError::Message(
                "Screen resolution must be greater than 0".to_string(),
            ));
        }

        if self.inactivity.idle_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Inactivity idle_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.ambient_light.too_dark_lux >= self.ambient_light.bright_enough_lux {
            return Err(ConfigError::Message(
                "Ambient light too_dark_lux must be below bright_enough_lux".to_string(),
            ));
        }

        if self.synthetic.fps == 0 {
            return Err(ConfigError::Message(
                "Synthetic fps must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Serialize the configuration as pretty TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig {
                scale_factor: default_scale_factor(),
                event_capacity: default_event_capacity(),
                result_duration_ms: default_result_duration_ms(),
            },
            engine: EngineConfig {
                formats: Vec::new(),
                try_harder: default_try_harder(),
                also_inverted: default_also_inverted(),
                max_extra_attempts: default_max_extra_attempts(),
                character_set: None,
            },
            viewfinder: ViewfinderConfig {
                screen_width: default_screen_width(),
                screen_height: default_screen_height(),
            },
            inactivity: InactivityConfig {
                idle_timeout_secs: default_idle_timeout_secs(),
                poll_interval_ms: default_poll_interval_ms(),
            },
            ambient_light: AmbientLightConfig {
                too_dark_lux: default_too_dark_lux(),
                bright_enough_lux: default_bright_enough_lux(),
            },
            synthetic: SyntheticConfig {
                fps: default_synthetic_fps(),
            },
        }
    }
}
