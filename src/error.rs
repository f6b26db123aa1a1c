use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Invalid frame: {details}")]
    InvalidFrame { details: String },

    #[error("Camera unavailable: {details}")]
    CameraUnavailable { details: String },

    #[error("Decode fault: {details}")]
    Decode { details: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl ScanError {
    pub fn invalid_frame<S: Into<String>>(details: S) -> Self {
        Self::InvalidFrame {
            details: details.into(),
        }
    }

    pub fn camera_unavailable<S: Into<String>>(details: S) -> Self {
        Self::CameraUnavailable {
            details: details.into(),
        }
    }

    pub fn decode<S: Into<String>>(details: S) -> Self {
        Self::Decode {
            details: details.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Frame-level errors are skipped by the decode loop; anything else
    /// terminates the session.
    pub fn is_frame_level(&self) -> bool {
        matches!(self, Self::InvalidFrame { .. } | Self::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
