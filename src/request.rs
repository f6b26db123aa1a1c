use crate::format::{self, BarcodeFormat};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Where a scan request came from. Determines result delivery and which
/// defaults the caller may override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentSource {
    /// Local interactive scan; results are presented in place.
    None,
    /// Another application asked for a scan and waits for the result.
    NativeAppIntent { return_to_caller: bool },
    /// A product search link; format choice is forced to retail symbologies.
    ProductSearchLink { url: String },
    /// A hosted scan link, optionally redirecting the result to a return URL.
    ZxingLink {
        url: String,
        return_url: Option<String>,
    },
}

/// Caller-supplied scan parameters, resolved against session defaults before
/// the pipeline starts.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub source: IntentSource,
    /// Format or family identifiers ("QR_CODE", "PRODUCT_MODE", ...).
    pub formats: Vec<String>,
    /// Free-form decode hints by name; unknown names are ignored.
    pub hints: HashMap<String, String>,
    pub character_set: Option<String>,
    /// Requested capture region (width, height), centered in the preview.
    pub manual_region: Option<(u32, u32)>,
    /// Message shown in place of the default scanning prompt.
    pub prompt_message: Option<String>,
}

impl ScanRequest {
    pub fn new(source: IntentSource) -> Self {
        Self {
            source,
            formats: Vec::new(),
            hints: HashMap::new(),
            character_set: None,
            manual_region: None,
            prompt_message: None,
        }
    }

    /// Resolve the request into concrete overrides for the session.
    pub fn resolve(&self) -> SessionOverrides {
        // Product search links only ever decode retail symbologies, whatever
        // the request says.
        let formats = if matches!(self.source, IntentSource::ProductSearchLink { .. }) {
            format::product_formats()
        } else {
            format::parse_format_set(self.formats.iter().map(String::as_str))
        };

        let mut overrides = SessionOverrides {
            formats,
            try_harder: None,
            also_inverted: None,
            character_set: self.character_set.clone(),
            manual_region: self.manual_region,
            prompt_message: self.prompt_message.clone(),
        };

        for (name, value) in &self.hints {
            match name.as_str() {
                "TRY_HARDER" => overrides.try_harder = parse_bool(value),
                "ALSO_INVERTED" => overrides.also_inverted = parse_bool(value),
                "CHARACTER_SET" => {
                    if overrides.character_set.is_none() {
                        overrides.character_set = Some(value.clone());
                    }
                }
                other => {
                    debug!("Ignoring unsupported scan hint '{}'", other);
                }
            }
        }

        overrides
    }
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self::new(IntentSource::None)
    }
}

/// Per-session overrides produced from a [`ScanRequest`]. `None` fields fall
/// through to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    /// Empty set means "decode all formats".
    pub formats: HashSet<BarcodeFormat>,
    pub try_harder: Option<bool>,
    pub also_inverted: Option<bool>,
    pub character_set: Option<String>,
    pub manual_region: Option<(u32, u32)>,
    pub prompt_message: Option<String>,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
