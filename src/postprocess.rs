use crate::engine::{Decoded, MetadataKey};
use crate::format::BarcodeFormat;
use crate::geometry::Point;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Characters of decoded text shown in the transient status line.
const STATUS_PREVIEW_CHARS: usize = 32;

/// Metadata kinds allowed on the result display.
const DISPLAYABLE_METADATA: [MetadataKey; 4] = [
    MetadataKey::IssueNumber,
    MetadataKey::SuggestedPrice,
    MetadataKey::ErrorCorrectionLevel,
    MetadataKey::PossibleCountry,
];

/// Content classification for downstream routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    Uri,
    Email,
    Tel,
    Sms,
    Wifi,
    Geo,
    Calendar,
    Product,
    Isbn,
    Text,
}

/// A drawing instruction for the result overlay, in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OverlayShape {
    /// Line segment highlighting a linear symbol.
    Line { from: Point, to: Point },
    /// Point marker highlighting a 2D feature point.
    Marker { at: Point },
}

/// The display bitmap a live scan was captured into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayTarget {
    pub width: u32,
    pub height: u32,
}

/// Everything the UI collaborator needs to present a decode result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresentationModel {
    /// Full decoded text; never truncated.
    pub content: String,
    /// Transient status preview, truncated to a bounded length.
    pub status_line: String,
    pub format: BarcodeFormat,
    pub kind: ContentKind,
    /// Overlay instructions; empty when no display bitmap was captured.
    pub overlay: Vec<OverlayShape>,
    /// Filtered metadata display lines.
    pub metadata_lines: Vec<String>,
    pub decoded_at: DateTime<Utc>,
    pub from_live_scan: bool,
}

/// Turns a raw decode into a presentation model. Pure: no pipeline state.
pub struct ResultPostProcessor;

impl ResultPostProcessor {
    pub fn process(
        decoded: &Decoded,
        display: Option<DisplayTarget>,
        scale_factor: f32,
    ) -> PresentationModel {
        let overlay = match display {
            Some(_) => build_overlay(decoded, scale_factor),
            // History / non-live result: nothing to draw on.
            None => Vec::new(),
        };

        let metadata_lines = DISPLAYABLE_METADATA
            .iter()
            .filter_map(|key| decoded.metadata.get(key).cloned())
            .collect();

        let model = PresentationModel {
            content: decoded.text.clone(),
            status_line: truncate_status(&decoded.text),
            format: decoded.format,
            kind: classify(&decoded.text, decoded.format),
            overlay,
            metadata_lines,
            decoded_at: DateTime::<Utc>::from(decoded.timestamp),
            from_live_scan: display.is_some(),
        };
        debug!(
            "Post-processed {} result as {:?} ({} overlay shapes)",
            model.format,
            model.kind,
            model.overlay.len()
        );
        model
    }
}

/// Line segments for linear symbols, point markers otherwise. Formats that
/// carry a base symbol plus a supplement (UPC-A/EAN-13 reporting exactly four
/// points) get a dual-line overlay.
fn build_overlay(decoded: &Decoded, scale_factor: f32) -> Vec<OverlayShape> {
    let points = &decoded.points;
    match points.len() {
        0 => Vec::new(),
        2 => vec![OverlayShape::Line {
            from: points[0].scaled(scale_factor),
            to: points[1].scaled(scale_factor),
        }],
        4 if matches!(decoded.format, BarcodeFormat::UpcA | BarcodeFormat::Ean13) => vec![
            OverlayShape::Line {
                from: points[0].scaled(scale_factor),
                to: points[1].scaled(scale_factor),
            },
            OverlayShape::Line {
                from: points[2].scaled(scale_factor),
                to: points[3].scaled(scale_factor),
            },
        ],
        _ => points
            .iter()
            .map(|p| OverlayShape::Marker {
                at: p.scaled(scale_factor),
            })
            .collect(),
    }
}

fn truncate_status(text: &str) -> String {
    if text.chars().count() <= STATUS_PREVIEW_CHARS {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(STATUS_PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

fn classify(text: &str, format: BarcodeFormat) -> ContentKind {
    if format.is_product() {
        if format == BarcodeFormat::Ean13 && (text.starts_with("978") || text.starts_with("979")) {
            return ContentKind::Isbn;
        }
        return ContentKind::Product;
    }
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.") {
        ContentKind::Uri
    } else if lower.starts_with("mailto:") || lower.starts_with("matmsg:") {
        ContentKind::Email
    } else if lower.starts_with("tel:") {
        ContentKind::Tel
    } else if lower.starts_with("smsto:") || lower.starts_with("sms:") {
        ContentKind::Sms
    } else if lower.starts_with("wifi:") {
        ContentKind::Wifi
    } else if lower.starts_with("geo:") {
        ContentKind::Geo
    } else if lower.starts_with("begin:vevent") || lower.starts_with("begin:vcalendar") {
        ContentKind::Calendar
    } else {
        ContentKind::Text
    }
}
