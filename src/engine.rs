use crate::error::{Result, ScanError};
use crate::format::BarcodeFormat;
use crate::frame::Rotation;
use crate::geometry::{Point, Rect};
use crate::luminance::{rotate_plane, LuminanceSource};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::SystemTime;
use tracing::{debug, trace};

use rxing::common::HybridBinarizer;
use rxing::{
    BarcodeFormat as RxFormat, BinaryBitmap, DecodeHintType, DecodeHintValue,
    DecodingHintDictionary, Exceptions, Luma8LuminanceSource, MultiFormatReader, RXingResult,
    Reader,
};

/// Result metadata kinds surfaced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataKey {
    IssueNumber,
    SuggestedPrice,
    ErrorCorrectionLevel,
    PossibleCountry,
    UpcEanExtension,
    Orientation,
    SymbologyIdentifier,
}

pub type Metadata = HashMap<MetadataKey, String>;

/// One decode attempt against a luminance plane. Built once per attempt and
/// never mutated.
#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub luminance: LuminanceSource,
    /// Empty set means all formats.
    pub formats: HashSet<BarcodeFormat>,
    /// Enables the rotated-orientation retry and the delegate's exhaustive
    /// search mode.
    pub try_harder: bool,
    /// Enables the inverted-threshold retry.
    pub also_inverted: bool,
    pub character_set: Option<String>,
    /// Cap on retry passes beyond the primary attempt.
    pub max_extra_attempts: u32,
}

/// A successfully decoded symbol, in full-frame coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decoded {
    pub text: String,
    pub raw_bytes: Option<Vec<u8>>,
    pub format: BarcodeFormat,
    pub points: Vec<Point>,
    pub metadata: Metadata,
    pub timestamp: SystemTime,
}

/// Outcome of a decode attempt. `NotFound` is the expected steady state, not
/// an error.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Found(Decoded),
    NotFound,
}

/// The seam the decode worker depends on; test instrumentation implements it.
pub trait Decoder: Send {
    fn decode(&mut self, request: &DecodeRequest) -> Result<DecodeOutcome>;
}

/// Orientation of the plane an attempt ran against, for mapping points back.
#[derive(Debug, Clone, Copy)]
enum AttemptOrientation {
    Upright,
    /// Plane was rotated 90 degrees clockwise; carries the rotated width.
    Rotated90 { rotated_width: u32 },
}

/// Multi-format decode engine delegating symbol location and decoding to the
/// rxing codecs behind an adaptive binarizer.
///
/// Decoding is deterministic: identical plane bytes and configuration always
/// produce the identical outcome.
pub struct DecodeEngine {
    reader: MultiFormatReader,
}

impl DecodeEngine {
    pub fn new() -> Self {
        Self {
            reader: MultiFormatReader::default(),
        }
    }

    fn attempt(
        &mut self,
        luma: Vec<u8>,
        width: u32,
        height: u32,
        hints: &DecodingHintDictionary,
    ) -> Result<Option<RXingResult>> {
        let source = Luma8LuminanceSource::new(luma, width, height);
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));
        match self.reader.decode_with_hints(&mut bitmap, hints) {
            Ok(result) => Ok(Some(result)),
            // No locatable/readable symbol: the common case, cheap by design.
            Err(Exceptions::NotFoundException(_))
            | Err(Exceptions::ChecksumException(_))
            | Err(Exceptions::FormatException(_)) => Ok(None),
            Err(e) => Err(ScanError::decode(e.to_string())),
        }
    }
}

impl Default for DecodeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for DecodeEngine {
    fn decode(&mut self, request: &DecodeRequest) -> Result<DecodeOutcome> {
        let crop = request.luminance.crop;
        if crop.is_empty() {
            return Err(ScanError::invalid_frame("empty crop rect"));
        }
        let luma = request.luminance.crop_to_vec();
        let hints = build_hints(request);

        if let Some(result) = self.attempt(luma.clone(), crop.width, crop.height, &hints)? {
            return Ok(DecodeOutcome::Found(convert(
                &result,
                crop,
                AttemptOrientation::Upright,
            )));
        }

        let mut budget = request.max_extra_attempts;
        if budget > 0 && request.also_inverted {
            budget -= 1;
            trace!("Retrying with inverted luminance");
            let inverted: Vec<u8> = luma.iter().map(|b| 255 - b).collect();
            if let Some(result) = self.attempt(inverted, crop.width, crop.height, &hints)? {
                return Ok(DecodeOutcome::Found(convert(
                    &result,
                    crop,
                    AttemptOrientation::Upright,
                )));
            }
        }
        if budget > 0 && request.try_harder {
            trace!("Retrying with rotated orientation");
            let (rotated, rot_w, rot_h) = rotate_plane(
                &luma,
                crop.width as usize,
                crop.height as usize,
                Rotation::Rotate90,
            );
            if let Some(result) = self.attempt(rotated, rot_w, rot_h, &hints)? {
                return Ok(DecodeOutcome::Found(convert(
                    &result,
                    crop,
                    AttemptOrientation::Rotated90 {
                        rotated_width: rot_w,
                    },
                )));
            }
        }

        Ok(DecodeOutcome::NotFound)
    }
}

fn build_hints(request: &DecodeRequest) -> DecodingHintDictionary {
    let mut hints: DecodingHintDictionary = HashMap::new();
    let rx_formats: HashSet<RxFormat> = request
        .formats
        .iter()
        .filter_map(|format| to_rx(*format))
        .collect();
    if !rx_formats.is_empty() {
        hints.insert(
            DecodeHintType::POSSIBLE_FORMATS,
            DecodeHintValue::PossibleFormats(rx_formats),
        );
    }
    if request.try_harder {
        hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));
    }
    if let Some(character_set) = &request.character_set {
        hints.insert(
            DecodeHintType::CHARACTER_SET,
            DecodeHintValue::CharacterSet(character_set.clone()),
        );
    }
    hints
}

/// Translate a delegate result into the crate's data model, mapping feature
/// points back into full-frame coordinates.
fn convert(result: &RXingResult, crop: Rect, orientation: AttemptOrientation) -> Decoded {
    let points = result
        .getPoints()
        .iter()
        .map(|p| {
            let (x, y) = match orientation {
                AttemptOrientation::Upright => (p.x, p.y),
                AttemptOrientation::Rotated90 { rotated_width } => {
                    // Inverse of the clockwise plane rotation.
                    (p.y, rotated_width as f32 - 1.0 - p.x)
                }
            };
            Point::new(x + crop.left as f32, y + crop.top as f32)
        })
        .collect();

    let mut metadata = Metadata::new();
    for value in result.getRXingResultMetadata().values() {
        use rxing::RXingResultMetadataValue as Value;
        let entry = match value {
            Value::IssueNumber(n) => Some((MetadataKey::IssueNumber, n.to_string())),
            Value::SuggestedPrice(s) => Some((MetadataKey::SuggestedPrice, s.to_string())),
            Value::ErrorCorrectionLevel(s) => {
                Some((MetadataKey::ErrorCorrectionLevel, s.to_string()))
            }
            Value::PossibleCountry(s) => Some((MetadataKey::PossibleCountry, s.to_string())),
            Value::UpcEanExtension(s) => Some((MetadataKey::UpcEanExtension, s.to_string())),
            Value::Orientation(n) => Some((MetadataKey::Orientation, n.to_string())),
            Value::SymbologyIdentifier(s) => {
                Some((MetadataKey::SymbologyIdentifier, s.to_string()))
            }
            _ => None,
        };
        if let Some((key, rendered)) = entry {
            metadata.insert(key, rendered);
        }
    }

    let raw = result.getRawBytes();
    let decoded = Decoded {
        text: result.getText().to_owned(),
        raw_bytes: if raw.is_empty() {
            None
        } else {
            Some(raw.clone())
        },
        format: from_rx(result.getBarcodeFormat()),
        points,
        metadata,
        timestamp: SystemTime::now(),
    };
    debug!(
        "Decoded {} symbol: {} points",
        decoded.format,
        decoded.points.len()
    );
    decoded
}

fn to_rx(format: BarcodeFormat) -> Option<RxFormat> {
    match format {
        BarcodeFormat::Aztec => Some(RxFormat::AZTEC),
        BarcodeFormat::Codabar => Some(RxFormat::CODABAR),
        BarcodeFormat::Code39 => Some(RxFormat::CODE_39),
        BarcodeFormat::Code93 => Some(RxFormat::CODE_93),
        BarcodeFormat::Code128 => Some(RxFormat::CODE_128),
        BarcodeFormat::DataMatrix => Some(RxFormat::DATA_MATRIX),
        BarcodeFormat::Ean8 => Some(RxFormat::EAN_8),
        BarcodeFormat::Ean13 => Some(RxFormat::EAN_13),
        BarcodeFormat::Itf => Some(RxFormat::ITF),
        BarcodeFormat::MaxiCode => Some(RxFormat::MAXICODE),
        BarcodeFormat::Pdf417 => Some(RxFormat::PDF_417),
        BarcodeFormat::QrCode => Some(RxFormat::QR_CODE),
        BarcodeFormat::Rss14 => Some(RxFormat::RSS_14),
        BarcodeFormat::RssExpanded => Some(RxFormat::RSS_EXPANDED),
        BarcodeFormat::UpcA => Some(RxFormat::UPC_A),
        BarcodeFormat::UpcE => Some(RxFormat::UPC_E),
        BarcodeFormat::UpcEanExtension => Some(RxFormat::UPC_EAN_EXTENSION),
        BarcodeFormat::Unknown => None,
    }
}

fn from_rx(format: &RxFormat) -> BarcodeFormat {
    match format {
        RxFormat::AZTEC => BarcodeFormat::Aztec,
        RxFormat::CODABAR => BarcodeFormat::Codabar,
        RxFormat::CODE_39 => BarcodeFormat::Code39,
        RxFormat::CODE_93 => BarcodeFormat::Code93,
        RxFormat::CODE_128 => BarcodeFormat::Code128,
        RxFormat::DATA_MATRIX => BarcodeFormat::DataMatrix,
        RxFormat::EAN_8 => BarcodeFormat::Ean8,
        RxFormat::EAN_13 => BarcodeFormat::Ean13,
        RxFormat::ITF => BarcodeFormat::Itf,
        RxFormat::MAXICODE => BarcodeFormat::MaxiCode,
        RxFormat::PDF_417 => BarcodeFormat::Pdf417,
        RxFormat::QR_CODE => BarcodeFormat::QrCode,
        RxFormat::RSS_14 => BarcodeFormat::Rss14,
        RxFormat::RSS_EXPANDED => BarcodeFormat::RssExpanded,
        RxFormat::UPC_A => BarcodeFormat::UpcA,
        RxFormat::UPC_E => BarcodeFormat::UpcE,
        RxFormat::UPC_EAN_EXTENSION => BarcodeFormat::UpcEanExtension,
        _ => BarcodeFormat::Unknown,
    }
}
