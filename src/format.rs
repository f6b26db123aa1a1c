use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Barcode symbologies the decode engine can be asked for.
///
/// This is the crate's own format vocabulary; the mapping to the codec
/// delegate lives at the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarcodeFormat {
    Aztec,
    Codabar,
    Code39,
    Code93,
    Code128,
    DataMatrix,
    Ean8,
    Ean13,
    Itf,
    MaxiCode,
    Pdf417,
    QrCode,
    Rss14,
    RssExpanded,
    UpcA,
    UpcE,
    UpcEanExtension,
    /// Reported by the codec delegate for symbologies outside this vocabulary.
    Unknown,
}

impl BarcodeFormat {
    /// Parse a single zxing-style format identifier. Returns `None` for
    /// unrecognized identifiers; callers ignore those rather than failing.
    pub fn parse(identifier: &str) -> Option<BarcodeFormat> {
        match identifier {
            "AZTEC" => Some(Self::Aztec),
            "CODABAR" => Some(Self::Codabar),
            "CODE_39" => Some(Self::Code39),
            "CODE_93" => Some(Self::Code93),
            "CODE_128" => Some(Self::Code128),
            "DATA_MATRIX" => Some(Self::DataMatrix),
            "EAN_8" => Some(Self::Ean8),
            "EAN_13" => Some(Self::Ean13),
            "ITF" => Some(Self::Itf),
            "MAXICODE" => Some(Self::MaxiCode),
            "PDF_417" => Some(Self::Pdf417),
            "QR_CODE" => Some(Self::QrCode),
            "RSS_14" => Some(Self::Rss14),
            "RSS_EXPANDED" => Some(Self::RssExpanded),
            "UPC_A" => Some(Self::UpcA),
            "UPC_E" => Some(Self::UpcE),
            "UPC_EAN_EXTENSION" => Some(Self::UpcEanExtension),
            _ => None,
        }
    }

    /// Linear symbologies get line-segment overlays instead of point markers.
    pub const fn is_one_d(self) -> bool {
        matches!(
            self,
            Self::Codabar
                | Self::Code39
                | Self::Code93
                | Self::Code128
                | Self::Ean8
                | Self::Ean13
                | Self::Itf
                | Self::Rss14
                | Self::RssExpanded
                | Self::UpcA
                | Self::UpcE
                | Self::UpcEanExtension
        )
    }

    /// Product (UPC/EAN family) symbologies.
    pub const fn is_product(self) -> bool {
        matches!(
            self,
            Self::Ean8
                | Self::Ean13
                | Self::Rss14
                | Self::RssExpanded
                | Self::UpcA
                | Self::UpcE
                | Self::UpcEanExtension
        )
    }
}

impl fmt::Display for BarcodeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Aztec => "AZTEC",
            Self::Codabar => "CODABAR",
            Self::Code39 => "CODE_39",
            Self::Code93 => "CODE_93",
            Self::Code128 => "CODE_128",
            Self::DataMatrix => "DATA_MATRIX",
            Self::Ean8 => "EAN_8",
            Self::Ean13 => "EAN_13",
            Self::Itf => "ITF",
            Self::MaxiCode => "MAXICODE",
            Self::Pdf417 => "PDF_417",
            Self::QrCode => "QR_CODE",
            Self::Rss14 => "RSS_14",
            Self::RssExpanded => "RSS_EXPANDED",
            Self::UpcA => "UPC_A",
            Self::UpcE => "UPC_E",
            Self::UpcEanExtension => "UPC_EAN_EXTENSION",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// UPC/EAN family, scanned for product-search invocations.
pub fn product_formats() -> HashSet<BarcodeFormat> {
    [
        BarcodeFormat::UpcA,
        BarcodeFormat::UpcE,
        BarcodeFormat::Ean8,
        BarcodeFormat::Ean13,
        BarcodeFormat::Rss14,
        BarcodeFormat::RssExpanded,
    ]
    .into_iter()
    .collect()
}

/// All linear symbologies.
pub fn one_d_formats() -> HashSet<BarcodeFormat> {
    let mut set = product_formats();
    set.extend([
        BarcodeFormat::Code39,
        BarcodeFormat::Code93,
        BarcodeFormat::Code128,
        BarcodeFormat::Itf,
        BarcodeFormat::Codabar,
    ]);
    set
}

fn family(name: &str) -> Option<HashSet<BarcodeFormat>> {
    match name {
        "PRODUCT_MODE" => Some(product_formats()),
        "ONE_D_MODE" => Some(one_d_formats()),
        "QR_CODE_MODE" => Some([BarcodeFormat::QrCode].into_iter().collect()),
        "DATA_MATRIX_MODE" => Some([BarcodeFormat::DataMatrix].into_iter().collect()),
        "AZTEC_MODE" => Some([BarcodeFormat::Aztec].into_iter().collect()),
        "PDF417_MODE" => Some([BarcodeFormat::Pdf417].into_iter().collect()),
        _ => None,
    }
}

/// Parse a list of format or family identifiers into a format set.
///
/// Unrecognized identifiers are logged and skipped, never fatal. An empty
/// result means "all formats" to the decode engine.
pub fn parse_format_set<'a, I>(identifiers: I) -> HashSet<BarcodeFormat>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut set = HashSet::new();
    for id in identifiers {
        let id = id.trim();
        if id.is_empty() {
            continue;
        }
        if let Some(formats) = family(id) {
            set.extend(formats);
        } else if let Some(format) = BarcodeFormat::parse(id) {
            set.insert(format);
        } else {
            debug!("Ignoring unrecognized format identifier: {}", id);
        }
    }
    set
}
