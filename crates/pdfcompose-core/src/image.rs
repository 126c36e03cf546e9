//! Image descriptors reported by the content-stream walker.

use std::collections::BTreeMap;
use std::fmt;

use crate::operation::{InlineImage, Operand};

/// How an image was placed in the content stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ImageKind {
    /// `BI ... ID ... EI` sequence.
    Inline,
    /// Image XObject invoked with `Do`.
    XObject,
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Inline => f.write_str("inline"),
            ImageKind::XObject => f.write_str("xobject"),
        }
    }
}

/// Pixel metadata of an image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageInfo {
    /// Width in samples.
    pub width: u32,
    /// Height in samples.
    pub height: u32,
    /// Bits per color component, absent for image masks without `/BPC`.
    pub bits_per_component: Option<u32>,
    /// Colorspace family name (e.g., `"DeviceRGB"`, `"ICCBased"`).
    pub colorspace: Option<String>,
    /// Color components per sample, when the colorspace determines it.
    pub color_components: Option<u32>,
    /// Outermost decode filter (e.g., `"DCTDecode"`), absent for raw samples.
    pub filter: Option<String>,
}

impl ImageInfo {
    /// Read the metadata of an inline image, expanding abbreviated names.
    ///
    /// A colorspace that is neither a device family nor an inline
    /// abbreviation is returned as written; it names an entry of the
    /// resources' `/ColorSpace` table and must be resolved by the caller.
    pub fn from_inline(image: &InlineImage) -> Self {
        let number = |full: &str, abbr: &str| {
            image
                .get(full, abbr)
                .and_then(Operand::as_i64)
                .and_then(|v| u32::try_from(v).ok())
        };

        let colorspace = image.get("ColorSpace", "CS").and_then(|cs| match cs {
            Operand::Name(name) => Some(expand_inline_colorspace(name).to_string()),
            // [/Indexed /RGB 255 <...>] and similar array forms
            Operand::Array(items) => items
                .first()
                .and_then(Operand::as_name)
                .map(|family| expand_inline_colorspace(family).to_string()),
            _ => None,
        });

        let filter = image.get("Filter", "F").and_then(|f| match f {
            Operand::Name(name) => Some(expand_inline_filter(name).to_string()),
            Operand::Array(items) => items
                .last()
                .and_then(Operand::as_name)
                .map(|name| expand_inline_filter(name).to_string()),
            _ => None,
        });

        Self {
            width: number("Width", "W").unwrap_or(0),
            height: number("Height", "H").unwrap_or(0),
            bits_per_component: number("BitsPerComponent", "BPC"),
            color_components: colorspace.as_deref().and_then(family_components),
            colorspace,
            filter,
        }
    }
}

/// One image found by a walk.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredImage {
    /// Inline or XObject.
    pub kind: ImageKind,
    /// XObject resource name; `None` for inline images.
    pub name: Option<String>,
    /// Pixel metadata.
    pub info: ImageInfo,
    /// Form XObject nesting depth at which the image was placed (page = 0).
    pub depth: usize,
    /// Index of the placing operator within its own content stream.
    pub operator_index: usize,
}

/// Caller-owned histogram of filters and colorspaces across walks.
///
/// Images without a filter or colorspace are counted under `"None"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UsageStats {
    /// Images seen.
    pub images: usize,
    /// Count per filter name.
    pub filters: BTreeMap<String, usize>,
    /// Count per colorspace name.
    pub colorspaces: BTreeMap<String, usize>,
}

impl UsageStats {
    /// Add one image to the histograms.
    pub fn record(&mut self, info: &ImageInfo) {
        self.images += 1;
        let filter = info.filter.as_deref().unwrap_or("None");
        *self.filters.entry(filter.to_string()).or_default() += 1;
        let colorspace = info.colorspace.as_deref().unwrap_or("None");
        *self.colorspaces.entry(colorspace.to_string()).or_default() += 1;
    }
}

/// Components per sample of a colorspace family.
///
/// `None` for families whose component count depends on their parameters
/// (`ICCBased`, `DeviceN`) and for `Pattern`.
pub fn family_components(family: &str) -> Option<u32> {
    match family {
        "DeviceGray" | "CalGray" | "Indexed" | "Separation" => Some(1),
        "DeviceRGB" | "CalRGB" | "Lab" => Some(3),
        "DeviceCMYK" => Some(4),
        _ => None,
    }
}

/// Expand an abbreviated inline colorspace name.
pub fn expand_inline_colorspace(name: &str) -> &str {
    match name {
        "G" => "DeviceGray",
        "RGB" => "DeviceRGB",
        "CMYK" => "DeviceCMYK",
        "I" => "Indexed",
        other => other,
    }
}

/// Expand an abbreviated inline filter name.
pub fn expand_inline_filter(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

/// Returns true for colorspace names that never need a resource lookup.
pub fn is_builtin_colorspace(name: &str) -> bool {
    matches!(
        name,
        "DeviceGray"
            | "DeviceRGB"
            | "DeviceCMYK"
            | "Pattern"
            | "Indexed"
            | "CalGray"
            | "CalRGB"
            | "Lab"
            | "ICCBased"
            | "Separation"
            | "DeviceN"
    )
}
