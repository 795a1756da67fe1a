/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Shared enums and tag constants for the layered-document container.

use bitflags::bitflags;

/// Top-level document signature.
pub const DOCUMENT_SIGNATURE: [u8; 4] = *b"8BPS";
/// Signature of resource blocks and layer-record sub-sections.
pub const RESOURCE_SIGNATURE: [u8; 4] = *b"8BIM";
/// Alternative resource signature used by 64-bit-length blocks.
pub const RESOURCE_SIGNATURE_64: [u8; 4] = *b"8B64";
/// Signature of a linked-layer entry.
pub const LINKED_LAYER_SIGNATURE: [u8; 4] = *b"liFD";

/// Color modes supported by the container.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ColorMode {
    Bitmap,
    Grayscale,
    Indexed,
    Rgb,
    Cmyk,
    Multichannel,
    Duotone,
    Lab
}

impl ColorMode {
    pub fn from_int(value: u16) -> Option<ColorMode> {
        match value {
            0 => Some(ColorMode::Bitmap),
            1 => Some(ColorMode::Grayscale),
            2 => Some(ColorMode::Indexed),
            3 => Some(ColorMode::Rgb),
            4 => Some(ColorMode::Cmyk),
            7 => Some(ColorMode::Multichannel),
            8 => Some(ColorMode::Duotone),
            9 => Some(ColorMode::Lab),
            _ => None
        }
    }
}

/// Channel data compression.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompressionMethod {
    Raw,
    Rle,
    Zip,
    ZipPrediction
}

impl CompressionMethod {
    pub fn from_int(value: u16) -> Option<CompressionMethod> {
        match value {
            0 => Some(CompressionMethod::Raw),
            1 => Some(CompressionMethod::Rle),
            2 => Some(CompressionMethod::Zip),
            3 => Some(CompressionMethod::ZipPrediction),
            _ => None
        }
    }
}

/// Per-record tag distinguishing plain layers from the group markers
/// the tree reconstruction is driven by.
///
/// Stored in the `lsct` resource block, absent means [`Normal`](Self::Normal).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SectionType {
    #[default]
    Normal,
    GroupOpen,
    GroupClosed,
    Divider
}

impl SectionType {
    pub fn from_int(value: i32) -> SectionType {
        match value {
            1 => SectionType::GroupOpen,
            2 => SectionType::GroupClosed,
            3 => SectionType::Divider,
            _ => SectionType::Normal
        }
    }

    /// Whether a record with this tag is itself a group container.
    pub const fn is_group(self) -> bool {
        matches!(self, SectionType::GroupOpen | SectionType::GroupClosed)
    }
}

bitflags! {
    /// The per-layer flags byte.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct LayerFlags: u8 {
        const TRANSPARENCY_PROTECTED = 0x01;
        /// Set when the layer is hidden. Callers want the inverse,
        /// see [`PsdLayer::is_visible`](crate::PsdLayer::is_visible).
        const HIDDEN                 = 0x02;
        const OBSOLETE               = 0x04;
        const HAS_USEFUL_INFORMATION = 0x08;
        const PIXEL_DATA_IRRELEVANT  = 0x10;
    }
}

/// Layer blend modes, decoded from their 4-byte codes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum BlendMode {
    PassThrough,
    #[default]
    Normal,
    Dissolve,
    Darken,
    Multiply,
    ColorBurn,
    LinearBurn,
    DarkerColor,
    Lighten,
    Screen,
    ColorDodge,
    LinearDodge,
    LighterColor,
    Overlay,
    SoftLight,
    HardLight,
    VividLight,
    LinearLight,
    PinLight,
    HardMix,
    Difference,
    Exclusion,
    Subtract,
    Divide,
    Hue,
    Saturation,
    Color,
    Luminosity
}

impl BlendMode {
    /// Map a blend-mode code to its enum value.
    ///
    /// Unknown codes fall back to [`Normal`](Self::Normal); producers
    /// have historically invented codes here and a wrong blend mode is
    /// harmless to the import surface.
    pub fn from_tag(tag: &[u8; 4]) -> BlendMode {
        match tag {
            b"pass" => BlendMode::PassThrough,
            b"norm" => BlendMode::Normal,
            b"diss" => BlendMode::Dissolve,
            b"dark" => BlendMode::Darken,
            b"mul " => BlendMode::Multiply,
            b"idiv" => BlendMode::ColorBurn,
            b"lbrn" => BlendMode::LinearBurn,
            b"dkCl" => BlendMode::DarkerColor,
            b"lite" => BlendMode::Lighten,
            b"scrn" => BlendMode::Screen,
            b"div " => BlendMode::ColorDodge,
            b"lddg" => BlendMode::LinearDodge,
            b"lgCl" => BlendMode::LighterColor,
            b"over" => BlendMode::Overlay,
            b"sLit" => BlendMode::SoftLight,
            b"hLit" => BlendMode::HardLight,
            b"vLit" => BlendMode::VividLight,
            b"lLit" => BlendMode::LinearLight,
            b"pLit" => BlendMode::PinLight,
            b"hMix" => BlendMode::HardMix,
            b"diff" => BlendMode::Difference,
            b"smud" => BlendMode::Exclusion,
            b"fsub" => BlendMode::Subtract,
            b"fdiv" => BlendMode::Divide,
            b"hue " => BlendMode::Hue,
            b"sat " => BlendMode::Saturation,
            b"colr" => BlendMode::Color,
            b"lum " => BlendMode::Luminosity,
            _ => BlendMode::Normal
        }
    }
}

/// Unit kinds carried by unit-float descriptor values.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UnitKind {
    /// Angle, base degrees.
    Angle,
    /// Density, base per inch.
    Density,
    /// Distance, base 72 ppi.
    Distance,
    /// Coerced, unitless.
    None,
    Percent,
    Pixels,
    Points,
    Millimeters
}

impl UnitKind {
    pub fn from_tag(tag: &[u8; 4]) -> Option<UnitKind> {
        match tag {
            b"#Ang" => Some(UnitKind::Angle),
            b"#Rsl" => Some(UnitKind::Density),
            b"#Rlt" => Some(UnitKind::Distance),
            b"#Nne" => Some(UnitKind::None),
            b"#Prc" => Some(UnitKind::Percent),
            b"#Pxl" => Some(UnitKind::Pixels),
            b"#Pnt" => Some(UnitKind::Points),
            b"#Mlm" => Some(UnitKind::Millimeters),
            _ => None
        }
    }
}
