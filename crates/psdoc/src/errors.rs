/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use core::fmt::{Debug, Display, Formatter};

use psdoc_core::bytestream::ByteIoError;

use crate::constants::DOCUMENT_SIGNATURE;

/// Errors that can occur while decoding a layered document.
///
/// Variants partition into three fatal classes plus plain I/O:
/// malformed input ([`is_format_error`](Self::is_format_error)),
/// valid-but-unsupported structures
/// ([`is_unsupported`](Self::is_unsupported)), and corrupt channel
/// payloads ([`BadRle`](Self::BadRle)). None of them are recoverable;
/// the parse aborts and the caller decides what to surface.
pub enum PsdDecodeErrors {
    /// The document does not start with the `8BPS` signature.
    WrongMagicBytes([u8; 4]),
    /// A 4-byte signature was not the expected one. Expected, then found.
    SignatureMismatch([u8; 4], [u8; 4]),
    /// Document version was neither 1 nor 2.
    UnsupportedVersion(u16),
    /// Bit depth outside {1, 8, 16}.
    UnsupportedBitDepth(u16),
    /// Color mode value not in the known set.
    UnknownColorMode(u16),
    /// Channel compression other than raw or RLE.
    UnsupportedCompression(u16),
    /// Channel count above the format cap. Limit, then found.
    TooManyChannels(usize, usize),
    /// Document dimensions above the configured limit. Limit, then found.
    LargeDimensions(usize, usize),
    /// A single layer extent above the sanity cap. Width, then height.
    OversizeLayer(i32, i32),
    /// Divider markers and group markers in the layer record stream
    /// do not pair up.
    UnbalancedGroupMarkers,
    /// An OSType tag the descriptor decoder does not know. Continuing
    /// would desynchronize every following read, so this aborts.
    UnsupportedOsType([u8; 4]),
    /// A unit code in a unit-float value outside the known set.
    UnsupportedUnit([u8; 4]),
    /// Corrupt or truncated RLE channel payload.
    BadRle(&'static str),
    /// Malformed engine-data text block.
    BadEngineData(&'static str),
    /// A validated scalar did not hold its required value.
    BadValue(&'static str),
    Generic(&'static str),
    IoErrors(ByteIoError)
}

impl PsdDecodeErrors {
    /// Whether this error means the input is structurally malformed.
    pub const fn is_format_error(&self) -> bool {
        matches!(
            self,
            PsdDecodeErrors::WrongMagicBytes(_)
                | PsdDecodeErrors::SignatureMismatch(_, _)
                | PsdDecodeErrors::UnsupportedVersion(_)
                | PsdDecodeErrors::UnknownColorMode(_)
                | PsdDecodeErrors::TooManyChannels(_, _)
                | PsdDecodeErrors::LargeDimensions(_, _)
                | PsdDecodeErrors::OversizeLayer(_, _)
                | PsdDecodeErrors::UnbalancedGroupMarkers
                | PsdDecodeErrors::BadEngineData(_)
                | PsdDecodeErrors::BadValue(_)
        )
    }

    /// Whether this error means the input uses a structure the parser
    /// knows about but does not decode.
    pub const fn is_unsupported(&self) -> bool {
        matches!(
            self,
            PsdDecodeErrors::UnsupportedOsType(_)
                | PsdDecodeErrors::UnsupportedUnit(_)
                | PsdDecodeErrors::UnsupportedBitDepth(_)
                | PsdDecodeErrors::UnsupportedCompression(_)
                | PsdDecodeErrors::UnsupportedVersion(_)
        )
    }
}

impl Debug for PsdDecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            PsdDecodeErrors::WrongMagicBytes(bytes) => {
                writeln!(
                    f,
                    "Expected {:?} but found {:?}, not a layered document",
                    DOCUMENT_SIGNATURE, bytes
                )
            }
            PsdDecodeErrors::SignatureMismatch(expected, found) => {
                writeln!(
                    f,
                    "Signature mismatch, expected {:?} but found {:?}",
                    core::str::from_utf8(expected).unwrap_or("????"),
                    core::str::from_utf8(found).unwrap_or("????")
                )
            }
            PsdDecodeErrors::UnsupportedVersion(version) => {
                writeln!(f, "Unsupported document version {version}, known versions are 1 and 2")
            }
            PsdDecodeErrors::UnsupportedBitDepth(depth) => {
                writeln!(f, "Unsupported bit depth {depth}, supported depths are 1, 8 and 16")
            }
            PsdDecodeErrors::UnknownColorMode(mode) => {
                writeln!(f, "Unknown color mode {mode}")
            }
            PsdDecodeErrors::UnsupportedCompression(method) => {
                writeln!(f, "Unsupported channel compression {method}")
            }
            PsdDecodeErrors::TooManyChannels(limit, found) => {
                writeln!(f, "Too many channels, limit is {limit} but found {found}")
            }
            PsdDecodeErrors::LargeDimensions(limit, found) => {
                writeln!(f, "Too large dimensions, configured limit {limit} but found {found}")
            }
            PsdDecodeErrors::OversizeLayer(width, height) => {
                writeln!(f, "Layer extent ({width}, {height}) exceeds the format sanity limit")
            }
            PsdDecodeErrors::UnbalancedGroupMarkers => {
                writeln!(f, "Group and divider markers in the layer stream do not balance")
            }
            PsdDecodeErrors::UnsupportedOsType(tag) => {
                writeln!(
                    f,
                    "Unsupported OSType tag {:?} in descriptor",
                    core::str::from_utf8(tag).unwrap_or("????")
                )
            }
            PsdDecodeErrors::UnsupportedUnit(tag) => {
                writeln!(
                    f,
                    "Unsupported unit code {:?} in unit float",
                    core::str::from_utf8(tag).unwrap_or("????")
                )
            }
            PsdDecodeErrors::BadRle(reason) => {
                writeln!(f, "Bad RLE: {reason}")
            }
            PsdDecodeErrors::BadEngineData(reason) => {
                writeln!(f, "Bad engine data: {reason}")
            }
            PsdDecodeErrors::BadValue(reason) => {
                writeln!(f, "Unexpected value: {reason}")
            }
            PsdDecodeErrors::Generic(reason) => {
                writeln!(f, "{reason}")
            }
            PsdDecodeErrors::IoErrors(err) => {
                writeln!(f, "I/O error: {err:?}")
            }
        }
    }
}

impl Display for PsdDecodeErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl std::error::Error for PsdDecodeErrors {}

impl From<&'static str> for PsdDecodeErrors {
    fn from(reason: &'static str) -> Self {
        Self::Generic(reason)
    }
}

impl From<ByteIoError> for PsdDecodeErrors {
    fn from(err: ByteIoError) -> Self {
        Self::IoErrors(err)
    }
}
