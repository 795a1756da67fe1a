/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Small helpers shared by the section readers.

use psdoc_core::bytestream::{ByteSource, PsdReader};

use crate::constants::{RESOURCE_SIGNATURE, RESOURCE_SIGNATURE_64};
use crate::errors::PsdDecodeErrors;

/// Read a 4-byte tag and fail unless it matches `expected`.
pub(crate) fn validate_signature<T: ByteSource>(
    reader: &mut PsdReader<T>, expected: [u8; 4]
) -> Result<(), PsdDecodeErrors> {
    let found = reader.read_tag()?;
    if found != expected {
        return Err(PsdDecodeErrors::SignatureMismatch(expected, found));
    }
    Ok(())
}

/// Validate the resource-block signature, accepting the 64-bit
/// variant when `allow_64bit` is set.
pub(crate) fn validate_resource_signature<T: ByteSource>(
    reader: &mut PsdReader<T>, allow_64bit: bool
) -> Result<(), PsdDecodeErrors> {
    let found = reader.read_tag()?;
    if found == RESOURCE_SIGNATURE {
        return Ok(());
    }
    if allow_64bit && found == RESOURCE_SIGNATURE_64 {
        return Ok(());
    }
    Err(PsdDecodeErrors::SignatureMismatch(RESOURCE_SIGNATURE, found))
}

/// Read an `i32` and fail unless it equals `expected`.
pub(crate) fn validate_i32<T: ByteSource>(
    reader: &mut PsdReader<T>, expected: i32, what: &'static str
) -> Result<(), PsdDecodeErrors> {
    let found = reader.read_i32()?;
    if found != expected {
        return Err(PsdDecodeErrors::BadValue(what));
    }
    Ok(())
}

/// Read an `i16` and fail unless it equals `expected`.
pub(crate) fn validate_i16<T: ByteSource>(
    reader: &mut PsdReader<T>, expected: i16, what: &'static str
) -> Result<(), PsdDecodeErrors> {
    let found = reader.read_i16()?;
    if found != expected {
        return Err(PsdDecodeErrors::BadValue(what));
    }
    Ok(())
}

/// Bytes per row for one channel at the given bit depth.
pub(crate) fn depth_to_pitch(depth: u16, width: usize) -> Result<usize, PsdDecodeErrors> {
    match depth {
        1 | 8 => Ok(width),
        16 => Ok(width * 2),
        _ => Err(PsdDecodeErrors::UnsupportedBitDepth(depth))
    }
}
