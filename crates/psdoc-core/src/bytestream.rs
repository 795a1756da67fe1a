/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Byte sources and the big-endian document reader.

mod cursor;
mod reader;
mod traits;

pub use cursor::MemSource;
pub use reader::PsdReader;
pub use traits::ByteSource;

use core::fmt::{Debug, Formatter};

/// Errors arising from the underlying byte source.
pub enum ByteIoError {
    /// Requested `.0` bytes but only `.1` were available.
    NotEnoughBytes(usize, usize),
    /// A seek target outside the source.
    SeekOutOfBounds(u64),
    /// Any other I/O failure.
    Generic(&'static str)
}

impl Debug for ByteIoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ByteIoError::NotEnoughBytes(expected, found) => {
                writeln!(f, "Not enough bytes, expected {expected} but found {found}")
            }
            ByteIoError::SeekOutOfBounds(position) => {
                writeln!(f, "Seek to position {position} is out of bounds")
            }
            ByteIoError::Generic(err) => {
                writeln!(f, "Generic I/O error: {err}")
            }
        }
    }
}

impl From<&'static str> for ByteIoError {
    fn from(value: &'static str) -> Self {
        ByteIoError::Generic(value)
    }
}
