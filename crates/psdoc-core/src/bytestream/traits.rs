/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The input seam for document readers.

use crate::bytestream::ByteIoError;

/// The input trait for the document reader.
///
/// The layered-document format interleaves length-prefixed sections
/// whose decode is deferred until first access, so a source must
/// support cheap absolute seeks in addition to sequential reads. A
/// non-seekable stream cannot back a document; buffer it into memory
/// first and use [`MemSource`](crate::bytestream::MemSource).
pub trait ByteSource {
    /// Fill `buf` exactly or fail without advancing the position.
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<(), ByteIoError>;

    /// Read exactly `N` bytes.
    ///
    /// Same contract as [`read_exact_bytes`](Self::read_exact_bytes),
    /// split out so fixed-width numeric reads can avoid a length check
    /// on the buffer.
    fn read_const_bytes<const N: usize>(&mut self) -> Result<[u8; N], ByteIoError>;

    /// Move the cursor to an absolute offset.
    ///
    /// Seeking to the end of the source is allowed, seeking past it is
    /// an error.
    fn seek_to(&mut self, position: u64) -> Result<(), ByteIoError>;

    /// Current absolute offset of the cursor.
    fn position(&self) -> u64;

    /// Total length of the source in bytes.
    fn length(&self) -> u64;

    /// Whether the cursor sits at the end of the source.
    fn is_eof(&self) -> bool {
        self.position() >= self.length()
    }
}
