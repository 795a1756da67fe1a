/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use crate::bytestream::{ByteIoError, ByteSource};

/// An in-memory byte source.
///
/// Wraps anything that dereferences to a byte slice (`Vec<u8>`,
/// `&[u8]`, memory-mapped files) and tracks a cursor position.
/// This is the expected way to feed a document to the parser.
pub struct MemSource<T: AsRef<[u8]>> {
    data:     T,
    position: usize
}

impl<T: AsRef<[u8]>> MemSource<T> {
    pub fn new(data: T) -> MemSource<T> {
        MemSource { data, position: 0 }
    }

    /// Destroy this source returning the underlying bytes.
    pub fn consume(self) -> T {
        self.data
    }

    fn remaining(&self) -> usize {
        self.data.as_ref().len().saturating_sub(self.position)
    }
}

impl<T: AsRef<[u8]>> ByteSource for MemSource<T> {
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<(), ByteIoError> {
        if buf.len() > self.remaining() {
            return Err(ByteIoError::NotEnoughBytes(buf.len(), self.remaining()));
        }
        let data = self.data.as_ref();
        buf.copy_from_slice(&data[self.position..self.position + buf.len()]);
        self.position += buf.len();
        Ok(())
    }

    fn read_const_bytes<const N: usize>(&mut self) -> Result<[u8; N], ByteIoError> {
        if N > self.remaining() {
            return Err(ByteIoError::NotEnoughBytes(N, self.remaining()));
        }
        let data = self.data.as_ref();
        let mut out = [0_u8; N];
        out.copy_from_slice(&data[self.position..self.position + N]);
        self.position += N;
        Ok(out)
    }

    fn seek_to(&mut self, position: u64) -> Result<(), ByteIoError> {
        if position > self.data.as_ref().len() as u64 {
            return Err(ByteIoError::SeekOutOfBounds(position));
        }
        self.position = position as usize;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position as u64
    }

    fn length(&self) -> u64 {
        self.data.as_ref().len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_read_advances_cursor() {
        let mut source = MemSource::new([1_u8, 2, 3, 4]);
        let mut buf = [0_u8; 2];
        source.read_exact_bytes(&mut buf).unwrap();
        assert_eq!(buf, [1, 2]);
        assert_eq!(source.position(), 2);
    }

    #[test]
    fn short_read_fails_without_advancing() {
        let mut source = MemSource::new([1_u8, 2]);
        let mut buf = [0_u8; 4];
        assert!(source.read_exact_bytes(&mut buf).is_err());
        assert_eq!(source.position(), 0);
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let mut source = MemSource::new([0_u8; 8]);
        source.seek_to(8).unwrap();
        assert!(source.is_eof());
        assert!(source.seek_to(9).is_err());
    }
}
