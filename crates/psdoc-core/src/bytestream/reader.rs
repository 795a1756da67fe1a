/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

use crate::bytestream::{ByteIoError, ByteSource};

macro_rules! get_single_type {
    ($name:tt, $int_type:tt) => {
        impl<T: ByteSource> PsdReader<T> {
            #[doc = concat!("Read a big-endian `", stringify!($int_type), "` from the source.")]
            #[inline]
            pub fn $name(&mut self) -> Result<$int_type, ByteIoError> {
                const SIZE_OF_VAL: usize = core::mem::size_of::<$int_type>();

                let space = self.inner.read_const_bytes::<SIZE_OF_VAL>()?;
                Ok($int_type::from_be_bytes(space))
            }
        }
    };
}

/// A big-endian reader over a seekable byte source.
///
/// Provides the primitive decoding conventions of the layered-document
/// container: fixed-width big-endian integers and floats, 4-byte type
/// tags, Pascal and UTF-16 strings, length-or-4 keys, and the
/// version-gated section length (32-bit for version 1 documents,
/// 64-bit for version 2).
///
/// The reader carries the document version because nested readers
/// (channel data, linked sub-documents) inherit it.
pub struct PsdReader<T: ByteSource> {
    inner:   T,
    version: u16
}

get_single_type!(read_u16, u16);
get_single_type!(read_i16, i16);
get_single_type!(read_u32, u32);
get_single_type!(read_i32, i32);
get_single_type!(read_u64, u64);
get_single_type!(read_i64, i64);

impl<T: ByteSource> PsdReader<T> {
    pub fn new(source: T) -> PsdReader<T> {
        PsdReader {
            inner:   source,
            version: 1
        }
    }

    /// Destroy this reader returning the underlying source.
    pub fn consume(self) -> T {
        self.inner
    }

    /// Document version, 1 or 2; gates [`read_length`](Self::read_length).
    pub const fn version(&self) -> u16 {
        self.version
    }

    pub fn set_version(&mut self, version: u16) {
        self.version = version;
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8, ByteIoError> {
        let buf = self.inner.read_const_bytes::<1>()?;
        Ok(buf[0])
    }

    /// Read a single byte interpreted as a boolean, any non-zero value
    /// is `true`.
    #[inline]
    pub fn read_bool(&mut self) -> Result<bool, ByteIoError> {
        Ok(self.read_u8()? != 0)
    }

    #[inline]
    pub fn read_f64(&mut self) -> Result<f64, ByteIoError> {
        let space = self.inner.read_const_bytes::<8>()?;
        Ok(f64::from_be_bytes(space))
    }

    pub fn read_f64_array(&mut self, count: usize) -> Result<Vec<f64>, ByteIoError> {
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_f64()?);
        }
        Ok(values)
    }

    pub fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<(), ByteIoError> {
        self.inner.read_exact_bytes(buf)
    }

    pub fn read_bytes_vec(&mut self, count: usize) -> Result<Vec<u8>, ByteIoError> {
        let mut buf = vec![0_u8; count];
        self.inner.read_exact_bytes(&mut buf)?;
        Ok(buf)
    }

    /// Read `count` bytes of ASCII text.
    ///
    /// Bytes outside the ASCII range are replaced, matching the
    /// tolerant decoding the format's producers rely on.
    pub fn read_ascii(&mut self, count: usize) -> Result<String, ByteIoError> {
        let bytes = self.read_bytes_vec(count)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a 4-byte type tag (signature, blend-mode code, OSType,
    /// resource id).
    #[inline]
    pub fn read_tag(&mut self) -> Result<[u8; 4], ByteIoError> {
        self.inner.read_const_bytes::<4>()
    }

    /// Read a length-byte-prefixed string, padded so that the total
    /// consumed byte count is a multiple of `mod_length`.
    pub fn read_pascal_string(&mut self, mod_length: usize) -> Result<String, ByteIoError> {
        let count = usize::from(self.read_u8()?);
        if count == 0 {
            self.skip(mod_length as u64 - 1)?;
            return Ok(String::new());
        }
        let bytes = self.read_bytes_vec(count)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        let mut consumed = count + 1;
        while consumed % mod_length != 0 {
            self.skip(1)?;
            consumed += 1;
        }
        Ok(text)
    }

    /// Read a 32-bit-length-prefixed UTF-16 string.
    ///
    /// The length counts UTF-16 code units; pairs are stored big
    /// endian and a trailing NUL, if present, is trimmed.
    pub fn read_unicode_string(&mut self) -> Result<String, ByteIoError> {
        let length = self.read_u32()? as usize;
        if length == 0 {
            return Ok(String::new());
        }
        let bytes = self.read_bytes_vec(length * 2)?;
        let mut units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        if units.last() == Some(&0) {
            units.pop();
        }
        Ok(String::from_utf16_lossy(&units))
    }

    /// Read a 4-char key that can alternatively be length-prefixed: a
    /// 32-bit length, treated as 4 when zero, then that many ASCII
    /// bytes.
    pub fn read_key(&mut self) -> Result<String, ByteIoError> {
        let length = self.read_u32()? as usize;
        let length = if length > 0 { length } else { 4 };
        self.read_ascii(length)
    }

    /// Read a section length: 32 bits in version 1 documents, 64 bits
    /// in version 2.
    pub fn read_length(&mut self) -> Result<u64, ByteIoError> {
        if self.version == 1 {
            Ok(u64::from(self.read_u32()?))
        } else {
            self.read_u64()
        }
    }

    /// Read one byte and fail unless it equals `expected`.
    ///
    /// Used by the engine-data text grammar where single characters
    /// act as structural tokens.
    pub fn expect_byte(&mut self, expected: u8) -> Result<(), ByteIoError> {
        let found = self.read_u8()?;
        if found != expected {
            return Err(ByteIoError::Generic("unexpected byte in text stream"));
        }
        Ok(())
    }

    /// [`expect_byte`](Self::expect_byte) repeated `count` times.
    pub fn expect_byte_run(&mut self, expected: u8, count: usize) -> Result<(), ByteIoError> {
        for _ in 0..count {
            self.expect_byte(expected)?;
        }
        Ok(())
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    #[inline]
    pub fn set_position(&mut self, position: u64) -> Result<(), ByteIoError> {
        self.inner.seek_to(position)
    }

    #[inline]
    pub fn skip(&mut self, count: u64) -> Result<(), ByteIoError> {
        self.inner.seek_to(self.inner.position() + count)
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.inner.length()
    }

    #[inline]
    pub fn is_eof(&self) -> bool {
        self.inner.is_eof()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytestream::MemSource;

    fn reader_over(bytes: Vec<u8>) -> PsdReader<MemSource<Vec<u8>>> {
        PsdReader::new(MemSource::new(bytes))
    }

    #[test]
    fn big_endian_primitives() {
        let mut reader = reader_over(vec![0x01, 0x02, 0x03, 0x04]);
        assert_eq!(reader.read_u16().unwrap(), 0x0102);
        assert_eq!(reader.read_i16().unwrap(), 0x0304);

        let mut reader = reader_over(0x4008000000000000_u64.to_be_bytes().to_vec());
        assert_eq!(reader.read_f64().unwrap(), 3.0);
    }

    #[test]
    fn pascal_string_padding() {
        // "ab" with a length byte is 3 bytes, padded to 4
        let mut reader = reader_over(vec![2, b'a', b'b', 0, 0xFF]);
        assert_eq!(reader.read_pascal_string(4).unwrap(), "ab");
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn empty_pascal_string_consumes_mod_length() {
        let mut reader = reader_over(vec![0, 0, 0, 0]);
        assert_eq!(reader.read_pascal_string(4).unwrap(), "");
        assert_eq!(reader.position(), 4);
    }

    #[test]
    fn unicode_string_trims_trailing_nul() {
        let mut bytes = 3_u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[0x00, b'h', 0x00, b'i', 0x00, 0x00]);
        let mut reader = reader_over(bytes);
        assert_eq!(reader.read_unicode_string().unwrap(), "hi");
    }

    #[test]
    fn key_length_zero_means_four_bytes() {
        let mut bytes = 0_u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(b"lsct");
        let mut reader = reader_over(bytes);
        assert_eq!(reader.read_key().unwrap(), "lsct");
    }

    #[test]
    fn section_length_follows_version() {
        let mut bytes = 7_u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&9_u64.to_be_bytes());
        let mut reader = reader_over(bytes);
        assert_eq!(reader.read_length().unwrap(), 7);
        reader.set_version(2);
        assert_eq!(reader.read_length().unwrap(), 9);
    }
}
