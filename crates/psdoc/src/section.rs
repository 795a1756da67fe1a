/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Deferred section decoding.
//!
//! Sections of the container are length-prefixed, which allows a
//! structural pass to skip over them and pay for the decode only when
//! a caller asks. [`Lazy`] records the span at construction, jumps
//! the cursor past it, and on first access seeks back, decodes and
//! caches.
//!
//! Invariant: after *any* access, whether it decoded or hit the
//! cache, the cursor sits exactly at `span.start + span.len`. Readers
//! that walk sibling sections sequentially rely on this.

use psdoc_core::bytestream::{ByteSource, PsdReader};

use crate::errors::PsdDecodeErrors;

/// A byte range within the document stream.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Span {
    pub start: u64,
    pub len:   u64
}

impl Span {
    pub const fn new(start: u64, len: u64) -> Span {
        Span { start, len }
    }

    pub const fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// A section value decoded on first access.
pub(crate) struct Lazy<V> {
    span:  Span,
    value: Option<V>
}

impl<V> Lazy<V> {
    /// Record `len` bytes starting at the current cursor position and
    /// move the cursor past them.
    pub fn from_len<T: ByteSource>(
        reader: &mut PsdReader<T>, len: u64
    ) -> Result<Lazy<V>, PsdDecodeErrors> {
        let start = reader.position();
        reader.set_position(start + len)?;
        Ok(Lazy {
            span:  Span { start, len },
            value: None
        })
    }

    pub const fn span(&self) -> Span {
        self.span
    }

    /// The cached value, or `decode` run over the span.
    pub fn get<'a, T, F>(
        &'a mut self, reader: &mut PsdReader<T>, decode: F
    ) -> Result<&'a V, PsdDecodeErrors>
    where
        T: ByteSource,
        F: FnOnce(&mut PsdReader<T>) -> Result<V, PsdDecodeErrors>
    {
        self.materialize(reader, decode)?;
        // filled by materialize just above
        Ok(self.value.as_ref().unwrap())
    }

    /// Mutable variant of [`get`](Self::get), used where decoded
    /// sections carry their own nested lazy state.
    pub fn get_mut<'a, T, F>(
        &'a mut self, reader: &mut PsdReader<T>, decode: F
    ) -> Result<&'a mut V, PsdDecodeErrors>
    where
        T: ByteSource,
        F: FnOnce(&mut PsdReader<T>) -> Result<V, PsdDecodeErrors>
    {
        self.materialize(reader, decode)?;
        Ok(self.value.as_mut().unwrap())
    }

    fn materialize<T, F>(&mut self, reader: &mut PsdReader<T>, decode: F) -> Result<(), PsdDecodeErrors>
    where
        T: ByteSource,
        F: FnOnce(&mut PsdReader<T>) -> Result<V, PsdDecodeErrors>
    {
        if self.value.is_none() {
            reader.set_position(self.span.start)?;
            let value = decode(reader)?;
            self.value = Some(value);
        }
        reader.set_position(self.span.end())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use psdoc_core::bytestream::MemSource;

    use super::*;

    #[test]
    fn construction_skips_span() {
        let mut reader = PsdReader::new(MemSource::new(vec![0_u8; 100]));
        let lazy: Lazy<u8> = Lazy::from_len(&mut reader, 40).unwrap();
        assert_eq!(lazy.span(), Span { start: 0, len: 40 });
        assert_eq!(reader.position(), 40);
    }

    #[test]
    fn out_of_order_access_restores_cursor_and_cache() {
        // section 1: 50 bytes of 0xAA, section 2: 30 bytes of 0xBB
        let mut data = vec![0xAA_u8; 50];
        data.extend_from_slice(&[0xBB; 30]);
        let mut reader = PsdReader::new(MemSource::new(data));

        let mut s1: Lazy<u8> = Lazy::from_len(&mut reader, 50).unwrap();
        let mut s2: Lazy<u8> = Lazy::from_len(&mut reader, 30).unwrap();
        assert_eq!(reader.position(), 80);

        let v2 = *s2.get(&mut reader, |r| Ok(r.read_u8()?)).unwrap();
        assert_eq!(v2, 0xBB);
        assert_eq!(reader.position(), 80);

        // accessing s1 afterwards must not disturb s2 and must leave
        // the cursor at exactly s1.start + 50
        let v1 = *s1.get(&mut reader, |r| Ok(r.read_u8()?)).unwrap();
        assert_eq!(v1, 0xAA);
        assert_eq!(reader.position(), 50);

        let v2_again = *s2
            .get(&mut reader, |_| Err(PsdDecodeErrors::Generic("must not re-decode")))
            .unwrap();
        assert_eq!(v2_again, 0xBB);
        assert_eq!(reader.position(), 80);
    }

    #[test]
    fn cached_access_still_seeks_to_span_end() {
        let mut reader = PsdReader::new(MemSource::new(vec![7_u8; 16]));
        let mut lazy: Lazy<u8> = Lazy::from_len(&mut reader, 16).unwrap();

        lazy.get(&mut reader, |r| Ok(r.read_u8()?)).unwrap();
        reader.set_position(3).unwrap();
        lazy.get(&mut reader, |_| unreachable!()).unwrap();
        assert_eq!(reader.position(), 16);
    }
}
