/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Linked and embedded layer content.
//!
//! The document-level `lnk2`/`lnk3`/`lnkD`/`lnkE` resource blocks
//! hold a run of entries, each carrying a unique id, the source file
//! name and optionally the file bytes themselves. When the payload is
//! itself a layered document its header is decoded in place so the
//! entry can report pixel dimensions; the payload bytes stay in the
//! stream as a recorded span.

use log::trace;
use psdoc_core::bytestream::{ByteSource, PsdReader};

use crate::constants::{DOCUMENT_SIGNATURE, LINKED_LAYER_SIGNATURE};
use crate::descriptor::PropertyBag;
use crate::document::FileHeader;
use crate::errors::PsdDecodeErrors;
use crate::section::Span;
use crate::util::validate_signature;

/// One linked-layer entry.
pub struct LinkedLayer {
    /// Unique id matching a placed layer's `SoLd.Idnt`/`SoLE.Idnt`.
    pub id:         String,
    /// Source file name.
    pub name:       String,
    /// File type tag, for instance `8BPB` or `png `.
    pub file_type:  [u8; 4],
    pub creator:    [u8; 4],
    /// Open parameters, when the entry carries them.
    pub parameters: Option<PropertyBag>,
    /// Header of the embedded document, when the payload is one.
    pub header:     Option<FileHeader>,
    /// Raw payload bytes inside the stream.
    pub(crate) data: Span
}

impl LinkedLayer {
    pub fn has_document(&self) -> bool {
        self.header.is_some()
    }

    pub fn data_len(&self) -> u64 {
        self.data.len
    }

    /// Decode one entry at the cursor, leaving it at the entry's
    /// padded end no matter how much of the body was understood.
    fn decode<T: ByteSource>(
        reader: &mut PsdReader<T>
    ) -> Result<LinkedLayer, PsdDecodeErrors> {
        let length = reader.read_u64()?;
        // entries are padded out to four bytes
        let end = reader.position() + ((length + 3) & !3);

        validate_signature(reader, LINKED_LAYER_SIGNATURE)?;
        let _version = reader.read_i32()?;

        let id = reader.read_pascal_string(1)?;
        let name = reader.read_unicode_string()?;
        let file_type = reader.read_tag()?;
        let creator = reader.read_tag()?;

        let data_length = reader.read_u64()?;
        let parameters = if reader.read_bool()? {
            Some(PropertyBag::decode(reader, true)?)
        } else {
            None
        };

        let data = Span::new(reader.position(), data_length);

        // an embedded layered document is recognisable by its magic
        let header = if data_length > 0 {
            let position = reader.position();
            let magic = reader.read_tag();
            reader.set_position(position)?;

            if matches!(magic, Ok(m) if m == DOCUMENT_SIGNATURE) {
                // the embedded header must not switch the outer
                // stream's length encoding
                let outer_version = reader.version();
                let header = FileHeader::decode(reader)?;
                reader.set_version(outer_version);
                Some(header)
            } else {
                None
            }
        } else {
            None
        };

        trace!("linked layer {id:?}: {name:?}, {data_length} bytes");
        reader.set_position(end)?;
        Ok(LinkedLayer {
            id,
            name,
            file_type,
            creator,
            parameters,
            header,
            data
        })
    }
}

/// Decode the run of entries filling a resource block.
pub(crate) fn decode_block<T: ByteSource>(
    reader: &mut PsdReader<T>, end: u64
) -> Result<Vec<LinkedLayer>, PsdDecodeErrors> {
    let mut entries = Vec::new();
    // a truncated trailing entry is padding, not an entry
    while reader.position() + 8 < end {
        entries.push(LinkedLayer::decode(reader)?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use psdoc_core::bytestream::MemSource;

    use super::*;

    fn push_unicode(out: &mut Vec<u8>, text: &str) {
        let units: Vec<u16> = text.encode_utf16().collect();
        out.extend_from_slice(&(units.len() as u32).to_be_bytes());
        for unit in units {
            out.extend_from_slice(&unit.to_be_bytes());
        }
    }

    fn entry_bytes(id: &str, name: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"liFD");
        body.extend_from_slice(&6_i32.to_be_bytes());
        body.push(id.len() as u8);
        body.extend_from_slice(id.as_bytes());
        push_unicode(&mut body, name);
        body.extend_from_slice(b"png ");
        body.extend_from_slice(b"8BIM");
        body.extend_from_slice(&(payload.len() as u64).to_be_bytes());
        body.push(0); // no open parameters
        body.extend_from_slice(payload);

        let mut out = (body.len() as u64).to_be_bytes().to_vec();
        let padded = (body.len() + 3) & !3;
        body.resize(padded, 0);
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn decodes_entry_run_with_padding() {
        let mut data = entry_bytes("aaaa-bbbb", "one.png", &[1, 2, 3]);
        data.extend_from_slice(&entry_bytes("cccc-dddd", "two.png", &[9]));
        let end = data.len() as u64;

        let mut reader = PsdReader::new(MemSource::new(data));
        let entries = decode_block(&mut reader, end).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "aaaa-bbbb");
        assert_eq!(entries[0].name, "one.png");
        assert_eq!(&entries[0].file_type, b"png ");
        assert_eq!(entries[0].data_len(), 3);
        assert!(!entries[0].has_document());
        assert_eq!(entries[1].id, "cccc-dddd");
        assert_eq!(reader.position(), end);
    }

    #[test]
    fn embedded_document_header_is_sniffed() {
        // payload opens with a full file header of its own
        let mut payload = Vec::new();
        payload.extend_from_slice(b"8BPS");
        payload.extend_from_slice(&1_u16.to_be_bytes());
        payload.extend_from_slice(&[0; 6]);
        payload.extend_from_slice(&4_u16.to_be_bytes()); // channels
        payload.extend_from_slice(&10_u32.to_be_bytes()); // height
        payload.extend_from_slice(&20_u32.to_be_bytes()); // width
        payload.extend_from_slice(&8_u16.to_be_bytes());
        payload.extend_from_slice(&3_u16.to_be_bytes());

        let data = entry_bytes("abcd", "inner.psd", &payload);
        let end = data.len() as u64;

        let mut reader = PsdReader::new(MemSource::new(data));
        reader.set_version(2);
        let entries = decode_block(&mut reader, end).unwrap();

        assert!(entries[0].has_document());
        let header = entries[0].header.unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.channels, 4);
        assert_eq!(header.height, 10);
        assert_eq!(header.width, 20);
        // the embedded header must not change the outer stream's
        // length encoding
        assert_eq!(reader.version(), 2);
    }

    #[test]
    fn bad_entry_signature_is_fatal() {
        let mut data = entry_bytes("aaaa", "x.png", &[]);
        // corrupt the inner signature
        data[8] = b'X';
        let end = data.len() as u64;

        let mut reader = PsdReader::new(MemSource::new(data));
        assert!(matches!(
            decode_block(&mut reader, end),
            Err(PsdDecodeErrors::SignatureMismatch(..))
        ));
    }
}
