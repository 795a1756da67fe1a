/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Keyed resource blocks.
//!
//! Three places in a document store `8BIM`-signed blocks of
//! key/length/payload form: the image-resources section after the
//! header, the extra-data tail of every layer record, and the
//! document tail after the layer info. Known keys decode into
//! [`PropertyBag`]s named after the key so callers address fields as
//! paths like `lsct.SectionType` or `PlLd.Transformation`; unknown
//! keys keep their raw bytes. Each block records its own length, so
//! a decoder that understands only part of a payload still lands on
//! the next block exactly.

use log::{trace, warn};
use psdoc_core::bytestream::{ByteSource, PsdReader};

use crate::descriptor::{PropertyBag, Value};
use crate::errors::PsdDecodeErrors;
use crate::linked::{self, LinkedLayer};
use crate::util::{validate_i16, validate_i32, validate_resource_signature, validate_signature};

/// Layer-resource blocks between a record's name and its extra-data
/// end.
pub(crate) fn decode_layer_resources<T: ByteSource>(
    reader: &mut PsdReader<T>, end: u64
) -> Result<PropertyBag, PsdDecodeErrors> {
    let mut bag = PropertyBag::new();

    while reader.position() < end {
        validate_resource_signature(reader, true)?;
        let key = reader.read_ascii(4)?;
        let length = u64::from(reader.read_u32()?);
        let block_end = reader.position() + length + (length & 1);

        let value = decode_layer_resource(reader, &key, block_end)?;
        bag.insert(key, value);
        reader.set_position(block_end)?;
    }
    Ok(bag)
}

fn decode_layer_resource<T: ByteSource>(
    reader: &mut PsdReader<T>, key: &str, block_end: u64
) -> Result<Value, PsdDecodeErrors> {
    let value = match key {
        "lsct" => {
            let mut bag = PropertyBag::new();
            bag.insert("SectionType", Value::Int(reader.read_i32()?));
            Value::Bag(bag)
        }
        "luni" => {
            let mut bag = PropertyBag::new();
            bag.insert("Name", Value::Str(reader.read_unicode_string()?));
            Value::Bag(bag)
        }
        "lyid" => {
            let mut bag = PropertyBag::new();
            bag.insert("ID", Value::Int(reader.read_i32()?));
            Value::Bag(bag)
        }
        "iOpa" => {
            let mut bag = PropertyBag::new();
            bag.insert("Opacity", Value::Int(i32::from(reader.read_u8()?)));
            Value::Bag(bag)
        }
        "lrFX" => decode_effects(reader)?,
        "TySh" => decode_type_tool(reader)?,
        "shmd" => decode_metadata(reader)?,
        "PlLd" => decode_placed_layer(reader)?,
        "SoLd" | "SoLE" => decode_placed_content(reader)?,
        _ => {
            trace!("keeping layer resource {key:?} undecoded");
            let length = (block_end - reader.position()) as usize;
            Value::Bytes(reader.read_bytes_vec(length)?)
        }
    };
    Ok(value)
}

/// `lrFX`: legacy effects. Entry payloads are versioned structures
/// with nothing downstream wants, so only the effect tags are kept.
fn decode_effects<T: ByteSource>(
    reader: &mut PsdReader<T>
) -> Result<Value, PsdDecodeErrors> {
    let _version = reader.read_i16()?;
    let count = reader.read_i16()?;

    let mut effects = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        validate_resource_signature(reader, false)?;
        let effect = reader.read_ascii(4)?;
        let size = u64::from(reader.read_u32()?);
        effects.push(Value::Str(effect));
        reader.skip(size)?;
    }

    let mut bag = PropertyBag::new();
    bag.insert("Effects", Value::List(effects));
    Ok(Value::Bag(bag))
}

/// `TySh`: a type-tool layer. The descriptor under `Text` carries the
/// raw text and, through `EngineData`, the full typesetting state.
fn decode_type_tool<T: ByteSource>(
    reader: &mut PsdReader<T>
) -> Result<Value, PsdDecodeErrors> {
    validate_i16(reader, 1, "type tool version")?;

    let mut bag = PropertyBag::new();
    bag.insert("Transforms", Value::Doubles(reader.read_f64_array(6)?));
    bag.insert("TextVersion", Value::Int(i32::from(reader.read_i16()?)));
    bag.insert("Text", Value::Bag(PropertyBag::decode(reader, true)?));
    bag.insert("WarpVersion", Value::Int(i32::from(reader.read_i16()?)));
    bag.insert("Warp", Value::Bag(PropertyBag::decode(reader, true)?));
    bag.insert("Bounds", Value::Doubles(reader.read_f64_array(2)?));
    Ok(Value::Bag(bag))
}

/// `shmd`: sheet metadata, a run of signed sub-blocks each holding a
/// descriptor.
fn decode_metadata<T: ByteSource>(
    reader: &mut PsdReader<T>
) -> Result<Value, PsdDecodeErrors> {
    let count = reader.read_i32()?;

    let mut items = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        validate_resource_signature(reader, false)?;
        let _key = reader.read_tag()?;
        let _copy_on_sheet = reader.read_u8()?;
        reader.skip(3)?;
        let length = u64::from(reader.read_u32()?);
        let item_end = reader.position() + length;

        items.push(Value::Bag(PropertyBag::decode(reader, true)?));
        reader.set_position(item_end)?;
    }

    let mut bag = PropertyBag::new();
    bag.insert("Items", Value::List(items));
    Ok(Value::Bag(bag))
}

/// `PlLd`: a placed (smart-object) layer. `Transformation` holds the
/// four transformed corner points the group-bounds pass consumes.
fn decode_placed_layer<T: ByteSource>(
    reader: &mut PsdReader<T>
) -> Result<Value, PsdDecodeErrors> {
    validate_signature(reader, *b"plcL")?;

    let mut bag = PropertyBag::new();
    bag.insert("Version", Value::Int(reader.read_i32()?));
    bag.insert("UniqueID", Value::Str(reader.read_pascal_string(1)?));
    bag.insert("PageNumbers", Value::Int(reader.read_i32()?));
    bag.insert("Pages", Value::Int(reader.read_i32()?));
    bag.insert("AntiAlias", Value::Int(reader.read_i32()?));
    bag.insert("LayerType", Value::Int(reader.read_i32()?));
    bag.insert("Transformation", Value::Doubles(reader.read_f64_array(8)?));
    validate_i32(reader, 0, "warp version")?;
    bag.insert("Warp", Value::Bag(PropertyBag::decode(reader, true)?));
    Ok(Value::Bag(bag))
}

/// `SoLd`/`SoLE`: placed-content descriptors; `Idnt` inside ties the
/// layer to a linked-layer entry.
fn decode_placed_content<T: ByteSource>(
    reader: &mut PsdReader<T>
) -> Result<Value, PsdDecodeErrors> {
    validate_signature(reader, *b"soLD")?;
    let _version = reader.read_i32()?;
    Ok(Value::Bag(PropertyBag::decode(reader, true)?))
}

/// Document-tail resource blocks after the layer info. The linked
/// layer blocks decode into their own list; everything else lands in
/// the bag like layer resources do.
pub(crate) fn decode_document_resources<T: ByteSource>(
    reader: &mut PsdReader<T>, end: u64
) -> Result<(PropertyBag, Vec<LinkedLayer>), PsdDecodeErrors> {
    let mut bag = PropertyBag::new();
    let mut linked_layers = Vec::new();

    while reader.position() < end {
        validate_resource_signature(reader, true)?;
        let key = reader.read_ascii(4)?;
        let length = u64::from(reader.read_u32()?);
        let block_end = reader.position() + length + (length & 1);

        match key.as_str() {
            "lnk2" | "lnk3" | "lnkD" | "lnkE" => {
                linked_layers
                    .extend(linked::decode_block(reader, block_end)?);
            }
            _ => {
                let value = decode_layer_resource(reader, &key, block_end)?;
                bag.insert(key, value);
            }
        }
        reader.set_position(block_end)?;
    }
    Ok((bag, linked_layers))
}

/// The image-resources section after the file header: numbered
/// blocks with pascal-string names, running up to `end`.
pub(crate) fn decode_image_resources<T: ByteSource>(
    reader: &mut PsdReader<T>, end: u64
) -> Result<PropertyBag, PsdDecodeErrors> {
    let mut bag = PropertyBag::new();

    while reader.position() < end {
        validate_resource_signature(reader, false)?;
        let id = reader.read_u16()?;
        let _name = reader.read_pascal_string(2)?;
        let length = u64::from(reader.read_u32()?);
        let block_end = reader.position() + length + (length & 1);

        match id {
            1032 => bag.insert("GridAndGuides", decode_grid_and_guides(reader)?),
            1050 => bag.insert("Slices", decode_slices(reader)?),
            _ => {
                let length = (block_end - reader.position()) as usize;
                bag.insert(
                    format!("{id}"),
                    Value::Bytes(reader.read_bytes_vec(length)?)
                );
            }
        }
        reader.set_position(block_end)?;
    }
    reader.set_position(end)?;
    Ok(bag)
}

fn decode_grid_and_guides<T: ByteSource>(
    reader: &mut PsdReader<T>
) -> Result<Value, PsdDecodeErrors> {
    validate_i32(reader, 1, "grid and guides version")?;

    let mut bag = PropertyBag::new();
    bag.insert("HorizontalGrid", Value::Int(reader.read_i32()?));
    bag.insert("VerticalGrid", Value::Int(reader.read_i32()?));

    let count = reader.read_i32()?;
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();
    for _ in 0..count {
        let location = reader.read_i32()?;
        match reader.read_u8()? {
            0 => vertical.push(Value::Int(location)),
            _ => horizontal.push(Value::Int(location))
        }
    }
    bag.insert("HorizontalGuides", Value::List(horizontal));
    bag.insert("VerticalGuides", Value::List(vertical));
    Ok(Value::Bag(bag))
}

fn decode_slices<T: ByteSource>(
    reader: &mut PsdReader<T>
) -> Result<Value, PsdDecodeErrors> {
    let version = reader.read_i32()?;
    let mut bag = PropertyBag::new();

    if version == 6 {
        // bounds of the slice group, unused
        for _ in 0..4 {
            let _ = reader.read_i32()?;
        }
        let _group_name = reader.read_unicode_string()?;

        let count = reader.read_i32()?;
        let mut items = Vec::with_capacity(count.max(0) as usize);
        for _ in 0..count {
            items.push(Value::Bag(decode_slice_item(reader)?));
        }
        bag.insert("Items", Value::List(items));
    } else {
        // later versions store the slices as a plain descriptor
        warn!("slices resource version {version}, keeping raw descriptor");
        bag.insert(
            "Descriptor",
            Value::Bag(PropertyBag::decode(reader, true)?)
        );
    }
    Ok(Value::Bag(bag))
}

fn decode_slice_item<T: ByteSource>(
    reader: &mut PsdReader<T>
) -> Result<PropertyBag, PsdDecodeErrors> {
    let mut bag = PropertyBag::new();
    bag.insert("ID", Value::Int(reader.read_i32()?));
    bag.insert("GroupID", Value::Int(reader.read_i32()?));
    let origin = reader.read_i32()?;
    if origin == 1 {
        let _associated_layer = reader.read_i32()?;
    }
    bag.insert("Name", Value::Str(reader.read_unicode_string()?));
    let _slice_type = reader.read_i32()?;

    bag.insert("Left", Value::Int(reader.read_i32()?));
    bag.insert("Top", Value::Int(reader.read_i32()?));
    bag.insert("Right", Value::Int(reader.read_i32()?));
    bag.insert("Bottom", Value::Int(reader.read_i32()?));

    bag.insert("Url", Value::Str(reader.read_unicode_string()?));
    bag.insert("Target", Value::Str(reader.read_unicode_string()?));
    bag.insert("Message", Value::Str(reader.read_unicode_string()?));
    bag.insert("AltTag", Value::Str(reader.read_unicode_string()?));

    let _cell_is_html = reader.read_bool()?;
    let _cell_text = reader.read_unicode_string()?;

    bag.insert("HorzAlign", Value::Int(reader.read_i32()?));
    bag.insert("VertAlign", Value::Int(reader.read_i32()?));
    bag.insert("Alpha", Value::Int(i32::from(reader.read_u8()?)));
    bag.insert("Red", Value::Int(i32::from(reader.read_u8()?)));
    bag.insert("Green", Value::Int(i32::from(reader.read_u8()?)));
    bag.insert("Blue", Value::Int(i32::from(reader.read_u8()?)));
    Ok(bag)
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

    fn push_block(out: &mut Vec<u8>, key: &[u8; 4], payload: &[u8]) {
        out.extend_from_slice(b"8BIM");
        out.extend_from_slice(key);
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
    }

    #[test]
    fn section_and_name_and_opacity_blocks() {
        let mut data = Vec::new();
        push_block(&mut data, b"lsct", &1_i32.to_be_bytes());
        let mut luni = Vec::new();
        push_unicode(&mut luni, "Group A");
        push_block(&mut data, b"luni", &luni);
        push_block(&mut data, b"iOpa", &[128]);

        let end = data.len() as u64;
        let mut reader = PsdReader::new(MemSource::new(data));
        let bag = decode_layer_resources(&mut reader, end).unwrap();

        assert_eq!(bag.get_path("lsct.SectionType"), Some(&Value::Int(1)));
        assert_eq!(
            bag.get_path("luni.Name").and_then(Value::as_str),
            Some("Group A")
        );
        assert_eq!(bag.get_path("iOpa.Opacity"), Some(&Value::Int(128)));
        assert_eq!(reader.position(), end);
    }

    #[test]
    fn odd_length_blocks_are_padded_to_even() {
        let mut data = Vec::new();
        push_block(&mut data, b"iOpa", &[200]);
        push_block(&mut data, b"lyid", &7_i32.to_be_bytes());

        let end = data.len() as u64;
        let mut reader = PsdReader::new(MemSource::new(data));
        let bag = decode_layer_resources(&mut reader, end).unwrap();

        assert_eq!(bag.get_path("iOpa.Opacity"), Some(&Value::Int(200)));
        assert_eq!(bag.get_path("lyid.ID"), Some(&Value::Int(7)));
    }

    #[test]
    fn unknown_block_keeps_raw_bytes() {
        let mut data = Vec::new();
        push_block(&mut data, b"vogk", &[1, 2, 3, 4]);

        let end = data.len() as u64;
        let mut reader = PsdReader::new(MemSource::new(data));
        let bag = decode_layer_resources(&mut reader, end).unwrap();

        assert_eq!(
            bag.get("vogk"),
            Some(&Value::Bytes(vec![1, 2, 3, 4]))
        );
    }

    #[test]
    fn placed_layer_transformation_is_addressable() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"plcL");
        payload.extend_from_slice(&3_i32.to_be_bytes()); // version
        payload.push(4); // pascal id
        payload.extend_from_slice(b"abcd");
        payload.extend_from_slice(&0_i32.to_be_bytes()); // page numbers
        payload.extend_from_slice(&1_i32.to_be_bytes()); // pages
        payload.extend_from_slice(&16_i32.to_be_bytes()); // anti alias
        payload.extend_from_slice(&2_i32.to_be_bytes()); // layer type
        for v in [0.0, 0.0, 8.0, 0.0, 8.0, 8.0, 0.0, 8.0] {
            payload.extend_from_slice(&f64::to_be_bytes(v));
        }
        payload.extend_from_slice(&0_i32.to_be_bytes()); // warp version
        // warp descriptor: version, empty name, class id, no fields
        payload.extend_from_slice(&16_i32.to_be_bytes());
        push_unicode(&mut payload, "");
        payload.extend_from_slice(&0_u32.to_be_bytes());
        payload.extend_from_slice(b"warp");
        payload.extend_from_slice(&0_i32.to_be_bytes());

        let mut data = Vec::new();
        push_block(&mut data, b"PlLd", &payload);

        let end = data.len() as u64;
        let mut reader = PsdReader::new(MemSource::new(data));
        let bag = decode_layer_resources(&mut reader, end).unwrap();

        let corners = bag
            .get_path("PlLd.Transformation")
            .and_then(Value::as_doubles)
            .unwrap();
        assert_eq!(corners.len(), 8);
        assert_eq!(corners[2], 8.0);
        assert_eq!(bag.get_path("PlLd.UniqueID").and_then(Value::as_str), Some("abcd"));
    }

    #[test]
    fn grid_and_guides_resource() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1_i32.to_be_bytes()); // version
        payload.extend_from_slice(&576_i32.to_be_bytes());
        payload.extend_from_slice(&576_i32.to_be_bytes());
        payload.extend_from_slice(&2_i32.to_be_bytes()); // guide count
        payload.extend_from_slice(&100_i32.to_be_bytes());
        payload.push(0); // vertical
        payload.extend_from_slice(&50_i32.to_be_bytes());
        payload.push(1); // horizontal

        let mut block = Vec::new();
        block.extend_from_slice(b"8BIM");
        block.extend_from_slice(&1032_u16.to_be_bytes());
        block.extend_from_slice(&[0, 0]); // empty pascal name
        block.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        block.extend_from_slice(&payload);

        let end = block.len() as u64;
        let mut reader = PsdReader::new(MemSource::new(block));
        let bag = decode_image_resources(&mut reader, end).unwrap();

        assert_eq!(
            bag.get_path("GridAndGuides.VerticalGuides[0]"),
            Some(&Value::Int(100))
        );
        assert_eq!(
            bag.get_path("GridAndGuides.HorizontalGuides[0]"),
            Some(&Value::Int(50))
        );
    }
}
