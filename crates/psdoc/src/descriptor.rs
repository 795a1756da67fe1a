/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The self-describing descriptor sub-format.
//!
//! Descriptors carry effects, text, placed-content transforms and
//! slice metadata as a name, a class id and a list of key/value
//! fields where every value is prefixed by a 4-byte OSType tag
//! selecting its decode routine. Values nest: a field can be another
//! descriptor or a list of tagged values.
//!
//! An unknown OSType is a hard [`UnsupportedOsType`]
//! (crate::errors::PsdDecodeErrors::UnsupportedOsType) error, never
//! skipped: the tag decides the byte layout, so guessing past one
//! would desynchronize every following read and produce silently
//! wrong data.

use psdoc_core::bytestream::{ByteSource, PsdReader};

use crate::constants::UnitKind;
use crate::engine_data;
use crate::errors::PsdDecodeErrors;

/// A decoded descriptor value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Double(f64),
    Bool(bool),
    /// UTF-16 text, decoded.
    Str(String),
    /// A nested descriptor.
    Bag(PropertyBag),
    /// A homogeneous-by-convention list of tagged values.
    List(Vec<Value>),
    /// Enumerated value: type name and value name.
    Enum { type_id: String, value: String },
    /// A magnitude with a unit kind.
    UnitFloat { unit: UnitKind, value: f64 },
    /// Class reference: display name and class id.
    Class { name: String, class_id: String },
    /// Property reference into a class.
    Property {
        name:     String,
        class_id: String,
        key_id:   String
    },
    /// Offset reference into a class.
    Offset {
        name:     String,
        class_id: String,
        offset:   i32
    },
    /// An `obj ` reference: a list of reference items.
    Reference(Vec<Value>),
    /// Alias record, kept as its raw text.
    Alias(String),
    /// An array of doubles from a resource block or object array.
    Doubles(Vec<f64>),
    /// Raw bytes kept undecoded.
    Bytes(Vec<u8>),
    /// A structure the parser deliberately does not decode; the
    /// message says which.
    Opaque(&'static str)
}

impl Value {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            Value::UnitFloat { value, .. } => Some(*value),
            Value::Int(v) => Some(f64::from(*v)),
            _ => None
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) | Value::Alias(v) => Some(v),
            _ => None
        }
    }

    pub fn as_bag(&self) -> Option<&PropertyBag> {
        match self {
            Value::Bag(v) => Some(v),
            _ => None
        }
    }

    pub fn as_doubles(&self) -> Option<&[f64]> {
        match self {
            Value::Doubles(v) => Some(v),
            _ => None
        }
    }
}

/// An ordered string-keyed collection of [`Value`]s.
///
/// Built once per descriptor occurrence and never mutated afterwards.
/// Lookup is either by exact key ([`get`](Self::get)) or by dotted
/// path with bracket indices ([`get_path`](Self::get_path)), which
/// walks nested bags and lists as if they were flattened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    entries: Vec<(String, Value)>
}

impl PropertyBag {
    pub(crate) fn new() -> PropertyBag {
        PropertyBag { entries: Vec::new() }
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.push((key.into(), value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Look up a single key, no path interpretation.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Look up a dotted, bracket-indexed path such as `a.b[1]` or
    /// `lsct.SectionType`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path
            .split(['.', '[', ']'])
            .filter(|segment| !segment.is_empty());

        let first = segments.next()?;
        let mut current = self.get(first)?;

        for segment in segments {
            current = match current {
                Value::Bag(bag) => bag.get(segment)?,
                Value::List(items) | Value::Reference(items) => {
                    let index: usize = segment.parse().ok()?;
                    items.get(index)?
                }
                _ => return None
            };
        }
        Some(current)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get_path(path).is_some()
    }

    /// Decode a descriptor at the current cursor position.
    ///
    /// `has_version` is set for top-level occurrences, which carry a
    /// 32-bit version before the name; nested descriptors do not.
    pub(crate) fn decode<T: ByteSource>(
        reader: &mut PsdReader<T>, has_version: bool
    ) -> Result<PropertyBag, PsdDecodeErrors> {
        if has_version {
            let _version = reader.read_i32()?;
        }

        let mut bag = PropertyBag::new();
        bag.insert("Name", Value::Str(reader.read_unicode_string()?));
        bag.insert("ClassID", Value::Str(reader.read_key()?));

        let count = reader.read_i32()?;
        for _ in 0..count {
            let key = reader.read_key()?;
            let os_type = reader.read_tag()?;

            let value = if key.trim() == "EngineData" {
                Value::Bag(engine_data::decode(reader)?)
            } else {
                decode_os_type(reader, os_type)?
            };
            bag.insert(key.trim().to_owned(), value);
        }
        Ok(bag)
    }
}

/// Decode one tagged value.
fn decode_os_type<T: ByteSource>(
    reader: &mut PsdReader<T>, tag: [u8; 4]
) -> Result<Value, PsdDecodeErrors> {
    let value = match &tag {
        b"Objc" | b"GlbO" => Value::Bag(PropertyBag::decode(reader, false)?),
        b"VlLs" => {
            let count = reader.read_i32()?;
            let mut items = Vec::with_capacity(count.max(0) as usize);
            for _ in 0..count {
                let item_tag = reader.read_tag()?;
                items.push(decode_os_type(reader, item_tag)?);
            }
            Value::List(items)
        }
        b"doub" => Value::Double(reader.read_f64()?),
        b"UntF" => {
            let unit_tag = reader.read_tag()?;
            let unit = UnitKind::from_tag(&unit_tag)
                .ok_or(PsdDecodeErrors::UnsupportedUnit(unit_tag))?;
            Value::UnitFloat {
                unit,
                value: reader.read_f64()?
            }
        }
        b"TEXT" => Value::Str(reader.read_unicode_string()?),
        b"enum" | b"Enmr" => Value::Enum {
            type_id: reader.read_key()?,
            value:   reader.read_key()?
        },
        b"long" => Value::Int(reader.read_i32()?),
        b"bool" => Value::Bool(reader.read_bool()?),
        b"type" | b"GlbC" | b"Clss" => Value::Class {
            name:     reader.read_unicode_string()?,
            class_id: reader.read_key()?
        },
        b"alis" => {
            let length = reader.read_i32()?.max(0) as usize;
            Value::Alias(reader.read_ascii(length)?)
        }
        b"prop" => Value::Property {
            name:     reader.read_unicode_string()?,
            class_id: reader.read_key()?,
            key_id:   reader.read_key()?
        },
        b"rele" => Value::Offset {
            name:     reader.read_unicode_string()?,
            class_id: reader.read_key()?,
            offset:   reader.read_i32()?
        },
        b"obj " => {
            let count = reader.read_i32()?;
            let mut items = Vec::with_capacity(count.max(0) as usize);
            for _ in 0..count {
                let item_tag = reader.read_tag()?;
                items.push(decode_os_type(reader, item_tag)?);
            }
            Value::Reference(items)
        }
        b"ObAr" => decode_object_array(reader)?,
        // The content of these is never consumed downstream, kept as
        // placeholders like the reference implementation does.
        b"tdta" => Value::Opaque("raw data not decoded"),
        b"Idnt" => Value::Opaque("identifier reference not decoded"),
        b"indx" => Value::Opaque("index reference not decoded"),
        b"name" => Value::Opaque("name reference not decoded"),
        _ => return Err(PsdDecodeErrors::UnsupportedOsType(tag))
    };
    Ok(value)
}

/// An `ObAr` object array: per-item unit kind plus a run of doubles.
fn decode_object_array<T: ByteSource>(
    reader: &mut PsdReader<T>
) -> Result<Value, PsdDecodeErrors> {
    let _version = reader.read_i32()?;
    let mut outer = PropertyBag::new();
    outer.insert("Name", Value::Str(reader.read_unicode_string()?));
    outer.insert("ClassID", Value::Str(reader.read_key()?));

    let count = reader.read_i32()?;
    let mut items = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let mut item = PropertyBag::new();
        item.insert("Type", Value::Str(reader.read_key()?));
        item.insert("EnumName", Value::Str(reader.read_ascii(4)?));

        let unit_tag = reader.read_tag()?;
        let unit = UnitKind::from_tag(&unit_tag)
            .ok_or(PsdDecodeErrors::UnsupportedUnit(unit_tag))?;
        let value_count = reader.read_i32()?.max(0) as usize;
        let values = reader.read_f64_array(value_count)?;
        item.insert(
            "Values",
            Value::List(
                values
                    .into_iter()
                    .map(|v| Value::UnitFloat { unit, value: v })
                    .collect()
            )
        );
        items.push(Value::Bag(item));
    }
    outer.insert("Items", Value::List(items));
    Ok(Value::Bag(outer))
}

#[cfg(test)]
mod tests {
    use psdoc_core::bytestream::MemSource;

    use super::*;

    fn push_u32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_be_bytes());
    }

    fn push_unicode(out: &mut Vec<u8>, text: &str) {
        let units: Vec<u16> = text.encode_utf16().collect();
        push_u32(out, units.len() as u32);
        for unit in units {
            out.extend_from_slice(&unit.to_be_bytes());
        }
    }

    fn push_key(out: &mut Vec<u8>, key: &[u8; 4]) {
        push_u32(out, 0);
        out.extend_from_slice(key);
    }

    #[test]
    fn dotted_path_with_index() {
        let mut inner = PropertyBag::new();
        inner.insert(
            "b",
            Value::List(vec![Value::Int(10), Value::Int(20), Value::Int(30)])
        );
        let mut outer = PropertyBag::new();
        outer.insert("a", Value::Bag(inner));

        assert_eq!(outer.get_path("a.b[1]"), Some(&Value::Int(20)));
        assert_eq!(outer.get_path("a.b[0]"), Some(&Value::Int(10)));
        assert_eq!(outer.get_path("a.b[3]"), None);
        assert_eq!(outer.get_path("a.c"), None);
        assert!(outer.contains("a.b"));
    }

    #[test]
    fn decodes_scalar_fields() {
        let mut data = Vec::new();
        push_u32(&mut data, 16); // version
        push_unicode(&mut data, "");
        push_key(&mut data, b"null");
        push_u32(&mut data, 3); // field count

        push_key(&mut data, b"Ofst");
        data.extend_from_slice(b"long");
        data.extend_from_slice(&7_i32.to_be_bytes());

        push_key(&mut data, b"Opct");
        data.extend_from_slice(b"UntF");
        data.extend_from_slice(b"#Prc");
        data.extend_from_slice(&50.0_f64.to_be_bytes());

        push_key(&mut data, b"Nm  ");
        data.extend_from_slice(b"TEXT");
        push_unicode(&mut data, "layer");

        let mut reader = PsdReader::new(MemSource::new(data));
        let bag = PropertyBag::decode(&mut reader, true).unwrap();

        assert_eq!(bag.get_path("Ofst"), Some(&Value::Int(7)));
        assert_eq!(
            bag.get_path("Opct"),
            Some(&Value::UnitFloat {
                unit:  UnitKind::Percent,
                value: 50.0
            })
        );
        assert_eq!(bag.get_path("Nm").and_then(Value::as_str), Some("layer"));
    }

    #[test]
    fn decodes_nested_descriptor_and_list() {
        let mut data = Vec::new();
        push_u32(&mut data, 16);
        push_unicode(&mut data, "");
        push_key(&mut data, b"root");
        push_u32(&mut data, 1);

        push_key(&mut data, b"Grup");
        data.extend_from_slice(b"Objc");
        {
            // nested descriptor, no version
            push_unicode(&mut data, "");
            push_key(&mut data, b"grp ");
            push_u32(&mut data, 1);

            push_key(&mut data, b"Itms");
            data.extend_from_slice(b"VlLs");
            push_u32(&mut data, 2);
            data.extend_from_slice(b"long");
            data.extend_from_slice(&1_i32.to_be_bytes());
            data.extend_from_slice(b"bool");
            data.push(1);
        }

        let mut reader = PsdReader::new(MemSource::new(data));
        let bag = PropertyBag::decode(&mut reader, true).unwrap();

        assert_eq!(bag.get_path("Grup.Itms[0]"), Some(&Value::Int(1)));
        assert_eq!(bag.get_path("Grup.Itms[1]"), Some(&Value::Bool(true)));
    }

    #[test]
    fn unknown_os_type_is_fatal() {
        let mut data = Vec::new();
        push_u32(&mut data, 16);
        push_unicode(&mut data, "");
        push_key(&mut data, b"null");
        push_u32(&mut data, 1);
        push_key(&mut data, b"Fld ");
        data.extend_from_slice(b"wxyz");

        let mut reader = PsdReader::new(MemSource::new(data));
        let err = PropertyBag::decode(&mut reader, true).unwrap_err();
        assert!(matches!(err, PsdDecodeErrors::UnsupportedOsType(tag) if &tag == b"wxyz"));
        assert!(err.is_unsupported());
    }
}
