/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! The text-engine data sub-format.
//!
//! Type layers embed their typesetting state as a length-prefixed
//! blob of plain text with its own grammar: `<<` ... `>>` delimits a
//! nested block, `/name` starts a named field, `(...)` holds UTF-16
//! text with a byte-order mark and backslash escapes, `[` ... `]`
//! holds an array, and bare tokens are numbers, booleans or raw
//! words. Indentation is structural: fields sit one tab deeper than
//! the block delimiters around them. The result is decoded into the
//! same [`PropertyBag`] shape as binary descriptors so callers query
//! both with one path syntax.

use psdoc_core::bytestream::{ByteSource, PsdReader};

use crate::descriptor::{PropertyBag, Value};
use crate::errors::PsdDecodeErrors;

/// Decode a length-prefixed engine-data blob at the cursor.
pub(crate) fn decode<T: ByteSource>(
    reader: &mut PsdReader<T>
) -> Result<PropertyBag, PsdDecodeErrors> {
    let length = reader.read_u32()? as usize;
    let data = reader.read_bytes_vec(length)?;

    let mut lexer = Lexer::new(&data);
    lexer.expect(b'\n')?;
    lexer.expect(b'\n')?;
    read_block(&mut lexer, 0)
}

struct Lexer<'a> {
    data:     &'a [u8],
    position: usize
}

impl<'a> Lexer<'a> {
    fn new(data: &'a [u8]) -> Lexer<'a> {
        Lexer { data, position: 0 }
    }

    fn next(&mut self) -> Result<u8, PsdDecodeErrors> {
        let byte = *self
            .data
            .get(self.position)
            .ok_or(PsdDecodeErrors::BadEngineData("unexpected end of data"))?;
        self.position += 1;
        Ok(byte)
    }

    fn expect(&mut self, expected: u8) -> Result<(), PsdDecodeErrors> {
        if self.next()? != expected {
            return Err(PsdDecodeErrors::BadEngineData("unexpected character"));
        }
        Ok(())
    }

    fn expect_tabs(&mut self, count: usize) -> Result<(), PsdDecodeErrors> {
        for _ in 0..count {
            self.expect(b'\t')?;
        }
        Ok(())
    }
}

/// Read one block at nesting `level`, delimiters included.
///
/// The cursor sits on the `level` tabs preceding the opening `<<`;
/// on return it sits just past the matching `>>`. Inside an array a
/// block position may instead hold the closing `]`, in which case an
/// empty bag comes back with nothing consumed after it.
fn read_block(
    lexer: &mut Lexer, level: usize
) -> Result<PropertyBag, PsdDecodeErrors> {
    let mut bag = PropertyBag::new();

    lexer.expect_tabs(level)?;
    match lexer.next()? {
        b']' => return Ok(bag),
        b'<' => lexer.expect(b'<')?,
        _ => {
            return Err(PsdDecodeErrors::BadEngineData(
                "expected block open"
            ))
        }
    }
    lexer.expect(b'\n')?;

    loop {
        lexer.expect_tabs(level)?;
        match lexer.next()? {
            b'>' => {
                lexer.expect(b'>')?;
                return Ok(bag);
            }
            b'\t' => {
                lexer.expect(b'/')?;
                let mut name = Vec::new();
                let terminator = loop {
                    match lexer.next()? {
                        b @ (b' ' | b'\n') => break b,
                        b => name.push(b)
                    }
                };
                let name = String::from_utf8_lossy(&name).into_owned();

                if terminator == b'\n' {
                    let inner = read_block(lexer, level + 1)?;
                    lexer.expect(b'\n')?;
                    if !inner.is_empty() {
                        bag.insert(name, Value::Bag(inner));
                    }
                } else {
                    let value = read_value(lexer, level + 1)?.ok_or(
                        PsdDecodeErrors::BadEngineData(
                            "array close outside an array"
                        )
                    )?;
                    bag.insert(name, value);
                }
            }
            _ => {
                return Err(PsdDecodeErrors::BadEngineData(
                    "expected field or block close"
                ))
            }
        }
    }
}

/// Read one value after a `/name `. Returns `None` when the next
/// byte is the `]` closing an array of scalars.
fn read_value(
    lexer: &mut Lexer, level: usize
) -> Result<Option<Value>, PsdDecodeErrors> {
    let value = match lexer.next()? {
        b']' => return Ok(None),
        b'(' => Value::Str(read_string(lexer)?),
        b'[' => {
            let mut items = Vec::new();
            match lexer.next()? {
                b' ' => loop {
                    // scalar items, space separated, `]` ends them
                    match read_value(lexer, level)? {
                        Some(item) => items.push(item),
                        None => {
                            lexer.expect(b'\n')?;
                            break;
                        }
                    }
                },
                b'\n' => loop {
                    // block items on their own lines, a bare `]` in
                    // block position ends them
                    let inner = read_block(lexer, level)?;
                    lexer.expect(b'\n')?;
                    if inner.is_empty() {
                        break;
                    }
                    items.push(Value::Bag(inner));
                },
                _ => {
                    return Err(PsdDecodeErrors::BadEngineData(
                        "malformed array open"
                    ))
                }
            }
            Value::List(items)
        }
        first => {
            let mut token = vec![first];
            loop {
                match lexer.next()? {
                    b' ' | b'\n' => break,
                    b => token.push(b)
                }
            }
            parse_token(&token)?
        }
    };
    Ok(Some(value))
}

/// A parenthesized big-endian UTF-16 string.
fn read_string(lexer: &mut Lexer) -> Result<String, PsdDecodeErrors> {
    let bom = [lexer.next()?, lexer.next()?];
    if bom != [0xFE, 0xFF] {
        return Err(PsdDecodeErrors::BadEngineData("missing byte order mark"));
    }

    let mut text = String::new();
    loop {
        let high = lexer.next()?;
        if high == b')' {
            lexer.expect(b'\n')?;
            return Ok(text);
        }
        let mut low = lexer.next()?;
        if low == b'\\' {
            low = lexer.next()?;
        }
        // the text engine stores line breaks as carriage returns
        if low == 0x0D {
            text.push('\n');
        } else {
            let unit = (u16::from(high) << 8) | u16::from(low);
            text.push_str(&String::from_utf16_lossy(&[unit]));
        }
    }
}

/// A bare token: integer, then float, then boolean, else raw text.
fn parse_token(token: &[u8]) -> Result<Value, PsdDecodeErrors> {
    let text = std::str::from_utf8(token)
        .map_err(|_| PsdDecodeErrors::BadEngineData("non-ascii bare token"))?;

    if let Ok(v) = text.parse::<i32>() {
        return Ok(Value::Int(v));
    }
    if let Ok(v) = text.parse::<f64>() {
        return Ok(Value::Double(v));
    }
    match text {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        _ => Ok(Value::Str(text.to_owned()))
    }
}
