/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Core routines shared by the psdoc family of crates
//!
//! This crate provides the low-level plumbing for parsing layered
//! image documents:
//!
//! - A seekable byte-source trait and an in-memory cursor
//! - A big-endian reader with the string/tag/length conventions of the
//!   layered-document container format
//! - Parser limit options shared by all sections
//!
//! The document format is big-endian throughout, so the reader only
//! exposes big-endian reads.

pub mod bytestream;
pub mod options;
