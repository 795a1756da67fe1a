/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! A layered image document (PSD/PSB) parser.
//!
//! This crate decodes the layered-document container format: the
//! fixed file header, the layer-and-mask section with its nested
//! group tree, per-channel pixel data (raw or PackBits RLE), the
//! self-describing descriptor sub-format used for effects, text and
//! placed-content metadata, and the plain-text engine-data grammar
//! embedded in text layers.
//!
//! Sections are decoded lazily: constructing a [`PsdDocument`] only
//! reads the header and section lengths, building the layer tree
//! touches layer records but no pixel data, and channel bytes are
//! materialized per layer on first access.
//!
//! ```no_run
//! use psdoc::PsdDocument;
//!
//! let data = std::fs::read("image.psd").unwrap();
//! let mut document = PsdDocument::from_buffer(data).unwrap();
//!
//! for id in document.root_layers().unwrap() {
//!     let layer = document.layer(id).unwrap();
//!     println!("{} visible={}", layer.name(), layer.is_visible());
//! }
//! ```
//!
//! Writing documents back out is not supported.

pub mod errors;

mod channel;
mod constants;
mod descriptor;
mod document;
mod engine_data;
mod layer;
mod linked;
mod resources;
mod rle;
mod section;
mod util;

pub use channel::{Channel, ChannelKind};
pub use constants::{BlendMode, ColorMode, CompressionMethod, LayerFlags, SectionType, UnitKind};
pub use descriptor::{PropertyBag, Value};
pub use document::{FileHeader, NodeId, PsdDocument};
pub use errors::PsdDecodeErrors;
pub use layer::{LayerMask, PsdLayer};
pub use linked::LinkedLayer;
pub use psdoc_core::bytestream::{ByteSource, MemSource};
pub use psdoc_core::options::ParserOptions;
