/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Whole-document assembly.
//!
//! A document is five consecutive sections: file header, color-mode
//! data, image resources, layer-and-mask information and the
//! composite image data. Opening a document validates the header and
//! records the span of every other section without decoding it;
//! accessors materialize a section on first use and cache it. Layers
//! are addressed through [`NodeId`] handles so the document root and
//! its layers share one traversal surface.

use log::trace;
use psdoc_core::bytestream::{ByteSource, MemSource, PsdReader};
use psdoc_core::options::ParserOptions;

use crate::channel::{self, merge_channels, Channel};
use crate::constants::{BlendMode, ColorMode, DOCUMENT_SIGNATURE};
use crate::descriptor::{PropertyBag, Value};
use crate::errors::PsdDecodeErrors;
use crate::layer::{self, PsdLayer};
use crate::linked::LinkedLayer;
use crate::resources;
use crate::section::Lazy;
use crate::util::depth_to_pitch;

/// The fixed-size file header opening every document.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version:    u16,
    pub channels:   u16,
    pub height:     u32,
    pub width:      u32,
    /// Bits per sample.
    pub depth:      u16,
    pub color_mode: ColorMode
}

impl FileHeader {
    /// Decode and validate the header at the cursor, switching the
    /// reader to the version the header declares.
    pub(crate) fn decode<T: ByteSource>(
        reader: &mut PsdReader<T>
    ) -> Result<FileHeader, PsdDecodeErrors> {
        let magic = reader.read_tag()?;
        if magic != DOCUMENT_SIGNATURE {
            return Err(PsdDecodeErrors::WrongMagicBytes(magic));
        }

        let version = reader.read_u16()?;
        if version != 1 && version != 2 {
            return Err(PsdDecodeErrors::UnsupportedVersion(version));
        }
        reader.set_version(version);

        reader.expect_byte_run(0, 6)?;

        let channels = reader.read_u16()?;
        let height = reader.read_u32()?;
        let width = reader.read_u32()?;
        let depth = reader.read_u16()?;

        let mode = reader.read_u16()?;
        let color_mode = ColorMode::from_int(mode)
            .ok_or(PsdDecodeErrors::UnknownColorMode(mode))?;

        Ok(FileHeader {
            version,
            channels,
            height,
            width,
            depth,
            color_mode
        })
    }
}

/// Handle addressing the document root or one of its layers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeId {
    Root,
    Layer(usize)
}

/// The decoded layer-and-mask information section.
pub(crate) struct LayerSection {
    pub layers:    Vec<PsdLayer>,
    pub roots:     Vec<usize>,
    pub resources: PropertyBag,
    pub linked:    Vec<LinkedLayer>
}

/// A layered image document over a seekable byte source.
pub struct PsdDocument<T: ByteSource> {
    reader:  PsdReader<T>,
    options: ParserOptions,
    header:  FileHeader,

    color_mode_data: Lazy<Vec<u8>>,
    image_resources: Lazy<PropertyBag>,
    layer_section:   Lazy<LayerSection>,
    image_data:      Lazy<Vec<Channel>>
}

impl PsdDocument<MemSource<Vec<u8>>> {
    /// Open a document held in memory with default limits.
    pub fn from_buffer(
        buffer: Vec<u8>
    ) -> Result<PsdDocument<MemSource<Vec<u8>>>, PsdDecodeErrors> {
        PsdDocument::new(MemSource::new(buffer), ParserOptions::default())
    }
}

impl<T: ByteSource> PsdDocument<T> {
    /// Open a document: validate the header and index the remaining
    /// sections without decoding them.
    pub fn new(
        source: T, options: ParserOptions
    ) -> Result<PsdDocument<T>, PsdDecodeErrors> {
        let mut reader = PsdReader::new(source);

        let header = FileHeader::decode(&mut reader)?;
        let (width, height) = (header.width as usize, header.height as usize);
        if width > options.max_width() {
            return Err(PsdDecodeErrors::LargeDimensions(
                options.max_width(),
                width
            ));
        }
        if height > options.max_height() {
            return Err(PsdDecodeErrors::LargeDimensions(
                options.max_height(),
                height
            ));
        }
        if usize::from(header.channels) > options.max_channels() {
            return Err(PsdDecodeErrors::TooManyChannels(
                options.max_channels(),
                usize::from(header.channels)
            ));
        }
        // reject depths the pixel path cannot handle up front
        depth_to_pitch(header.depth, 1)?;

        trace!(
            "document {}x{}, {} channels, {}-bit, {:?}",
            header.width,
            header.height,
            header.channels,
            header.depth,
            header.color_mode
        );

        let color_len = u64::from(reader.read_u32()?);
        let color_mode_data = Lazy::from_len(&mut reader, color_len)?;

        let resources_len = u64::from(reader.read_u32()?);
        let image_resources = Lazy::from_len(&mut reader, resources_len)?;

        let layer_len = reader.read_length()?;
        let layer_section = Lazy::from_len(&mut reader, layer_len)?;

        let image_len = reader.length() - reader.position();
        let image_data = Lazy::from_len(&mut reader, image_len)?;

        Ok(PsdDocument {
            reader,
            options,
            header,
            color_mode_data,
            image_resources,
            layer_section,
            image_data
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn width(&self) -> usize {
        self.header.width as usize
    }

    pub fn height(&self) -> usize {
        self.header.height as usize
    }

    pub fn depth(&self) -> u16 {
        self.header.depth
    }

    pub fn color_mode(&self) -> ColorMode {
        self.header.color_mode
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Raw palette bytes for indexed and duotone documents.
    pub fn color_mode_data(&mut self) -> Result<&[u8], PsdDecodeErrors> {
        let span = self.color_mode_data.span();
        let data = self.color_mode_data.get(&mut self.reader, |r| {
            Ok(r.read_bytes_vec(span.len as usize)?)
        })?;
        Ok(data)
    }

    /// The image-resources section: grids and guides, slices and
    /// whatever else the writer stored, keyed by name or numeric id.
    pub fn image_resources(
        &mut self
    ) -> Result<&PropertyBag, PsdDecodeErrors> {
        let end = self.image_resources.span().end();
        self.image_resources
            .get(&mut self.reader, |r| {
                resources::decode_image_resources(r, end)
            })
    }

    /// Document-tail resources stored after the layer info.
    pub fn resources(&mut self) -> Result<&PropertyBag, PsdDecodeErrors> {
        Ok(&self.layer_section()?.resources)
    }

    /// Linked-layer entries collected from the document tail.
    pub fn linked_layers(
        &mut self
    ) -> Result<&[LinkedLayer], PsdDecodeErrors> {
        Ok(&self.layer_section()?.linked)
    }

    /// The linked-layer entry a placed layer points at, if its id
    /// resolves.
    pub fn linked_layer_for(
        &mut self, id: NodeId
    ) -> Result<Option<&LinkedLayer>, PsdDecodeErrors> {
        let placed = match self.layer(id)?.placed_id() {
            Some(placed) => placed.to_owned(),
            None => return Ok(None)
        };
        let found = self
            .layer_section()?
            .linked
            .iter()
            .find(|entry| entry.id == placed && entry.has_document());
        Ok(found)
    }

    /// Raw payload bytes of a linked-layer entry, indexed as in
    /// [`linked_layers`](Self::linked_layers).
    pub fn linked_layer_data(
        &mut self, index: usize
    ) -> Result<Vec<u8>, PsdDecodeErrors> {
        let span = self
            .layer_section()?
            .linked
            .get(index)
            .ok_or(PsdDecodeErrors::BadValue(
                "linked layer index out of range"
            ))?
            .data;
        let saved = self.reader.position();
        self.reader.set_position(span.start)?;
        let bytes = self.reader.read_bytes_vec(span.len as usize)?;
        self.reader.set_position(saved)?;
        Ok(bytes)
    }

    /// Top-level layers in record order, bottom first.
    pub fn root_layers(&mut self) -> Result<Vec<NodeId>, PsdDecodeErrors> {
        let section = self.layer_section()?;
        Ok(section.roots.iter().map(|i| NodeId::Layer(*i)).collect())
    }

    /// The layer a handle addresses. The root is not a layer.
    pub fn layer(&mut self, id: NodeId) -> Result<&PsdLayer, PsdDecodeErrors> {
        let index = match id {
            NodeId::Layer(index) => index,
            NodeId::Root => {
                return Err(PsdDecodeErrors::BadValue(
                    "the document root is not a layer"
                ))
            }
        };
        let section = self.layer_section()?;
        section
            .layers
            .get(index)
            .ok_or(PsdDecodeErrors::BadValue("layer index out of range"))
    }

    /// Children of a node: root layers for the root, group members
    /// for a group, nothing for a leaf.
    pub fn children(
        &mut self, id: NodeId
    ) -> Result<Vec<NodeId>, PsdDecodeErrors> {
        match id {
            NodeId::Root => self.root_layers(),
            NodeId::Layer(_) => Ok(self
                .layer(id)?
                .children
                .iter()
                .map(|i| NodeId::Layer(*i))
                .collect())
        }
    }

    /// Parent of a node: `None` for the root, the root for top-level
    /// layers.
    pub fn parent(
        &mut self, id: NodeId
    ) -> Result<Option<NodeId>, PsdDecodeErrors> {
        match id {
            NodeId::Root => Ok(None),
            NodeId::Layer(_) => Ok(Some(
                self.layer(id)?
                    .parent
                    .map_or(NodeId::Root, NodeId::Layer)
            ))
        }
    }

    pub fn node_name(&mut self, id: NodeId) -> Result<String, PsdDecodeErrors> {
        match id {
            NodeId::Root => Ok(String::from("Document")),
            NodeId::Layer(_) => Ok(self.layer(id)?.name().to_owned())
        }
    }

    /// Bounds as `(top, left, bottom, right)`; the root covers the
    /// full canvas.
    pub fn node_bounds(
        &mut self, id: NodeId
    ) -> Result<(i32, i32, i32, i32), PsdDecodeErrors> {
        match id {
            NodeId::Root => {
                Ok((0, 0, self.header.height as i32, self.header.width as i32))
            }
            NodeId::Layer(_) => Ok(self.layer(id)?.bounds())
        }
    }

    pub fn node_blend_mode(
        &mut self, id: NodeId
    ) -> Result<BlendMode, PsdDecodeErrors> {
        match id {
            NodeId::Root => Ok(BlendMode::Normal),
            NodeId::Layer(_) => Ok(self.layer(id)?.blend_mode())
        }
    }

    pub fn node_opacity(&mut self, id: NodeId) -> Result<f32, PsdDecodeErrors> {
        match id {
            NodeId::Root => Ok(1.0),
            NodeId::Layer(_) => Ok(self.layer(id)?.opacity())
        }
    }

    pub fn node_visible(&mut self, id: NodeId) -> Result<bool, PsdDecodeErrors> {
        match id {
            NodeId::Root => Ok(true),
            NodeId::Layer(_) => Ok(self.layer(id)?.is_visible())
        }
    }

    /// A layer's planar channels, pixels decoded.
    pub fn layer_channels(
        &mut self, id: NodeId
    ) -> Result<&[Channel], PsdDecodeErrors> {
        let index = match id {
            NodeId::Layer(index) => index,
            NodeId::Root => {
                return Err(PsdDecodeErrors::BadValue(
                    "the composite image holds the root pixels"
                ))
            }
        };
        self.materialize_layer_pixels(index)?;
        Ok(&self.layer_section()?.layers[index].channels)
    }

    /// A layer's pixels merged into packed RGBA, mask applied.
    pub fn layer_rgba(
        &mut self, id: NodeId
    ) -> Result<Vec<u8>, PsdDecodeErrors> {
        let index = match id {
            NodeId::Layer(index) => index,
            NodeId::Root => {
                return Err(PsdDecodeErrors::BadValue(
                    "the composite image holds the root pixels"
                ))
            }
        };
        self.materialize_layer_pixels(index)?;
        let layer = &self.layer_section()?.layers[index];
        let (width, height) =
            (layer.width().max(0) as usize, layer.height().max(0) as usize);
        Ok(merge_channels(&layer.channels, width, height))
    }

    /// The flattened composite stored after the layer section.
    pub fn composite_channels(
        &mut self
    ) -> Result<&[Channel], PsdDecodeErrors> {
        let header = self.header;
        let channels = self.image_data.get(&mut self.reader, |r| {
            let pitch =
                depth_to_pitch(header.depth, header.width as usize)?;
            channel::decode_composite(
                r,
                usize::from(header.channels),
                header.height as usize,
                pitch
            )
        })?;
        Ok(channels)
    }

    /// The flattened composite merged into packed RGBA.
    pub fn composite_rgba(&mut self) -> Result<Vec<u8>, PsdDecodeErrors> {
        let (width, height) = (self.width(), self.height());
        let channels = self.composite_channels()?;
        Ok(merge_channels(channels, width, height))
    }

    /// Take the byte source back, dropping all cached sections.
    pub fn into_source(self) -> T {
        self.reader.consume()
    }

    fn layer_section(&mut self) -> Result<&mut LayerSection, PsdDecodeErrors> {
        let end = self.layer_section.span().end();
        let options = self.options;
        self.layer_section.get_mut(&mut self.reader, |r| {
            decode_layer_and_mask(r, end, &options)
        })
    }

    /// Decode a layer's pixel planes in place, once. The cursor is
    /// put back where it was so lazy section state stays coherent.
    fn materialize_layer_pixels(
        &mut self, index: usize
    ) -> Result<(), PsdDecodeErrors> {
        let depth = self.header.depth;
        let end = self.layer_section.span().end();
        let options = self.options;
        let section = self.layer_section.get_mut(&mut self.reader, |r| {
            decode_layer_and_mask(r, end, &options)
        })?;

        let layer = section
            .layers
            .get_mut(index)
            .ok_or(PsdDecodeErrors::BadValue("layer index out of range"))?;
        if layer.pixels_loaded {
            return Ok(());
        }

        let opacity = layer
            .resources
            .get_path("iOpa.Opacity")
            .and_then(Value::as_i32)
            .map_or(1.0, |v| v as f32 / 255.0);

        let saved = self.reader.position();
        self.reader.set_position(layer.pixel_start)?;

        let width = layer.width().max(0) as usize;
        let height = layer.height().max(0) as usize;
        let mask_dims = layer.mask.map(|m| {
            (m.width().max(0) as usize, m.height().max(0) as usize)
        });

        for channel in &mut layer.channels {
            let (plane_width, plane_height) = match channel.kind {
                crate::channel::ChannelKind::Mask => {
                    mask_dims.unwrap_or((width, height))
                }
                _ => (width, height)
            };
            let pitch = depth_to_pitch(depth, plane_width)?;
            let channel_end = self.reader.position() + channel.stored_size;
            channel.decode_pixels(
                &mut self.reader,
                plane_height,
                pitch,
                opacity
            )?;
            self.reader.set_position(channel_end)?;
        }
        layer.pixels_loaded = true;

        self.reader.set_position(saved)?;
        Ok(())
    }
}

/// Decode the layer-and-mask section body: layer info, global layer
/// mask and document-tail resources.
fn decode_layer_and_mask<T: ByteSource>(
    reader: &mut PsdReader<T>, end: u64, options: &ParserOptions
) -> Result<LayerSection, PsdDecodeErrors> {
    if reader.position() >= end {
        // documents without layers still have a composite
        return Ok(LayerSection {
            layers:    Vec::new(),
            roots:     Vec::new(),
            resources: PropertyBag::new(),
            linked:    Vec::new()
        });
    }

    let info_length = reader.read_length()?;
    let info_end = reader.position() + info_length;
    let (layers, roots) = if info_length > 0 {
        layer::decode_layer_info(reader, options)?
    } else {
        (Vec::new(), Vec::new())
    };
    reader.set_position(info_end)?;

    // global layer mask info, undecoded
    if reader.position() < end {
        let global_mask_length = u64::from(reader.read_u32()?);
        reader.skip(global_mask_length)?;
    }

    let (doc_resources, linked) = if reader.position() < end {
        resources::decode_document_resources(reader, end)?
    } else {
        (PropertyBag::new(), Vec::new())
    };

    Ok(LayerSection {
        layers,
        roots,
        resources: doc_resources,
        linked
    })
}

#[cfg(test)]
mod tests {
    use psdoc_core::bytestream::MemSource;

    use super::*;

    fn header_bytes(version: u16, mode: u16) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"8BPS");
        bytes.extend_from_slice(&version.to_be_bytes());
        bytes.extend_from_slice(&[0; 6]);
        bytes.extend_from_slice(&3_u16.to_be_bytes()); // channels
        bytes.extend_from_slice(&4_u32.to_be_bytes()); // height
        bytes.extend_from_slice(&5_u32.to_be_bytes()); // width
        bytes.extend_from_slice(&8_u16.to_be_bytes()); // depth
        bytes.extend_from_slice(&mode.to_be_bytes());
        bytes
    }

    #[test]
    fn header_decodes_and_sets_reader_version() {
        let mut reader = PsdReader::new(MemSource::new(header_bytes(2, 3)));
        let header = FileHeader::decode(&mut reader).unwrap();
        assert_eq!(header.version, 2);
        assert_eq!(header.channels, 3);
        assert_eq!(header.height, 4);
        assert_eq!(header.width, 5);
        assert_eq!(header.depth, 8);
        assert_eq!(header.color_mode, ColorMode::Rgb);
        assert_eq!(reader.version(), 2);
    }

    #[test]
    fn wrong_magic_is_fatal() {
        let mut bytes = header_bytes(1, 3);
        bytes[0..4].copy_from_slice(b"8BPT");
        let mut reader = PsdReader::new(MemSource::new(bytes));
        assert!(matches!(
            FileHeader::decode(&mut reader),
            Err(PsdDecodeErrors::WrongMagicBytes(_))
        ));
    }

    #[test]
    fn unknown_version_is_fatal() {
        let mut reader = PsdReader::new(MemSource::new(header_bytes(3, 3)));
        assert!(matches!(
            FileHeader::decode(&mut reader),
            Err(PsdDecodeErrors::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn unknown_color_mode_is_fatal() {
        let mut reader = PsdReader::new(MemSource::new(header_bytes(1, 10)));
        assert!(matches!(
            FileHeader::decode(&mut reader),
            Err(PsdDecodeErrors::UnknownColorMode(10))
        ));
    }

    #[test]
    fn oversized_canvas_is_rejected() {
        let mut bytes = header_bytes(1, 3);
        // candidate document body after the header, unused
        bytes.extend_from_slice(&[0; 12]);
        let options = ParserOptions::default().set_max_width(4);
        let result = PsdDocument::new(MemSource::new(bytes), options);
        assert!(matches!(
            result,
            Err(PsdDecodeErrors::LargeDimensions(4, 5))
        ));
    }
}
