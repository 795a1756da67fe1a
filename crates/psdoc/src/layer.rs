/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Layer records and the layer tree.
//!
//! The layer-info block stores a flat run of records, bottom layer
//! first. Group structure is encoded in band: a record whose `lsct`
//! resource marks it a divider closes the group opened by the nearest
//! record above it marked open or closed. [`build_tree`] folds that
//! flat run into an arena of parent and child indices, and
//! [`compute_group_bounds`] then sizes each group as the union of its
//! image-bearing descendants.

use log::trace;
use psdoc_core::bytestream::{ByteSource, PsdReader};
use psdoc_core::options::ParserOptions;

use crate::channel::{Channel, ChannelKind};
use crate::constants::{BlendMode, LayerFlags, SectionType};
use crate::descriptor::{PropertyBag, Value};
use crate::errors::PsdDecodeErrors;
use crate::resources;
use crate::util::validate_signature;

/// A layer's mask plane bounds and options.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LayerMask {
    pub top:           i32,
    pub left:          i32,
    pub bottom:        i32,
    pub right:         i32,
    /// Fill value outside the mask plane, 0 or 255.
    pub default_color: u8,
    pub flags:         u8
}

impl LayerMask {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// One layer of a document, leaf or group.
pub struct PsdLayer {
    // bounds start as the record values; for groups they are
    // recomputed from descendants after the tree is built
    pub(crate) top:    i32,
    pub(crate) left:   i32,
    pub(crate) bottom: i32,
    pub(crate) right:  i32,

    pub(crate) blend_mode:   BlendMode,
    pub(crate) opacity:      u8,
    pub(crate) clipping:     bool,
    pub(crate) flags:        LayerFlags,
    pub(crate) section_type: SectionType,
    pub(crate) name:         String,
    pub(crate) mask:         Option<LayerMask>,
    pub(crate) resources:    PropertyBag,

    pub(crate) channels: Vec<Channel>,
    /// Where this layer's pixel data starts inside the channel
    /// image-data block.
    pub(crate) pixel_start:   u64,
    pub(crate) pixels_loaded: bool,

    pub(crate) parent:   Option<usize>,
    pub(crate) children: Vec<usize>
}

impl PsdLayer {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bounds as `(top, left, bottom, right)` in document space.
    pub fn bounds(&self) -> (i32, i32, i32, i32) {
        (self.top, self.left, self.bottom, self.right)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Fill opacity in `[0.0, 1.0]`.
    pub fn opacity(&self) -> f32 {
        f32::from(self.opacity) / 255.0
    }

    pub fn is_clipping(&self) -> bool {
        self.clipping
    }

    pub fn flags(&self) -> LayerFlags {
        self.flags
    }

    /// The stored flag bit records hidden state, so visibility is
    /// its inverse.
    pub fn is_visible(&self) -> bool {
        !self.flags.contains(LayerFlags::HIDDEN)
    }

    pub fn section_type(&self) -> SectionType {
        self.section_type
    }

    pub fn is_group(&self) -> bool {
        self.section_type.is_group()
    }

    pub fn mask(&self) -> Option<&LayerMask> {
        self.mask.as_ref()
    }

    /// Extra-record resources keyed by their 4-byte id.
    pub fn resources(&self) -> &PropertyBag {
        &self.resources
    }

    /// The placed-content identifier tying this layer to a linked
    /// file, when one exists.
    pub fn placed_id(&self) -> Option<&str> {
        self.resources
            .get_path("SoLd.Idnt")
            .or_else(|| self.resources.get_path("SoLE.Idnt"))
            .and_then(Value::as_str)
    }

    /// Whether this layer carries its own pixels.
    pub fn has_image(&self) -> bool {
        self.section_type == SectionType::Normal
            && self.width() > 0
            && self.height() > 0
    }

    /// Decoded channels; empty until the document materializes them.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Parse one layer record at the cursor, extra data included.
    pub(crate) fn decode<T: ByteSource>(
        reader: &mut PsdReader<T>, options: &ParserOptions
    ) -> Result<PsdLayer, PsdDecodeErrors> {
        let top = reader.read_i32()?;
        let left = reader.read_i32()?;
        let bottom = reader.read_i32()?;
        let right = reader.read_i32()?;

        let (width, height) = (right - left, bottom - top);
        let cap = options.max_layer_extent();
        if width > cap || height > cap {
            return Err(PsdDecodeErrors::OversizeLayer(width, height));
        }

        let channel_count = usize::from(reader.read_u16()?);
        if channel_count > options.max_channels() {
            return Err(PsdDecodeErrors::TooManyChannels(
                options.max_channels(),
                channel_count
            ));
        }

        let mut channels = Vec::with_capacity(channel_count);
        for _ in 0..channel_count {
            let kind = ChannelKind::from_i16(reader.read_i16()?);
            let stored_size = reader.read_length()?;
            channels.push(Channel::new(kind, stored_size));
        }

        validate_signature(reader, crate::constants::RESOURCE_SIGNATURE)?;
        let blend_mode = BlendMode::from_tag(&reader.read_tag()?);
        let opacity = reader.read_u8()?;
        let clipping = reader.read_bool()?;
        let flags = LayerFlags::from_bits_retain(reader.read_u8()?);
        let _filter = reader.read_u8()?;

        let mut layer = PsdLayer {
            top,
            left,
            bottom,
            right,
            blend_mode,
            opacity,
            clipping,
            flags,
            section_type: SectionType::Normal,
            name: String::new(),
            mask: None,
            resources: PropertyBag::new(),
            channels,
            pixel_start: 0,
            pixels_loaded: false,
            parent: None,
            children: Vec::new()
        };
        layer.decode_extra(reader)?;
        Ok(layer)
    }

    /// The variable-length tail of a record: mask, blending ranges,
    /// name and keyed resources.
    fn decode_extra<T: ByteSource>(
        &mut self, reader: &mut PsdReader<T>
    ) -> Result<(), PsdDecodeErrors> {
        let extra_length = u64::from(reader.read_u32()?);
        let extra_end = reader.position() + extra_length;

        // mask block
        let mask_length = u64::from(reader.read_u32()?);
        if mask_length > 0 {
            let mask_end = reader.position() + mask_length;
            let mask = LayerMask {
                top:           reader.read_i32()?,
                left:          reader.read_i32()?,
                bottom:        reader.read_i32()?,
                right:         reader.read_i32()?,
                default_color: reader.read_u8()?,
                flags:         reader.read_u8()?
            };
            self.mask = Some(mask);
            reader.set_position(mask_end)?;
        }

        // blending ranges carry per-channel composite ranges nothing
        // downstream consumes
        let ranges_length = u64::from(reader.read_u32()?);
        reader.skip(ranges_length)?;

        self.name = reader.read_pascal_string(4)?;
        self.resources = resources::decode_layer_resources(reader, extra_end)?;

        if let Some(name) = self
            .resources
            .get_path("luni.Name")
            .and_then(Value::as_str)
        {
            self.name = name.to_owned();
        }
        if let Some(section) = self
            .resources
            .get_path("lsct.SectionType")
            .and_then(Value::as_i32)
        {
            self.section_type = SectionType::from_int(section);
        }

        trace!(
            "layer {:?}: section {:?}, {} channels",
            self.name,
            self.section_type,
            self.channels.len()
        );
        reader.set_position(extra_end)?;
        Ok(())
    }

    /// Stored byte size of this layer's pixel data.
    pub(crate) fn pixel_data_size(&self) -> u64 {
        self.channels.iter().map(|c| c.stored_size).sum()
    }
}

/// Fold the flat record run into parent and child links.
///
/// Records sit bottom layer first, so the walk runs in reverse:
/// a group record opens a scope that the matching divider below it
/// closes. Returns root indices in record order. A divider with no
/// open group, or a group left open at the end of the run, is a
/// malformed stream.
pub(crate) fn build_tree(
    layers: &mut [PsdLayer]
) -> Result<Vec<usize>, PsdDecodeErrors> {
    let mut roots = Vec::new();
    let mut stack: Vec<Option<usize>> = Vec::new();
    let mut parent: Option<usize> = None;

    for index in (0..layers.len()).rev() {
        if layers[index].section_type == SectionType::Divider {
            parent = stack
                .pop()
                .ok_or(PsdDecodeErrors::UnbalancedGroupMarkers)?;
            continue;
        }

        match parent {
            Some(p) => {
                layers[index].parent = Some(p);
                layers[p].children.insert(0, index);
            }
            None => roots.insert(0, index)
        }

        if layers[index].section_type.is_group() {
            stack.push(parent);
            parent = Some(index);
        }
    }

    if !stack.is_empty() {
        return Err(PsdDecodeErrors::UnbalancedGroupMarkers);
    }
    Ok(roots)
}

/// Collect `index` and every transitive child, depth first.
pub(crate) fn descendants(layers: &[PsdLayer], index: usize) -> Vec<usize> {
    let mut found = Vec::new();
    let mut pending = vec![index];
    while let Some(current) = pending.pop() {
        found.push(current);
        pending.extend(layers[current].children.iter().copied());
    }
    found
}

/// Resize every group to the union of its image-bearing descendants.
///
/// Groups nested deepest are handled first so a parent group unions
/// over already-final child bounds. A placed layer contributes the
/// bounding box of its transformed corners instead of its record
/// bounds; a group with no image-bearing descendant keeps its record
/// bounds.
pub(crate) fn compute_group_bounds(layers: &mut [PsdLayer]) {
    let mut groups: Vec<usize> =
        (0..layers.len()).filter(|i| layers[*i].is_group()).collect();
    groups.sort_by_key(|i| std::cmp::Reverse(depth(layers, *i)));

    for group in groups {
        let mut bounds: Option<(i32, i32, i32, i32)> = None;

        for item in descendants(layers, group) {
            if item == group || !layers[item].has_image() {
                continue;
            }
            let layer = &layers[item];

            let (top, left, bottom, right) = match layer
                .resources
                .get_path("PlLd.Transformation")
                .and_then(Value::as_doubles)
            {
                Some(corners) if corners.len() >= 8 => {
                    transformed_bounds(corners)
                }
                _ => (layer.top, layer.left, layer.bottom, layer.right)
            };

            bounds = Some(match bounds {
                None => (top, left, bottom, right),
                Some((t, l, b, r)) => (
                    t.min(top),
                    l.min(left),
                    b.max(bottom),
                    r.max(right)
                )
            });
        }

        if let Some((top, left, bottom, right)) = bounds {
            let layer = &mut layers[group];
            layer.top = top;
            layer.left = left;
            layer.bottom = bottom;
            layer.right = right;
        }
    }
}

fn depth(layers: &[PsdLayer], mut index: usize) -> usize {
    let mut depth = 0;
    while let Some(parent) = layers[index].parent {
        depth += 1;
        index = parent;
    }
    depth
}

/// Bounding box of four transformed corner points stored as
/// interleaved x, y pairs.
fn transformed_bounds(corners: &[f64]) -> (i32, i32, i32, i32) {
    let xs = [corners[0], corners[2], corners[4], corners[6]];
    let ys = [corners[1], corners[3], corners[5], corners[7]];

    let fold = |values: [f64; 4], pick: fn(f64, f64) -> f64| {
        values.into_iter().reduce(pick).unwrap_or_default()
    };

    let left = fold(xs, f64::min).ceil() as i32;
    let right = fold(xs, f64::max).ceil() as i32;
    let top = fold(ys, f64::min).ceil() as i32;
    let bottom = fold(ys, f64::max).ceil() as i32;
    (top, left, bottom, right)
}

/// Parse the layer-info block: record run, tree links and group
/// bounds. Pixel data is located but left undecoded.
pub(crate) fn decode_layer_info<T: ByteSource>(
    reader: &mut PsdReader<T>, options: &ParserOptions
) -> Result<(Vec<PsdLayer>, Vec<usize>), PsdDecodeErrors> {
    let layer_count = reader.read_i16()?.unsigned_abs() as usize;
    trace!("layer info: {layer_count} records");

    let mut layers = Vec::with_capacity(layer_count);
    for _ in 0..layer_count {
        layers.push(PsdLayer::decode(reader, options)?);
    }

    // pixel data follows the records, one contiguous run per layer
    let mut cursor = reader.position();
    for layer in &mut layers {
        layer.pixel_start = cursor;
        cursor += layer.pixel_data_size();
    }
    reader.set_position(cursor)?;

    let roots = build_tree(&mut layers)?;
    compute_group_bounds(&mut layers);
    Ok((layers, roots))
}
