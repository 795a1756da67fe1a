/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Per-channel pixel storage and decoding.
//!
//! Every layer (and the composite image) stores its pixels as
//! independent planar channels. A channel decode reads a 16-bit
//! compression selector and then either raw rows or a run-length
//! stream with a per-row length table sized by the document version.

use log::warn;
use psdoc_core::bytestream::{ByteSource, PsdReader};

use crate::constants::CompressionMethod;
use crate::errors::PsdDecodeErrors;
use crate::rle::decode_packbits;

/// What a channel's samples mean.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    Red,
    Green,
    Blue,
    Alpha,
    /// A layer-mask plane, stored with its own bounds.
    Mask,
    /// A spot or otherwise unclassified plane, kept with its raw id.
    Custom(i16)
}

impl ChannelKind {
    pub fn from_i16(id: i16) -> ChannelKind {
        match id {
            0 => ChannelKind::Red,
            1 => ChannelKind::Green,
            2 => ChannelKind::Blue,
            -1 => ChannelKind::Alpha,
            -2 => ChannelKind::Mask,
            other => ChannelKind::Custom(other)
        }
    }
}

/// A single planar channel of a layer or of the composite.
pub struct Channel {
    pub kind: ChannelKind,
    /// Stored byte size of this channel inside the pixel-data
    /// section, compression selector included.
    pub(crate) stored_size: u64,
    /// Decoded samples, one plane, row major.
    pub data: Vec<u8>
}

impl Channel {
    pub(crate) fn new(kind: ChannelKind, stored_size: u64) -> Channel {
        Channel {
            kind,
            stored_size,
            data: Vec::new()
        }
    }

    /// Decode this channel's pixels at the cursor into `data`.
    ///
    /// `height` is the plane height (the mask plane passes its own),
    /// `pitch` the row stride in bytes, `opacity` a global multiplier
    /// applied to alpha planes.
    pub(crate) fn decode_pixels<T: ByteSource>(
        &mut self, reader: &mut PsdReader<T>, height: usize, pitch: usize,
        opacity: f32
    ) -> Result<(), PsdDecodeErrors> {
        let compression = reader.read_i16()? as u16;
        let method = CompressionMethod::from_int(compression)
            .ok_or(PsdDecodeErrors::UnsupportedCompression(compression))?;

        self.data = vec![0; pitch * height];

        match method {
            CompressionMethod::Raw => {
                reader.read_exact_bytes(&mut self.data)?;
            }
            CompressionMethod::Rle => {
                self.decode_rle_rows(reader, height, pitch)?;
            }
            CompressionMethod::Zip | CompressionMethod::ZipPrediction => {
                return Err(PsdDecodeErrors::UnsupportedCompression(
                    compression
                ));
            }
        }

        if self.kind == ChannelKind::Alpha && opacity < 1.0 {
            let scale = opacity.clamp(0.0, 1.0);
            for sample in &mut self.data {
                *sample = (f32::from(*sample) * scale) as u8;
            }
        }
        Ok(())
    }

    fn decode_rle_rows<T: ByteSource>(
        &mut self, reader: &mut PsdReader<T>, height: usize, pitch: usize
    ) -> Result<(), PsdDecodeErrors> {
        // row byte counts; the field width follows the file version
        let mut row_sizes = Vec::with_capacity(height);
        for _ in 0..height {
            let size = match reader.version() {
                2 => reader.read_u32()? as usize,
                _ => usize::from(reader.read_u16()?)
            };
            row_sizes.push(size);
        }

        let mut packed = Vec::new();
        for (row, size) in row_sizes.iter().enumerate() {
            packed.resize(*size, 0);
            reader.read_exact_bytes(&mut packed)?;

            let start = row * pitch;
            decode_packbits(&packed, &mut self.data[start..start + pitch])?;
        }
        Ok(())
    }
}

/// Decode the composite image-data section.
///
/// Unlike layer pixels, the composite stores one compression
/// selector for all planes and, under run-length coding, every
/// plane's row table up front before any pixel bytes. Planes map to
/// red, green, blue and alpha in order; extra planes are mask data.
/// When an alpha plane is present the color planes are stored
/// premultiplied and are unmixed here.
pub(crate) fn decode_composite<T: ByteSource>(
    reader: &mut PsdReader<T>, channel_count: usize, height: usize,
    pitch: usize
) -> Result<Vec<Channel>, PsdDecodeErrors> {
    let compression = reader.read_i16()? as u16;
    let method = CompressionMethod::from_int(compression)
        .ok_or(PsdDecodeErrors::UnsupportedCompression(compression))?;

    const SLOTS: [ChannelKind; 4] = [
        ChannelKind::Red,
        ChannelKind::Green,
        ChannelKind::Blue,
        ChannelKind::Alpha
    ];
    let mut channels: Vec<Channel> = (0..channel_count)
        .map(|i| {
            Channel::new(*SLOTS.get(i).unwrap_or(&ChannelKind::Mask), 0)
        })
        .collect();

    match method {
        CompressionMethod::Raw => {
            for channel in &mut channels {
                channel.data = reader.read_bytes_vec(pitch * height)?;
            }
        }
        CompressionMethod::Rle => {
            let mut row_sizes = Vec::with_capacity(channel_count * height);
            for _ in 0..channel_count * height {
                let size = match reader.version() {
                    2 => reader.read_u32()? as usize,
                    _ => usize::from(reader.read_u16()?)
                };
                row_sizes.push(size);
            }

            let mut packed = Vec::new();
            for (index, channel) in channels.iter_mut().enumerate() {
                channel.data = vec![0; pitch * height];
                for row in 0..height {
                    let size = row_sizes[index * height + row];
                    packed.resize(size, 0);
                    reader.read_exact_bytes(&mut packed)?;

                    let start = row * pitch;
                    decode_packbits(
                        &packed,
                        &mut channel.data[start..start + pitch]
                    )?;
                }
            }
        }
        CompressionMethod::Zip | CompressionMethod::ZipPrediction => {
            return Err(PsdDecodeErrors::UnsupportedCompression(compression));
        }
    }

    if channel_count == 4 {
        unpremultiply(&mut channels);
    }
    Ok(channels)
}

/// Reverse the white-matte premultiplication of the composite color
/// planes against the alpha plane.
fn unpremultiply(channels: &mut [Channel]) {
    let alpha = channels[3].data.clone();
    for channel in &mut channels[..3] {
        for (sample, a) in channel.data.iter_mut().zip(&alpha) {
            if *a == 0 {
                continue;
            }
            let a = f32::from(*a) / 255.0;
            let color = f32::from(*sample) / 255.0;
            let unmixed = ((a + color - 1.0) / a).clamp(0.0, 1.0);
            *sample = (unmixed * 255.0).round() as u8;
        }
    }
}

/// Interleave planar channels into packed RGBA, one byte a sample.
///
/// Missing color planes read as zero and a missing alpha plane as
/// fully opaque. A mask plane multiplies into alpha instead of
/// occupying an output slot.
pub(crate) fn merge_channels(
    channels: &[Channel], width: usize, height: usize
) -> Vec<u8> {
    let area = width * height;
    let mut rgba = vec![0; area * 4];

    let mut have_alpha = false;
    let mut mask: Option<&Channel> = None;

    for channel in channels {
        let slot = match channel.kind {
            ChannelKind::Red => 0,
            ChannelKind::Green => 1,
            ChannelKind::Blue => 2,
            ChannelKind::Alpha => 3,
            ChannelKind::Mask => {
                mask = Some(channel);
                continue;
            }
            ChannelKind::Custom(id) => {
                warn!("ignoring unclassified channel {id} during merge");
                continue;
            }
        };
        if channel.kind == ChannelKind::Alpha {
            have_alpha = true;
        }
        for (i, sample) in channel.data.iter().take(area).enumerate() {
            rgba[i * 4 + slot] = *sample;
        }
    }

    if !have_alpha {
        for pixel in rgba.chunks_exact_mut(4) {
            pixel[3] = 255;
        }
    }

    if let Some(mask) = mask {
        for (i, m) in mask.data.iter().take(area).enumerate() {
            let a = u16::from(rgba[i * 4 + 3]);
            rgba[i * 4 + 3] = ((a * u16::from(*m)) / 255) as u8;
        }
    }
    rgba
}

#[cfg(test)]
mod tests {
    use psdoc_core::bytestream::MemSource;

    use super::*;

    #[test]
    fn kind_mapping() {
        assert_eq!(ChannelKind::from_i16(0), ChannelKind::Red);
        assert_eq!(ChannelKind::from_i16(-1), ChannelKind::Alpha);
        assert_eq!(ChannelKind::from_i16(-2), ChannelKind::Mask);
        assert_eq!(ChannelKind::from_i16(3), ChannelKind::Custom(3));
    }

    #[test]
    fn raw_pixels_decode() {
        let mut data = vec![0, 0]; // raw selector
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6]);

        let mut reader = PsdReader::new(MemSource::new(data));
        let mut channel = Channel::new(ChannelKind::Red, 8);
        channel
            .decode_pixels(&mut reader, 2, 3, 1.0)
            .unwrap();
        assert_eq!(channel.data, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn rle_rows_decode_with_per_row_table() {
        // two rows of three bytes: a replicate run and a literal run
        let mut data = vec![0, 1]; // rle selector
        data.extend_from_slice(&2u16.to_be_bytes());
        data.extend_from_slice(&4u16.to_be_bytes());
        data.extend_from_slice(&[0xFE, 0xAA]); // 3x 0xAA
        data.extend_from_slice(&[0x02, 1, 2, 3]); // literal 1 2 3

        let mut reader = PsdReader::new(MemSource::new(data));
        let mut channel = Channel::new(ChannelKind::Green, 0);
        channel
            .decode_pixels(&mut reader, 2, 3, 1.0)
            .unwrap();
        assert_eq!(channel.data, vec![0xAA, 0xAA, 0xAA, 1, 2, 3]);
    }

    #[test]
    fn alpha_plane_scales_by_opacity() {
        let mut data = vec![0, 0];
        data.extend_from_slice(&[200, 100]);

        let mut reader = PsdReader::new(MemSource::new(data));
        let mut channel = Channel::new(ChannelKind::Alpha, 4);
        channel
            .decode_pixels(&mut reader, 1, 2, 0.5)
            .unwrap();
        assert_eq!(channel.data, vec![100, 50]);
    }

    #[test]
    fn zip_compression_is_rejected() {
        let data = vec![0, 2, 0, 0];
        let mut reader = PsdReader::new(MemSource::new(data));
        let mut channel = Channel::new(ChannelKind::Blue, 4);
        let err = channel
            .decode_pixels(&mut reader, 1, 1, 1.0)
            .unwrap_err();
        assert!(matches!(
            err,
            PsdDecodeErrors::UnsupportedCompression(2)
        ));
        assert!(err.is_unsupported());
    }

    #[test]
    fn composite_shares_one_selector_and_front_loads_row_tables() {
        // two RLE channels, 1x2 pixels each: row tables for both
        // planes come before any pixel bytes
        let mut data = vec![0, 1];
        for _ in 0..4 {
            data.extend_from_slice(&3u16.to_be_bytes());
        }
        data.extend_from_slice(&[0x01, 10, 11]); // red rows
        data.extend_from_slice(&[0x01, 12, 13]);
        data.extend_from_slice(&[0x01, 20, 21]); // green rows
        data.extend_from_slice(&[0x01, 22, 23]);

        let mut reader = PsdReader::new(MemSource::new(data));
        let channels = decode_composite(&mut reader, 2, 2, 2).unwrap();

        assert_eq!(channels[0].kind, ChannelKind::Red);
        assert_eq!(channels[0].data, vec![10, 11, 12, 13]);
        assert_eq!(channels[1].kind, ChannelKind::Green);
        assert_eq!(channels[1].data, vec![20, 21, 22, 23]);
    }

    #[test]
    fn composite_with_alpha_is_unpremultiplied() {
        // raw, 1x1, four channels; colors stored against a white
        // matte at half alpha
        let mut data = vec![0, 0];
        data.push(255); // red
        data.push(128); // green
        data.push(191); // blue
        data.push(128); // alpha

        let mut reader = PsdReader::new(MemSource::new(data));
        let channels = decode_composite(&mut reader, 4, 1, 1).unwrap();

        // (a + c - 1) / a with a = 0.502: a saturated sample must
        // come back exactly saturated, not one short of it
        assert_eq!(channels[0].data[0], 255);
        assert_eq!(channels[1].data[0], 2);
        assert!(channels[2].data[0].abs_diff(127) <= 1);
        assert_eq!(channels[3].data[0], 128);
    }

    #[test]
    fn merge_interleaves_and_defaults_alpha() {
        let mut red = Channel::new(ChannelKind::Red, 0);
        red.data = vec![10, 20];
        let mut green = Channel::new(ChannelKind::Green, 0);
        green.data = vec![30, 40];
        let mut blue = Channel::new(ChannelKind::Blue, 0);
        blue.data = vec![50, 60];

        let rgba = merge_channels(&[red, green, blue], 2, 1);
        assert_eq!(rgba, vec![10, 30, 50, 255, 20, 40, 60, 255]);
    }

    #[test]
    fn mask_multiplies_alpha() {
        let mut red = Channel::new(ChannelKind::Red, 0);
        red.data = vec![10];
        let mut alpha = Channel::new(ChannelKind::Alpha, 0);
        alpha.data = vec![200];
        let mut mask = Channel::new(ChannelKind::Mask, 0);
        mask.data = vec![128];

        let rgba = merge_channels(&[red, alpha, mask], 1, 1);
        assert_eq!(rgba[3], (200 * 128 / 255) as u8);
    }
}
