/*
 * Copyright (c) 2024.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Parser limit options.

/// Limits that influence parsing routines.
///
/// Defaults are the format's own sanity caps: a single layer extent
/// never exceeds 12288 pixels and a record never carries more than 56
/// channels. Document dimensions default to a generous in-memory
/// limit that callers on constrained targets can lower.
#[derive(Debug, Copy, Clone)]
pub struct ParserOptions {
    max_width:        usize,
    max_height:       usize,
    max_layer_extent: i32,
    max_channels:     usize
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            max_width:        1 << 17,
            max_height:       1 << 17,
            max_layer_extent: 0x3000,
            max_channels:     56
        }
    }
}

impl ParserOptions {
    /// Create options with the default limits.
    pub fn new() -> ParserOptions {
        ParserOptions::default()
    }

    /// Maximum document width the parser accepts.
    pub const fn max_width(&self) -> usize {
        self.max_width
    }

    /// Maximum document height the parser accepts.
    pub const fn max_height(&self) -> usize {
        self.max_height
    }

    /// Maximum width or height of a single layer record.
    pub const fn max_layer_extent(&self) -> i32 {
        self.max_layer_extent
    }

    /// Maximum channel count in a layer record or the file header.
    pub const fn max_channels(&self) -> usize {
        self.max_channels
    }

    /// Return new options with the maximum document width set to `width`.
    pub const fn set_max_width(mut self, width: usize) -> Self {
        self.max_width = width;
        self
    }

    /// Return new options with the maximum document height set to `height`.
    pub const fn set_max_height(mut self, height: usize) -> Self {
        self.max_height = height;
        self
    }

    /// Return new options with the layer extent cap set to `extent`.
    pub const fn set_max_layer_extent(mut self, extent: i32) -> Self {
        self.max_layer_extent = extent;
        self
    }
}
