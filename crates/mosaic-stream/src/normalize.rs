use mosaic_core::constants::BYTES_PER_PIXEL;

use crate::error::NormalizeError;
use crate::store::{ByteOrder, LevelFormat, RawTile, RowOrder};

/// Tile pixels in the layout the GPU array expects: little-endian channel
/// elements, top row first, tightly packed rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePixels {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    pub data: Vec<u8>,
}

impl TilePixels {
    /// Tile filled with one RGBA8 color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        Self {
            width,
            height,
            bytes_per_pixel: 4,
            data,
        }
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.bytes_per_pixel as usize
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

/// Convert the store's raw layout into `TilePixels`.
///
/// Multi-byte channel elements are swapped to little-endian when the store
/// reports big-endian data, and rows are reversed when the store writes the
/// bottom row first. Pure function; no allocation beyond taking ownership.
pub fn normalize_tile(raw: RawTile) -> Result<TilePixels, NormalizeError> {
    let RawTile { mut pixels, format } = raw;
    let LevelFormat {
        width,
        height,
        channels,
        channel_bytes,
        byte_order,
        row_order,
    } = format;

    if !matches!(channel_bytes, 1 | 2 | 4) {
        return Err(NormalizeError::UnsupportedChannelBytes(channel_bytes));
    }
    if channels == 0 {
        return Err(NormalizeError::NoChannels);
    }

    let bytes_per_pixel = channels * channel_bytes;
    let expected = width as usize * height as usize * bytes_per_pixel as usize;
    if pixels.len() != expected {
        return Err(NormalizeError::SizeMismatch {
            expected,
            actual: pixels.len(),
        });
    }

    if byte_order == ByteOrder::BigEndian && channel_bytes > 1 {
        for element in pixels.chunks_exact_mut(channel_bytes as usize) {
            element.reverse();
        }
    }

    if row_order == RowOrder::BottomUp {
        flip_rows(&mut pixels, width as usize * bytes_per_pixel as usize);
    }

    Ok(TilePixels {
        width,
        height,
        bytes_per_pixel,
        data: pixels,
    })
}

/// Reject pixels that cannot be copied into a `tile_size` RGBA8 array layer.
pub fn check_shape(pixels: &TilePixels, tile_size: u32) -> Result<(), NormalizeError> {
    if pixels.width != tile_size
        || pixels.height != tile_size
        || pixels.bytes_per_pixel != BYTES_PER_PIXEL
    {
        return Err(NormalizeError::ShapeMismatch {
            expected: tile_size,
            width: pixels.width,
            height: pixels.height,
            bytes_per_pixel: pixels.bytes_per_pixel,
        });
    }
    Ok(())
}

/// Reverse row order in place.
fn flip_rows(data: &mut [u8], row_bytes: usize) {
    if row_bytes == 0 {
        return;
    }
    let rows = data.len() / row_bytes;
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (head, tail) = data.split_at_mut(bottom * row_bytes);
        head[top * row_bytes..(top + 1) * row_bytes].swap_with_slice(&mut tail[..row_bytes]);
    }
}
