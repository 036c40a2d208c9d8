use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use mosaic_core::types::TileId;

/// Byte order of multi-byte channel elements as delivered by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    LittleEndian,
    BigEndian,
}

/// Row order of a delivered tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrder {
    #[default]
    TopDown,
    /// Bottom row first (the y axis points up).
    BottomUp,
}

/// Per-level layout metadata reported alongside raw tile bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelFormat {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub channel_bytes: u32,
    pub byte_order: ByteOrder,
    pub row_order: RowOrder,
}

impl LevelFormat {
    /// Tightly packed, top-down RGBA8.
    pub fn rgba8(tile_size: u32) -> Self {
        Self {
            width: tile_size,
            height: tile_size,
            channels: 4,
            channel_bytes: 1,
            byte_order: ByteOrder::LittleEndian,
            row_order: RowOrder::TopDown,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.channels as usize * self.channel_bytes as usize
    }
}

/// Tile bytes exactly as the store holds them.
#[derive(Debug, Clone)]
pub struct RawTile {
    pub pixels: Vec<u8>,
    pub format: LevelFormat,
}

/// Outcome of one blocking fetch. The only failure channel of a store:
/// stores report problems here and never panic on purpose.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Ok(RawTile),
    /// The store has no data for this tile.
    NotFound,
    /// Transport or decode failure; the tile may succeed on a later request.
    TransientError(String),
}

/// Remote tile source. Called only from the fetch worker thread and allowed
/// to block for as long as the transport needs.
pub trait TileStore: Send + Sync {
    fn fetch_tile(&self, tileset: &str, tile: TileId) -> FetchOutcome;
}

/// In-process store keeping tiles LZ4-compressed in memory.
#[derive(Default)]
pub struct MemoryTileStore {
    tiles: RwLock<HashMap<(String, TileId), (LevelFormat, Vec<u8>)>>,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compress and store one tile, replacing any previous entry.
    pub fn insert(&self, tileset: &str, tile: TileId, raw: RawTile) {
        let compressed = lz4_flex::compress_prepend_size(&raw.pixels);
        self.tiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((tileset.to_string(), tile), (raw.format, compressed));
    }

    pub fn remove(&self, tileset: &str, tile: TileId) -> bool {
        self.tiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(tileset.to_string(), tile))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.tiles.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TileStore for MemoryTileStore {
    fn fetch_tile(&self, tileset: &str, tile: TileId) -> FetchOutcome {
        let tiles = self.tiles.read().unwrap_or_else(PoisonError::into_inner);
        let Some((format, compressed)) = tiles.get(&(tileset.to_string(), tile)) else {
            return FetchOutcome::NotFound;
        };
        match lz4_flex::decompress_size_prepended(compressed) {
            Ok(pixels) => FetchOutcome::Ok(RawTile {
                pixels,
                format: *format,
            }),
            Err(e) => FetchOutcome::TransientError(format!("LZ4 decompression failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip_and_missing() {
        let store = MemoryTileStore::new();
        let tile = TileId::new(-2, 7, 1);
        let pixels: Vec<u8> = (0..64u32).map(|i| (i % 7) as u8).collect();
        store.insert(
            "earth",
            tile,
            RawTile {
                pixels: pixels.clone(),
                format: LevelFormat::rgba8(4),
            },
        );
        assert_eq!(store.len(), 1);

        match store.fetch_tile("earth", tile) {
            FetchOutcome::Ok(raw) => {
                assert_eq!(raw.pixels, pixels);
                assert_eq!(raw.format, LevelFormat::rgba8(4));
            }
            other => panic!("expected tile, got {other:?}"),
        }

        assert!(matches!(store.fetch_tile("mars", tile), FetchOutcome::NotFound));
        assert!(matches!(
            store.fetch_tile("earth", TileId::new(0, 0, 0)),
            FetchOutcome::NotFound
        ));

        assert!(store.remove("earth", tile));
        assert!(store.is_empty());
    }

    #[test]
    fn test_level_format_byte_len() {
        assert_eq!(LevelFormat::rgba8(256).byte_len(), 256 * 256 * 4);
    }
}
