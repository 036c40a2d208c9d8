use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mosaic_core::types::TileId;
use mosaic_stream::store::RowOrder;
use mosaic_stream::{FetchOutcome, LevelFormat, RawTile, TileStore};

/// Fill colors per level, cycled for levels past the table.
const LEVEL_COLORS: [[u8; 3]; 8] = [
    [230, 80, 60],
    [240, 160, 50],
    [220, 220, 70],
    [90, 200, 90],
    [60, 170, 220],
    [90, 100, 230],
    [170, 90, 220],
    [220, 90, 170],
];

/// Color of the marker row at the top of every tile.
pub const TOP_ROW_COLOR: [u8; 4] = [255, 255, 255, 255];

/// Procedural tile source standing in for a remote store.
///
/// Tiles are RGBA8 checkerboards tinted by level with a white top row, served
/// bottom-up so the worker's row flip is exercised. Each fetch sleeps for
/// `latency`; a deterministic fraction `fail_rate` of attempts report a
/// transient error.
pub struct SyntheticStore {
    tile_size: u32,
    latency: Duration,
    fail_rate: f32,
    attempts: AtomicU64,
}

impl SyntheticStore {
    pub fn new(tile_size: u32, latency: Duration, fail_rate: f32) -> Self {
        Self {
            tile_size,
            latency,
            fail_rate: fail_rate.clamp(0.0, 1.0),
            attempts: AtomicU64::new(0),
        }
    }

    /// Fetches served so far, failed ones included.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Top-down RGBA8 pixels of `tile`.
    pub fn render_tile(&self, tile: TileId) -> Vec<u8> {
        let size = self.tile_size as usize;
        let [r, g, b] = LEVEL_COLORS[tile.level as usize % LEVEL_COLORS.len()];
        let check = (size / 8).max(1);
        let mut pixels = Vec::with_capacity(size * size * 4);
        for y in 0..size {
            for x in 0..size {
                if y == 0 {
                    pixels.extend_from_slice(&TOP_ROW_COLOR);
                    continue;
                }
                let dark = ((x / check) + (y / check) + (tile.x + tile.y).rem_euclid(2) as usize) % 2 == 0;
                let shade = if dark { 2 } else { 1 };
                pixels.extend_from_slice(&[r / shade, g / shade, b / shade, 255]);
            }
        }
        pixels
    }

    fn should_fail(&self, tile: TileId, attempt: u64) -> bool {
        if self.fail_rate <= 0.0 {
            return false;
        }
        let seed = (tile.x as u32 as u64)
            ^ ((tile.y as u32 as u64) << 21)
            ^ ((tile.level as u64) << 42)
            ^ attempt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let unit = (mix64(seed) >> 40) as f32 / (1u64 << 24) as f32;
        unit < self.fail_rate
    }
}

/// SplitMix64 finalizer.
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl TileStore for SyntheticStore {
    fn fetch_tile(&self, _tileset: &str, tile: TileId) -> FetchOutcome {
        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if self.should_fail(tile, attempt) {
            return FetchOutcome::TransientError(format!("synthetic failure on attempt {attempt}"));
        }

        let row_bytes = self.tile_size as usize * 4;
        let top_down = self.render_tile(tile);
        let mut pixels = Vec::with_capacity(top_down.len());
        for row in top_down.chunks_exact(row_bytes).rev() {
            pixels.extend_from_slice(row);
        }

        FetchOutcome::Ok(RawTile {
            pixels,
            format: LevelFormat {
                row_order: RowOrder::BottomUp,
                ..LevelFormat::rgba8(self.tile_size)
            },
        })
    }
}
