//! Shared constants for the tile streaming core.
//! Values the shaders depend on (tile size, level count) are also exposed
//! through `StreamConfig` so they can be tuned per dataset.

/// Default edge length of a tile in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Bytes per pixel of the resident tile array (RGBA8).
pub const BYTES_PER_PIXEL: u32 = 4;

/// Hard upper bound on resolution levels. One texture array layer per level.
pub const MAX_LEVELS: u32 = 16;

/// Default number of resolution levels allocated at startup.
pub const DEFAULT_MAX_LEVELS: u32 = 8;

/// View centers are clamped to +/- this many level-0 tiles on each axis so
/// window origins and tile coordinates stay well inside `i32`.
pub const MAX_VIEW_COORD: f32 = (1u32 << 24) as f32;

/// Default grid window size in tiles (x, y), identical at every level.
pub const DEFAULT_GRID_SIZE: [u32; 2] = [6, 4];

/// Maximum number of fetched tiles allowed to wait for staging.
/// The worker stops fetching while the result queue holds this many items.
pub const MAX_OUTSTANDING_RESULTS: usize = 2;

/// Frames the graphics backend keeps in flight. Every resource written by the
/// CPU and read by in-flight GPU work is replicated this many times.
pub const FRAMES_IN_FLIGHT: u32 = 3;

/// Tiles the staging ring must hold per frame in steady state.
pub const STAGING_TILES_PER_FRAME: u32 = 1;

/// Fetch worker sleep interval when it has nothing to do or the result queue is full.
pub const WORKER_POLL_INTERVAL_MS: u64 = 10;

/// Row pitch alignment required for buffer-to-texture copies (matches
/// `wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`).
pub const COPY_ROW_ALIGNMENT: u32 = 256;

/// Bytes of one tile at the given edge length.
pub const fn tile_bytes(tile_size: u32) -> u64 {
    tile_size as u64 * tile_size as u64 * BYTES_PER_PIXEL as u64
}
