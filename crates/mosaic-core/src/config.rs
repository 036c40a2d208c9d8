use std::time::Duration;

use glam::{UVec2, Vec2};
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

/// Static configuration of the streaming core, fixed for the lifetime of a
/// `TileStreamer`. Every field has a default so partial RON files are valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Identifier of the dataset passed through to the store.
    pub tileset: String,
    /// Tile slots per level window (x, y).
    pub grid_size: [u32; 2],
    /// Resolution levels allocated in the tile array (one layer each).
    pub max_levels: u32,
    /// Tile edge length in pixels.
    pub tile_size: u32,
    /// Result queue capacity (backpressure cap).
    pub max_outstanding: usize,
    /// Frames in flight; replication factor of multiplexed resources.
    pub frames_in_flight: u32,
    /// Tiles each staging region must be able to hold.
    pub staging_tiles_per_frame: u32,
    /// Worker idle/backpressure sleep in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tileset: "default".to_string(),
            grid_size: DEFAULT_GRID_SIZE,
            max_levels: DEFAULT_MAX_LEVELS,
            tile_size: DEFAULT_TILE_SIZE,
            max_outstanding: MAX_OUTSTANDING_RESULTS,
            frames_in_flight: FRAMES_IN_FLIGHT,
            staging_tiles_per_frame: STAGING_TILES_PER_FRAME,
            poll_interval_ms: WORKER_POLL_INTERVAL_MS,
        }
    }
}

impl StreamConfig {
    /// Parse and validate a config from RON text.
    pub fn from_ron_str(ron_str: &str) -> Result<Self, ConfigError> {
        let options = ron::Options::default();
        let config: StreamConfig = options
            .from_str(ron_str)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot back a tile array or a staging ring.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let [gx, gy] = self.grid_size;
        if gx == 0 || gy == 0 {
            return Err(ConfigError::EmptyGrid(gx, gy));
        }
        if self.max_levels == 0 || self.max_levels > MAX_LEVELS {
            return Err(ConfigError::LevelCount {
                max: MAX_LEVELS,
                actual: self.max_levels,
            });
        }
        if self.tile_size == 0 {
            return Err(ConfigError::Zero("tile_size"));
        }
        if (self.tile_size * BYTES_PER_PIXEL) % COPY_ROW_ALIGNMENT != 0 {
            return Err(ConfigError::UnalignedTileRow(self.tile_size));
        }
        if self.max_outstanding == 0 {
            return Err(ConfigError::Zero("max_outstanding"));
        }
        if self.frames_in_flight == 0 {
            return Err(ConfigError::Zero("frames_in_flight"));
        }
        if self.staging_tiles_per_frame == 0 {
            return Err(ConfigError::Zero("staging_tiles_per_frame"));
        }
        if self.frames_in_flight < 2 {
            log::warn!(
                "StreamConfig: frames_in_flight={} leaves no room for CPU/GPU overlap",
                self.frames_in_flight
            );
        }
        Ok(())
    }

    pub fn grid_size(&self) -> UVec2 {
        UVec2::from_array(self.grid_size)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Bytes of one tile at the configured size.
    pub fn tile_bytes(&self) -> u64 {
        tile_bytes(self.tile_size)
    }

    /// Bytes of one staging region (one frame's worth of tile uploads).
    pub fn staging_region_bytes(&self) -> u64 {
        self.tile_bytes() * self.staging_tiles_per_frame as u64
    }

    /// Number of 0/1 entries in the occupancy table.
    pub fn occupancy_len(&self) -> usize {
        self.max_levels as usize * self.grid_size[0] as usize * self.grid_size[1] as usize
    }
}

/// Per-frame inputs from the caller. Plain values, no persistence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewParams {
    /// View center in level-0 tile units.
    pub center: Vec2,
    /// Number of active levels this frame (zoom).
    pub num_levels: u32,
    /// Keep the previous grid windows even if the center moved.
    pub freeze_grid_location: bool,
    /// Keep the previous active level count even if `num_levels` changed.
    pub freeze_grid_levels: bool,
}

impl ViewParams {
    pub fn new(center: Vec2, num_levels: u32) -> Self {
        Self {
            center,
            num_levels,
            freeze_grid_location: false,
            freeze_grid_levels: false,
        }
    }
}
