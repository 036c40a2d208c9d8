use glam::{IVec2, UVec2};
use serde::{Deserialize, Serialize};

use crate::math::{floor_div, level_scale, toroidal_slot};

/// Identity of one tile at one resolution level.
///
/// `x` and `y` are tile indices local to `level`: a tile at level `L` spans
/// `2^L` level-0 tiles on each axis. Tile ids are plain keys, never owners of
/// GPU resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId {
    pub x: i32,
    pub y: i32,
    pub level: u32,
}

impl TileId {
    pub const fn new(x: i32, y: i32, level: u32) -> Self {
        Self { x, y, level }
    }

    /// Tile position as a vector of level-local indices.
    pub fn xy(self) -> IVec2 {
        IVec2::new(self.x, self.y)
    }

    /// Same tile translated by `delta` tiles at its own level.
    pub fn offset(self, delta: IVec2) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y, self.level)
    }
}

/// Window of `size.x * size.y` tile slots visible at one level.
///
/// `begin` is the window origin in level-0 tile units and is always a
/// multiple of `2^level` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridWindow {
    pub level: u32,
    pub begin: IVec2,
    pub size: UVec2,
}

impl GridWindow {
    pub fn new(level: u32, begin: IVec2, size: UVec2) -> Self {
        debug_assert!(
            begin.x % level_scale(level) == 0 && begin.y % level_scale(level) == 0,
            "grid begin {begin} not aligned to level {level}"
        );
        Self { level, begin, size }
    }

    /// Window origin converted to tile indices at this window's level.
    pub fn begin_tiles(&self) -> IVec2 {
        let scale = level_scale(self.level);
        IVec2::new(floor_div(self.begin.x, scale), floor_div(self.begin.y, scale))
    }

    /// One past the last tile index covered by the window, at this level.
    pub fn end_tiles(&self) -> IVec2 {
        self.begin_tiles() + self.size.as_ivec2()
    }

    /// Whether `tile` lies inside this window (level must match).
    pub fn contains(&self, tile: TileId) -> bool {
        if tile.level != self.level {
            return false;
        }
        let lo = self.begin_tiles();
        let hi = self.end_tiles();
        tile.x >= lo.x && tile.x < hi.x && tile.y >= lo.y && tile.y < hi.y
    }

    /// Every tile covered by the window, row-major from the origin.
    pub fn tiles(&self) -> impl Iterator<Item = TileId> + '_ {
        let lo = self.begin_tiles();
        let level = self.level;
        let w = self.size.x as i32;
        let h = self.size.y as i32;
        (0..h).flat_map(move |dy| (0..w).map(move |dx| TileId::new(lo.x + dx, lo.y + dy, level)))
    }

    /// Toroidal array slot for `tile` under this window's addressing.
    pub fn slot_of(&self, tile: TileId) -> UVec2 {
        toroidal_slot(tile, self.begin, self.size)
    }

    /// Tile index at the middle of the window (rounded toward the origin).
    pub fn center_tiles(&self) -> IVec2 {
        self.begin_tiles() + (self.size / 2).as_ivec2()
    }

    /// Number of slots in the window.
    pub fn slot_count(&self) -> usize {
        self.size.x as usize * self.size.y as usize
    }
}
