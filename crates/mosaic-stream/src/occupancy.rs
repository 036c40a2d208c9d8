use std::collections::HashSet;

use glam::UVec2;
use mosaic_core::math::slot_index;
use mosaic_core::types::{GridWindow, TileId};

/// Per-level residency mask in shader layout: `max_levels` layers of
/// `grid.y` rows of `grid.x` u32 values, 1 where the toroidal slot holds a
/// resident tile of the current window and 0 elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyTable {
    grid_size: UVec2,
    max_levels: u32,
    cells: Vec<u32>,
}

impl OccupancyTable {
    /// All-empty table.
    pub fn empty(grid_size: UVec2, max_levels: u32) -> Self {
        let len = max_levels as usize * grid_size.x as usize * grid_size.y as usize;
        Self {
            grid_size,
            max_levels,
            cells: vec![0; len],
        }
    }

    /// Rebuild from the resident set. Tiles outside their level's window or at
    /// an inactive level (`>= num_grids`) are left unmarked.
    pub fn build(
        resident: &HashSet<TileId>,
        windows: &[GridWindow],
        num_grids: u32,
        grid_size: UVec2,
        max_levels: u32,
    ) -> Self {
        let mut table = Self::empty(grid_size, max_levels);
        for tile in resident {
            if tile.level >= num_grids || tile.level >= max_levels {
                continue;
            }
            let Some(window) = windows.get(tile.level as usize) else {
                continue;
            };
            if !window.contains(*tile) {
                continue;
            }
            let slot = window.slot_of(*tile);
            table.cells[slot_index(tile.level, slot, grid_size)] = 1;
        }
        table
    }

    /// Whether the slot at `level` is marked resident.
    pub fn is_set(&self, level: u32, slot: UVec2) -> bool {
        if level >= self.max_levels || slot.x >= self.grid_size.x || slot.y >= self.grid_size.y {
            return false;
        }
        self.cells[slot_index(level, slot, self.grid_size)] != 0
    }

    /// Number of marked slots across all levels.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c != 0).count()
    }

    /// Flattened cells, ready for upload.
    pub fn as_slice(&self) -> &[u32] {
        &self.cells
    }

    pub fn grid_size(&self) -> UVec2 {
        self.grid_size
    }

    pub fn max_levels(&self) -> u32 {
        self.max_levels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{IVec2, Vec2};

    use crate::residency::compute_windows;

    #[test]
    fn test_build_marks_toroidal_slots() {
        let grid = UVec2::new(6, 4);
        let windows = compute_windows(Vec2::new(0.0, 0.0), 2, grid);
        // Level 0 window begins at (-3, -2).
        let resident: HashSet<TileId> = [
            TileId::new(-3, -2, 0),
            TileId::new(2, 1, 0),
            TileId::new(0, 0, 1),
        ]
        .into_iter()
        .collect();

        let table = OccupancyTable::build(&resident, &windows, 2, grid, 2);
        assert_eq!(table.as_slice().len(), 2 * 24);
        assert_eq!(table.count(), 3);
        assert!(table.is_set(0, UVec2::new(0, 0)));
        assert!(table.is_set(0, UVec2::new(5, 3)));
        assert!(table.is_set(1, windows[1].slot_of(TileId::new(0, 0, 1))));
        assert!(!table.is_set(0, UVec2::new(1, 0)));
    }

    #[test]
    fn test_build_skips_inactive_levels_and_outside_tiles() {
        let grid = UVec2::new(6, 4);
        let windows = compute_windows(Vec2::ZERO, 3, grid);
        let resident: HashSet<TileId> = [
            TileId::new(0, 0, 0),
            TileId::new(0, 0, 2),
            // Outside the level-0 window; would alias slot of (0, 0, 0) + (6, 0).
            TileId::new(0, 0, 0).offset(IVec2::new(6, 0)),
        ]
        .into_iter()
        .collect();

        let table = OccupancyTable::build(&resident, &windows, 2, grid, 3);
        assert_eq!(table.count(), 1);
        assert!(table.is_set(0, windows[0].slot_of(TileId::new(0, 0, 0))));
    }

    #[test]
    fn test_empty_table() {
        let table = OccupancyTable::empty(UVec2::new(3, 2), 4);
        assert_eq!(table.as_slice(), &[0u32; 24][..]);
        assert!(!table.is_set(9, UVec2::ZERO));
    }
}
