use std::collections::HashSet;

use glam::{IVec2, UVec2, Vec2};
use mosaic_core::constants::MAX_VIEW_COORD;
use mosaic_core::math::{floor_div, level_scale};
use mosaic_core::types::{GridWindow, TileId};
use mosaic_core::ViewParams;

/// Level-aligned window origin for a view centered at `view_center`
/// (level-0 tile units). The window of `grid_size` tiles at `level` is
/// centered on the tile containing the view center.
///
/// Uses floor division so negative coordinates step consistently across zero.
/// Centers beyond `MAX_VIEW_COORD` are clamped.
pub fn compute_grid_begin(view_center: Vec2, level: u32, grid_size: UVec2) -> IVec2 {
    let scale = level_scale(level);
    let center = view_center
        .clamp(Vec2::splat(-MAX_VIEW_COORD), Vec2::splat(MAX_VIEW_COORD))
        .floor()
        .as_ivec2();
    let center_tiles = IVec2::new(floor_div(center.x, scale), floor_div(center.y, scale));
    (center_tiles - (grid_size / 2).as_ivec2()) * scale
}

/// One window per level in `0..max_levels`, all sharing the same grid size.
pub fn compute_windows(view_center: Vec2, max_levels: u32, grid_size: UVec2) -> Vec<GridWindow> {
    (0..max_levels)
        .map(|level| {
            GridWindow::new(
                level,
                compute_grid_begin(view_center, level, grid_size),
                grid_size,
            )
        })
        .collect()
}

/// Every tile of every window whose level is below `num_grids`.
pub fn required_tiles(windows: &[GridWindow], num_grids: u32) -> HashSet<TileId> {
    windows
        .iter()
        .filter(|w| w.level < num_grids)
        .flat_map(|w| w.tiles())
        .collect()
}

/// Result of diffing the required set against the resident set.
#[derive(Debug, Clone, Default)]
pub struct ResidencyDiff {
    /// `required - resident`, in fetch priority order.
    pub to_fetch: Vec<TileId>,
    /// `required ∩ resident`.
    pub to_keep: HashSet<TileId>,
}

/// Split `required` into tiles to fetch and tiles already resident.
/// `to_fetch` is sorted by (level, y, x) so the result is deterministic.
pub fn diff(required: &HashSet<TileId>, resident: &HashSet<TileId>) -> ResidencyDiff {
    let mut to_fetch: Vec<TileId> = required.difference(resident).copied().collect();
    to_fetch.sort_unstable_by_key(|t| (t.level, t.y, t.x));
    let to_keep = required.intersection(resident).copied().collect();
    ResidencyDiff { to_fetch, to_keep }
}

/// Reorder fetch requests: coarse levels first (they cover the most area per
/// byte), then by Chebyshev distance from the window center, then row-major.
pub fn order_by_priority(tiles: &mut [TileId], windows: &[GridWindow]) {
    tiles.sort_by_key(|t| {
        let distance = windows
            .get(t.level as usize)
            .map(|w| {
                let d = (t.xy() - w.center_tiles()).abs();
                d.x.max(d.y)
            })
            .unwrap_or(i32::MAX);
        (std::cmp::Reverse(t.level), distance, t.y, t.x)
    });
}

/// Tracks which tiles each level's window needs and which are resident.
///
/// Owned and mutated only by the consumer thread, once per frame:
/// `update_view` → `plan` → (`accepts` for a delivered tile) → `commit`.
pub struct ResidencyTracker {
    grid_size: UVec2,
    max_levels: u32,
    /// Active level count; windows at or above it are ignored.
    num_grids: u32,
    windows: Vec<GridWindow>,
    required: HashSet<TileId>,
    resident: HashSet<TileId>,
}

impl ResidencyTracker {
    /// Create a tracker with windows centered on the origin and every level active.
    pub fn new(grid_size: UVec2, max_levels: u32) -> Self {
        let windows = compute_windows(Vec2::ZERO, max_levels, grid_size);
        let required = required_tiles(&windows, max_levels);
        Self {
            grid_size,
            max_levels,
            num_grids: max_levels,
            windows,
            required,
            resident: HashSet::new(),
        }
    }

    /// Apply this frame's view inputs and recompute the required set.
    pub fn update_view(&mut self, view: &ViewParams) {
        if !view.freeze_grid_location {
            self.windows = compute_windows(view.center, self.max_levels, self.grid_size);
        }
        if !view.freeze_grid_levels {
            self.num_grids = view.num_levels.clamp(1, self.max_levels);
        }
        self.required = required_tiles(&self.windows, self.num_grids);
    }

    /// Diff the current required set against the resident set.
    pub fn plan(&self) -> ResidencyDiff {
        let mut plan = diff(&self.required, &self.resident);
        order_by_priority(&mut plan.to_fetch, &self.windows);
        plan
    }

    /// Whether a delivered tile is still wanted by the current view.
    pub fn accepts(&self, tile: TileId) -> bool {
        self.required.contains(&tile)
    }

    /// Replace the resident set with `to_keep` plus a delivered tile that is
    /// still required. Tiles the view moved away from are dropped here.
    pub fn commit(&mut self, to_keep: HashSet<TileId>, delivered: Option<TileId>) {
        self.resident = to_keep;
        if let Some(tile) = delivered {
            if self.accepts(tile) {
                self.resident.insert(tile);
            }
        }
    }

    /// Array slot of `tile` under the current window of its level.
    pub fn slot_of(&self, tile: TileId) -> Option<UVec2> {
        self.windows
            .get(tile.level as usize)
            .map(|w| w.slot_of(tile))
    }

    pub fn resident(&self) -> &HashSet<TileId> {
        &self.resident
    }

    pub fn required(&self) -> &HashSet<TileId> {
        &self.required
    }

    pub fn windows(&self) -> &[GridWindow] {
        &self.windows
    }

    pub fn num_grids(&self) -> u32 {
        self.num_grids
    }

    pub fn grid_size(&self) -> UVec2 {
        self.grid_size
    }

    pub fn max_levels(&self) -> u32 {
        self.max_levels
    }
}
