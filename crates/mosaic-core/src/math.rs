use glam::{IVec2, UVec2};

use crate::types::TileId;

/// Integer division rounding toward negative infinity.
pub fn floor_div(a: i32, b: i32) -> i32 {
    a.div_euclid(b)
}

/// Modulo that is never negative for a positive modulus.
pub fn euclid_mod(a: i32, n: i32) -> i32 {
    a.rem_euclid(n)
}

/// Width of one tile at `level`, in level-0 tile units (`2^level`).
pub fn level_scale(level: u32) -> i32 {
    1i32 << level
}

/// Map a tile to its slot in the fixed-size array layer of its level.
///
/// `grid_begin` is the window origin in level-0 tile units. The result is
/// `(tile - grid_begin / 2^level) mod grid_size`, so a window sliding by one
/// tile overwrites exactly the slots of the tiles it left behind.
pub fn toroidal_slot(tile: TileId, grid_begin: IVec2, grid_size: UVec2) -> UVec2 {
    let scale = level_scale(tile.level);
    let begin = IVec2::new(floor_div(grid_begin.x, scale), floor_div(grid_begin.y, scale));
    let rel = tile.xy() - begin;
    UVec2::new(
        euclid_mod(rel.x, grid_size.x as i32) as u32,
        euclid_mod(rel.y, grid_size.y as i32) as u32,
    )
}

/// Flattened index of a slot inside the per-level occupancy grid.
pub fn slot_index(level: u32, slot: UVec2, grid_size: UVec2) -> usize {
    let per_level = grid_size.x as usize * grid_size.y as usize;
    level as usize * per_level + slot.y as usize * grid_size.x as usize + slot.x as usize
}

/// Round `value` up to a multiple of `alignment` (alignment must be non-zero).
pub fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_div_negative() {
        assert_eq!(floor_div(-1, 4), -1);
        assert_eq!(floor_div(-4, 4), -1);
        assert_eq!(floor_div(-5, 4), -2);
        assert_eq!(floor_div(7, 4), 1);
    }

    #[test]
    fn test_euclid_mod_never_negative() {
        for a in -20..20 {
            let m = euclid_mod(a, 6);
            assert!((0..6).contains(&m), "{a} mod 6 gave {m}");
        }
        assert_eq!(euclid_mod(-1, 6), 5);
    }

    #[test]
    fn test_toroidal_slot_translation_invariant() {
        let size = UVec2::new(6, 4);
        let begin = IVec2::new(-8, 12);
        for level in 0..4 {
            for x in -10..10 {
                for y in -7..7 {
                    let tile = TileId::new(x, y, level);
                    let slot = toroidal_slot(tile, begin, size);
                    assert_eq!(slot, toroidal_slot(tile.offset(IVec2::new(6, 0)), begin, size));
                    assert_eq!(slot, toroidal_slot(tile.offset(IVec2::new(0, -4)), begin, size));
                }
            }
        }
    }

    #[test]
    fn test_toroidal_slot_origin_maps_to_zero() {
        let size = UVec2::new(6, 4);
        // Level 2 window starting at level-0 tile (-8, 4) begins at level-2 tile (-2, 1).
        let slot = toroidal_slot(TileId::new(-2, 1, 2), IVec2::new(-8, 4), size);
        assert_eq!(slot, UVec2::ZERO);
        let slot = toroidal_slot(TileId::new(-3, 1, 2), IVec2::new(-8, 4), size);
        assert_eq!(slot, UVec2::new(5, 0));
    }

    #[test]
    fn test_slot_index_layout() {
        let size = UVec2::new(6, 4);
        assert_eq!(slot_index(0, UVec2::new(0, 0), size), 0);
        assert_eq!(slot_index(0, UVec2::new(5, 0), size), 5);
        assert_eq!(slot_index(0, UVec2::new(0, 1), size), 6);
        assert_eq!(slot_index(1, UVec2::new(0, 0), size), 24);
        assert_eq!(slot_index(2, UVec2::new(5, 3), size), 71);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }
}
