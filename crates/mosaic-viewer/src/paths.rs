use glam::Vec2;
use mosaic_core::ViewParams;

/// Scripted viewport motion, in level-0 tile units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathKind {
    /// Stay at the origin.
    Still,
    /// Move along +x at a constant rate.
    Pan { tiles_per_frame: f32 },
    /// Circle the origin.
    Orbit { radius: f32, frames_per_turn: u32 },
    /// Pan, then freeze the grid while the camera keeps moving.
    PanFrozen {
        tiles_per_frame: f32,
        freeze_after: u32,
    },
}

/// A named viewport path.
#[derive(Debug, Clone, Copy)]
pub struct ViewPath {
    pub name: &'static str,
    pub kind: PathKind,
}

impl ViewPath {
    /// View parameters at `frame`.
    pub fn view_at(&self, frame: u32, num_levels: u32) -> ViewParams {
        let t = frame as f32;
        match self.kind {
            PathKind::Still => ViewParams::new(Vec2::ZERO, num_levels),
            PathKind::Pan { tiles_per_frame } => {
                ViewParams::new(Vec2::new(t * tiles_per_frame, 0.0), num_levels)
            }
            PathKind::Orbit {
                radius,
                frames_per_turn,
            } => {
                let angle = t / frames_per_turn.max(1) as f32 * std::f32::consts::TAU;
                ViewParams::new(Vec2::new(angle.cos(), angle.sin()) * radius, num_levels)
            }
            PathKind::PanFrozen {
                tiles_per_frame,
                freeze_after,
            } => {
                let mut view = ViewParams::new(Vec2::new(t * tiles_per_frame, 0.0), num_levels);
                view.freeze_grid_location = frame >= freeze_after;
                view
            }
        }
    }
}

/// Every built-in path.
pub fn standard_paths() -> Vec<ViewPath> {
    vec![
        ViewPath {
            name: "still",
            kind: PathKind::Still,
        },
        ViewPath {
            name: "pan",
            kind: PathKind::Pan {
                tiles_per_frame: 0.05,
            },
        },
        ViewPath {
            name: "orbit",
            kind: PathKind::Orbit {
                radius: 12.0,
                frames_per_turn: 600,
            },
        },
        ViewPath {
            name: "pan-frozen",
            kind: PathKind::PanFrozen {
                tiles_per_frame: 0.05,
                freeze_after: 200,
            },
        },
    ]
}

/// Look up a built-in path by name.
pub fn find_path(name: &str) -> Option<ViewPath> {
    standard_paths().into_iter().find(|p| p.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_path() {
        assert!(find_path("orbit").is_some());
        assert!(find_path("spiral").is_none());
    }

    #[test]
    fn test_pan_moves_along_x() {
        let path = find_path("pan").expect("pan path");
        let a = path.view_at(0, 4);
        let b = path.view_at(100, 4);
        assert_eq!(a.center, Vec2::ZERO);
        assert!((b.center.x - 5.0).abs() < 1e-4);
        assert_eq!(b.num_levels, 4);
    }

    #[test]
    fn test_frozen_path_freezes_location() {
        let path = find_path("pan-frozen").expect("pan-frozen path");
        assert!(!path.view_at(199, 4).freeze_grid_location);
        assert!(path.view_at(200, 4).freeze_grid_location);
    }
}
