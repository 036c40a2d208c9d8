use mosaic_core::types::GridWindow;
use mosaic_stream::OccupancyTable;

use crate::error::UploadError;
use crate::multibuffer::MultiBuffer;

/// Per-level grid placement as read by the shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuGridWindow {
    /// GridBegin in level-0 tile units.
    pub begin: [i32; 2],
    /// Tiles per axis; zero for levels outside the active window set.
    pub size: [u32; 2],
}

/// Flatten the active windows into one entry per level, zero-filled past
/// the last active level.
pub fn pack_windows(windows: &[GridWindow], max_levels: u32) -> Vec<GpuGridWindow> {
    let mut packed = vec![GpuGridWindow::default(); max_levels as usize];
    for window in windows {
        if let Some(entry) = packed.get_mut(window.level as usize) {
            *entry = GpuGridWindow {
                begin: window.begin.to_array(),
                size: window.size.to_array(),
            };
        }
    }
    packed
}

impl Default for GpuGridWindow {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// Publishes the occupancy mask and grid placement to multiplexed storage
/// buffers once per frame.
pub struct OccupancyPublisher {
    cells: MultiBuffer<u32>,
    windows: MultiBuffer<GpuGridWindow>,
    max_levels: u32,
}

impl OccupancyPublisher {
    pub fn new(device: &wgpu::Device, cell_count: usize, max_levels: u32, frames: u32) -> Self {
        Self {
            cells: MultiBuffer::new(device, "occupancy", frames, cell_count),
            windows: MultiBuffer::new(device, "grid-windows", frames, max_levels as usize),
            max_levels,
        }
    }

    /// Write this frame's table and windows and record their copies.
    pub fn publish(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        table: &OccupancyTable,
        windows: &[GridWindow],
    ) -> Result<(), UploadError> {
        self.cells.write(queue, table.as_slice())?;
        self.cells.enqueue_copy(encoder)?;
        self.windows
            .write(queue, &pack_windows(windows, self.max_levels))?;
        self.windows.enqueue_copy(encoder)?;
        Ok(())
    }

    pub fn advance(&mut self) {
        self.cells.advance();
        self.windows.advance();
    }

    /// Current frame's occupancy cells.
    pub fn cells_binding(&self) -> wgpu::BufferBinding<'_> {
        self.cells.binding()
    }

    /// Current frame's per-level grid windows.
    pub fn windows_binding(&self) -> wgpu::BufferBinding<'_> {
        self.windows.binding()
    }

    pub fn cells(&self) -> &MultiBuffer<u32> {
        &self.cells
    }

    pub fn windows(&self) -> &MultiBuffer<GpuGridWindow> {
        &self.windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{IVec2, UVec2};

    #[test]
    fn test_pack_windows_zero_fills_inactive_levels() {
        let grid = UVec2::new(6, 4);
        let windows = vec![
            GridWindow::new(0, IVec2::new(-3, -2), grid),
            GridWindow::new(1, IVec2::new(-6, -4), grid),
        ];
        let packed = pack_windows(&windows, 4);
        assert_eq!(packed.len(), 4);
        assert_eq!(packed[0].begin, [-3, -2]);
        assert_eq!(packed[1].begin, [-6, -4]);
        assert_eq!(packed[1].size, [6, 4]);
        assert_eq!(packed[2], GpuGridWindow::default());
        assert_eq!(packed[3].size, [0, 0]);
    }

    #[test]
    fn test_gpu_window_layout() {
        assert_eq!(std::mem::size_of::<GpuGridWindow>(), 16);
    }
}
