pub mod error;
pub mod multibuffer;
pub mod occupancy;
pub mod tile_array;
pub mod uploader;

use mosaic_core::StreamConfig;
use mosaic_stream::FrameUpdate;

pub use error::UploadError;
pub use multibuffer::{CyclePhase, FrameCursor, MultiBuffer, MultiplexState};
pub use occupancy::{GpuGridWindow, OccupancyPublisher};
pub use tile_array::TileArray;
pub use uploader::{PendingWrite, StagingRing, TileUploader};

/// GPU side of tile streaming: the tile array, the staging ring that fills
/// it and the published occupancy.
///
/// Call `record` with each frame's update while building the frame's
/// encoder, then `end_frame` once that encoder has been submitted.
pub struct ResidencyRenderer {
    tiles: TileArray,
    uploader: TileUploader,
    occupancy: OccupancyPublisher,
    uploaded: u64,
}

impl ResidencyRenderer {
    pub fn new(device: &wgpu::Device, config: &StreamConfig) -> Result<Self, UploadError> {
        let tiles = TileArray::new(
            device,
            config.grid_size(),
            config.tile_size,
            config.max_levels,
        )?;
        let uploader = TileUploader::new(
            device,
            config.tile_size,
            config.staging_tiles_per_frame,
            config.frames_in_flight,
        );
        let occupancy = OccupancyPublisher::new(
            device,
            config.occupancy_len(),
            config.max_levels,
            config.frames_in_flight,
        );
        Ok(Self {
            tiles,
            uploader,
            occupancy,
            uploaded: 0,
        })
    }

    /// Stage this frame's tile, copy pending tiles into the array and publish
    /// the occupancy. Returns the number of tile copies recorded.
    pub fn record(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        update: &FrameUpdate,
    ) -> Result<usize, UploadError> {
        if let Some(upload) = &update.upload {
            self.uploader
                .stage_tile(queue, &upload.pixels, upload.slot, upload.tile.level)?;
        }
        let copies = self.uploader.flush_pending(encoder, self.tiles.texture());
        self.occupancy
            .publish(queue, encoder, &update.occupancy, &update.windows)?;
        self.uploaded += copies as u64;
        Ok(copies)
    }

    /// Move every per-frame resource to its next region.
    pub fn end_frame(&mut self) -> Result<(), UploadError> {
        self.uploader.rotate()?;
        self.occupancy.advance();
        Ok(())
    }

    pub fn tiles(&self) -> &TileArray {
        &self.tiles
    }

    pub fn uploader(&self) -> &TileUploader {
        &self.uploader
    }

    pub fn occupancy(&self) -> &OccupancyPublisher {
        &self.occupancy
    }

    /// Tile copies recorded since creation.
    pub fn uploaded(&self) -> u64 {
        self.uploaded
    }
}
