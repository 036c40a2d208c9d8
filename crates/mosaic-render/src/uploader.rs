use glam::UVec2;
use mosaic_core::constants::{BYTES_PER_PIXEL, COPY_ROW_ALIGNMENT};
use mosaic_core::math::align_up;
use mosaic_stream::TilePixels;

use crate::error::UploadError;

/// One staged tile waiting for its buffer → texture copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    /// Absolute offset into the staging buffer.
    pub staging_offset: u64,
    pub size: u64,
    /// Destination array layer (the tile's level).
    pub layer: u32,
    /// Destination texel origin inside the layer.
    pub origin: UVec2,
    pub extent: UVec2,
    pub bytes_per_row: u32,
}

/// Bookkeeping for a staging buffer split into `frames` regions.
///
/// Writes for the current frame are packed into the current region; the
/// region is reused only after `frames` rotations, by which time the GPU
/// copies that read it have completed.
#[derive(Debug, Clone)]
pub struct StagingRing {
    frames: u32,
    region_size: u64,
    frame: u32,
    /// Bytes used in the current region.
    cursor: u64,
    pending: Vec<PendingWrite>,
}

impl StagingRing {
    pub fn new(frames: u32, region_size: u64) -> Self {
        assert!(frames > 0, "StagingRing needs at least one region");
        Self {
            frames,
            region_size,
            frame: 0,
            cursor: 0,
            pending: Vec::new(),
        }
    }

    /// Reserve `size` bytes in the current region and record the copy they
    /// feed. Fails if the region cannot hold them.
    pub fn reserve(
        &mut self,
        size: u64,
        layer: u32,
        origin: UVec2,
        extent: UVec2,
        bytes_per_row: u32,
    ) -> Result<u64, UploadError> {
        let start = align_up(self.cursor, COPY_ROW_ALIGNMENT as u64);
        let end = start + size;
        if end > self.region_size {
            return Err(UploadError::StagingOverflow {
                requested: end,
                capacity: self.region_size,
            });
        }
        let staging_offset = self.region_offset() + start;
        self.cursor = end;
        self.pending.push(PendingWrite {
            staging_offset,
            size,
            layer,
            origin,
            extent,
            bytes_per_row,
        });
        Ok(staging_offset)
    }

    /// Hand over the pending writes, leaving the list empty.
    pub fn take_pending(&mut self) -> Vec<PendingWrite> {
        std::mem::take(&mut self.pending)
    }

    /// Move to the next region. Pending writes must have been flushed.
    pub fn rotate(&mut self) -> Result<(), UploadError> {
        if !self.pending.is_empty() {
            return Err(UploadError::UnflushedWrites(self.pending.len()));
        }
        self.frame = (self.frame + 1) % self.frames;
        self.cursor = 0;
        Ok(())
    }

    /// Absolute offset of the current region.
    pub fn region_offset(&self) -> u64 {
        self.frame as u64 * self.region_size
    }

    pub fn used_bytes(&self) -> u64 {
        self.cursor
    }

    pub fn pending(&self) -> &[PendingWrite] {
        &self.pending
    }

    pub fn region_size(&self) -> u64 {
        self.region_size
    }

    pub fn total_size(&self) -> u64 {
        self.region_size * self.frames as u64
    }
}

/// Stages tile pixels into a host-written buffer and records their copy into
/// the tile array.
///
/// Per frame: `stage_tile` (any number of times, up to the region size),
/// then `flush_pending` into the frame's encoder, then `rotate` once the
/// frame has been submitted.
pub struct TileUploader {
    staging: wgpu::Buffer,
    ring: StagingRing,
    tile_size: u32,
}

impl TileUploader {
    pub fn new(device: &wgpu::Device, tile_size: u32, tiles_per_frame: u32, frames: u32) -> Self {
        let tile_bytes = tile_size as u64 * tile_size as u64 * BYTES_PER_PIXEL as u64;
        let region_size = align_up(tile_bytes, COPY_ROW_ALIGNMENT as u64) * tiles_per_frame as u64;
        let ring = StagingRing::new(frames, region_size);

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tile-staging"),
            size: ring.total_size(),
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        log::info!(
            "TileUploader: {} regions x {} KB ({} tiles of {}px each)",
            frames,
            region_size / 1024,
            tiles_per_frame,
            tile_size
        );

        Self {
            staging,
            ring,
            tile_size,
        }
    }

    /// Copy one tile into the current staging region and queue its copy to
    /// `slot` of array layer `level`.
    pub fn stage_tile(
        &mut self,
        queue: &wgpu::Queue,
        pixels: &TilePixels,
        slot: UVec2,
        level: u32,
    ) -> Result<(), UploadError> {
        check_tile_shape(pixels, self.tile_size)?;
        let offset = self.ring.reserve(
            pixels.byte_len() as u64,
            level,
            slot * self.tile_size,
            UVec2::splat(self.tile_size),
            pixels.row_bytes() as u32,
        )?;
        queue.write_buffer(&self.staging, offset, &pixels.data);
        Ok(())
    }

    /// Record one buffer → texture copy per pending write and clear the list.
    /// Returns the number of copies recorded.
    pub fn flush_pending(&mut self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::Texture) -> usize {
        let pending = self.ring.take_pending();
        for write in &pending {
            encoder.copy_buffer_to_texture(
                wgpu::TexelCopyBufferInfo {
                    buffer: &self.staging,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: write.staging_offset,
                        bytes_per_row: Some(write.bytes_per_row),
                        rows_per_image: Some(write.extent.y),
                    },
                },
                wgpu::TexelCopyTextureInfo {
                    texture: target,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: write.origin.x,
                        y: write.origin.y,
                        z: write.layer,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::Extent3d {
                    width: write.extent.x,
                    height: write.extent.y,
                    depth_or_array_layers: 1,
                },
            );
        }
        pending.len()
    }

    /// Advance to the next staging region. Call once per submitted frame,
    /// after `flush_pending`.
    pub fn rotate(&mut self) -> Result<(), UploadError> {
        self.ring.rotate()
    }

    pub fn ring(&self) -> &StagingRing {
        &self.ring
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }
}

/// Reject tiles whose extent or pixel size differs from the array's.
pub fn check_tile_shape(pixels: &TilePixels, tile_size: u32) -> Result<(), UploadError> {
    let expected_len = tile_size as usize * tile_size as usize * BYTES_PER_PIXEL as usize;
    if pixels.width != tile_size
        || pixels.height != tile_size
        || pixels.bytes_per_pixel != BYTES_PER_PIXEL
        || pixels.data.len() != expected_len
    {
        return Err(UploadError::TileSizeMismatch {
            expected: tile_size,
            width: pixels.width,
            height: pixels.height,
            bytes_per_pixel: pixels.bytes_per_pixel,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: u32 = 64;
    const TILE_BYTES: u64 = (TILE * TILE * 4) as u64;

    fn reserve_tile(ring: &mut StagingRing, slot: UVec2, level: u32) -> Result<u64, UploadError> {
        ring.reserve(TILE_BYTES, level, slot * TILE, UVec2::splat(TILE), TILE * 4)
    }

    #[test]
    fn test_reserve_records_destination() {
        let mut ring = StagingRing::new(3, TILE_BYTES);
        let offset = reserve_tile(&mut ring, UVec2::new(2, 1), 3).expect("reserve");
        assert_eq!(offset, 0);
        let pending = ring.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].layer, 3);
        assert_eq!(pending[0].origin, UVec2::new(128, 64));
        assert_eq!(pending[0].extent, UVec2::new(64, 64));
        assert_eq!(pending[0].bytes_per_row, 256);
        assert_eq!(ring.used_bytes(), TILE_BYTES);
    }

    #[test]
    fn test_overflow_is_error() {
        let mut ring = StagingRing::new(3, TILE_BYTES);
        reserve_tile(&mut ring, UVec2::ZERO, 0).expect("first tile fits");
        let err = reserve_tile(&mut ring, UVec2::new(1, 0), 0).unwrap_err();
        assert!(matches!(
            err,
            UploadError::StagingOverflow {
                requested,
                capacity
            } if requested == 2 * TILE_BYTES && capacity == TILE_BYTES
        ));
        assert_eq!(ring.pending().len(), 1);
    }

    #[test]
    fn test_rotate_requires_flush() {
        let mut ring = StagingRing::new(3, TILE_BYTES);
        reserve_tile(&mut ring, UVec2::ZERO, 0).expect("reserve");
        assert!(matches!(ring.rotate(), Err(UploadError::UnflushedWrites(1))));

        let flushed = ring.take_pending();
        assert_eq!(flushed.len(), 1);
        assert!(ring.pending().is_empty());
        ring.rotate().expect("rotate after flush");
        assert_eq!(ring.used_bytes(), 0);
    }

    #[test]
    fn test_regions_rotate_and_wrap() {
        let mut ring = StagingRing::new(3, TILE_BYTES);
        let mut offsets = Vec::new();
        for _ in 0..4 {
            offsets.push(reserve_tile(&mut ring, UVec2::ZERO, 0).expect("reserve"));
            ring.take_pending();
            ring.rotate().expect("rotate");
        }
        assert_eq!(offsets, vec![0, TILE_BYTES, 2 * TILE_BYTES, 0]);
    }

    #[test]
    fn test_reservations_are_row_aligned() {
        let mut ring = StagingRing::new(2, 4096);
        let a = ring
            .reserve(100, 0, UVec2::ZERO, UVec2::new(5, 5), 20)
            .expect("reserve");
        let b = ring
            .reserve(100, 0, UVec2::ZERO, UVec2::new(5, 5), 20)
            .expect("reserve");
        assert_eq!(a, 0);
        assert_eq!(b, 256);
        ring.take_pending();
        ring.rotate().expect("rotate");
        let c = ring
            .reserve(100, 0, UVec2::ZERO, UVec2::new(5, 5), 20)
            .expect("reserve");
        assert_eq!(c, 4096);
    }

    #[test]
    fn test_duplicate_slot_writes_both_recorded() {
        let mut ring = StagingRing::new(3, 2 * TILE_BYTES);
        let slot = UVec2::new(4, 2);
        reserve_tile(&mut ring, slot, 1).expect("first");
        reserve_tile(&mut ring, slot, 1).expect("second");
        let pending = ring.take_pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].origin, pending[1].origin);
        assert_eq!(pending[0].layer, pending[1].layer);
        // Later write comes later in the copy order, so it wins.
        assert!(pending[1].staging_offset > pending[0].staging_offset);
    }

    #[test]
    fn test_check_tile_shape() {
        assert!(check_tile_shape(&TilePixels::solid(TILE, TILE, [1, 2, 3, 4]), TILE).is_ok());
        let err = check_tile_shape(&TilePixels::solid(32, 32, [0; 4]), TILE).unwrap_err();
        assert!(matches!(
            err,
            UploadError::TileSizeMismatch {
                expected: 64,
                width: 32,
                ..
            }
        ));
    }
}
