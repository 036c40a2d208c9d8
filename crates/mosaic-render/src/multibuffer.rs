use std::marker::PhantomData;
use std::num::NonZeroU64;

use mosaic_core::math::align_up;

use crate::error::UploadError;

/// Rotating write offset over `frames` equally sized regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCursor {
    frame: u32,
    frames: u32,
    stride: u64,
}

impl FrameCursor {
    pub fn new(frames: u32, stride: u64) -> Self {
        assert!(frames > 0, "FrameCursor needs at least one frame");
        Self {
            frame: 0,
            frames,
            stride,
        }
    }

    /// Byte offset of the current frame's region.
    pub fn offset(&self) -> u64 {
        self.frame as u64 * self.stride
    }

    pub fn advance(&mut self) {
        self.frame = (self.frame + 1) % self.frames;
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Size of the backing allocation covering every region.
    pub fn total_size(&self) -> u64 {
        self.stride * self.frames as u64
    }
}

/// Where a multiplexed resource is within its per-frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Nothing written since the last advance.
    Open,
    /// Current region written, copy not yet recorded.
    Written,
    /// Copy to the device buffer recorded.
    Copied,
}

/// CPU-side state machine of a `MultiBuffer`: write, then copy, then advance.
#[derive(Debug, Clone)]
pub struct MultiplexState {
    cursor: FrameCursor,
    phase: CyclePhase,
    /// Usable bytes per region (the stride may be padded beyond this).
    capacity: u64,
}

impl MultiplexState {
    pub fn new(frames: u32, capacity: u64, alignment: u64) -> Self {
        let stride = align_up(capacity.max(1), alignment.max(wgpu::COPY_BUFFER_ALIGNMENT));
        Self {
            cursor: FrameCursor::new(frames, stride),
            phase: CyclePhase::Open,
            capacity,
        }
    }

    /// Validate a write of `len` bytes; returns the offset to write at.
    pub fn begin_write(&mut self, len: u64) -> Result<u64, UploadError> {
        if len > self.capacity {
            return Err(UploadError::PayloadTooLarge {
                size: len,
                capacity: self.capacity,
            });
        }
        self.phase = CyclePhase::Written;
        Ok(self.cursor.offset())
    }

    /// Validate a copy; returns the (offset, size) of the region to copy.
    pub fn begin_copy(&mut self) -> Result<(u64, u64), UploadError> {
        if self.phase != CyclePhase::Written {
            return Err(UploadError::CopyWithoutWrite);
        }
        self.phase = CyclePhase::Copied;
        Ok((self.cursor.offset(), self.cursor.stride()))
    }

    /// Move to the next region. Called once per submitted frame.
    pub fn advance(&mut self) {
        if self.phase == CyclePhase::Written {
            log::warn!("MultiBuffer advanced with a write that was never copied");
        }
        self.cursor.advance();
        self.phase = CyclePhase::Open;
    }

    pub fn cursor(&self) -> &FrameCursor {
        &self.cursor
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

/// A device buffer written by the CPU every frame and read by in-flight GPU
/// work, replicated once per frame in flight.
///
/// Each frame's data goes into its own region of a host-written staging
/// buffer and is copied to the same region of the device buffer, so writing
/// frame `k + 1` never touches the bytes frame `k` is still reading.
pub struct MultiBuffer<T: bytemuck::Pod> {
    buffer: wgpu::Buffer,
    staging: wgpu::Buffer,
    state: MultiplexState,
    elements: usize,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> MultiBuffer<T> {
    /// Allocate `frames` regions of `elements` values each. Regions are
    /// aligned for use as dynamic storage buffer bindings.
    pub fn new(device: &wgpu::Device, label: &str, frames: u32, elements: usize) -> Self {
        let capacity = (std::mem::size_of::<T>() * elements) as u64;
        let alignment = device.limits().min_storage_buffer_offset_alignment as u64;
        let state = MultiplexState::new(frames, capacity, alignment);
        let total = state.cursor().total_size();

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: total,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let staging_label = format!("{label}-staging");
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&staging_label),
            size: total,
            usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::info!(
            "MultiBuffer '{}': {} frames x {} bytes (stride {})",
            label,
            frames,
            capacity,
            state.cursor().stride()
        );

        Self {
            buffer,
            staging,
            state,
            elements,
            _marker: PhantomData,
        }
    }

    /// Write this frame's data into the current staging region.
    pub fn write(&mut self, queue: &wgpu::Queue, data: &[T]) -> Result<(), UploadError> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let offset = self.state.begin_write(bytes.len() as u64)?;
        if bytes.is_empty() {
            return Ok(());
        }
        let padded_len = align_up(bytes.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT) as usize;
        if padded_len == bytes.len() {
            queue.write_buffer(&self.staging, offset, bytes);
        } else {
            let mut padded = bytes.to_vec();
            padded.resize(padded_len, 0);
            queue.write_buffer(&self.staging, offset, &padded);
        }
        Ok(())
    }

    /// Record the staging → device copy for the region written this frame.
    pub fn enqueue_copy(&mut self, encoder: &mut wgpu::CommandEncoder) -> Result<(), UploadError> {
        let (offset, size) = self.state.begin_copy()?;
        encoder.copy_buffer_to_buffer(&self.staging, offset, &self.buffer, offset, size);
        Ok(())
    }

    pub fn advance(&mut self) {
        self.state.advance();
    }

    /// Binding of the current frame's region of the device buffer.
    pub fn binding(&self) -> wgpu::BufferBinding<'_> {
        wgpu::BufferBinding {
            buffer: &self.buffer,
            offset: self.state.cursor().offset(),
            size: NonZeroU64::new(self.state.capacity()),
        }
    }

    /// Offset of the current region, for dynamic-offset bind groups.
    pub fn offset(&self) -> u64 {
        self.state.cursor().offset()
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn elements(&self) -> usize {
        self.elements
    }

    pub fn state(&self) -> &MultiplexState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_periodicity() {
        let mut cursor = FrameCursor::new(3, 512);
        let start = cursor.offset();
        let mut offsets = Vec::new();
        for _ in 0..3 {
            cursor.advance();
            offsets.push(cursor.offset());
        }
        assert_eq!(offsets, vec![512, 1024, 0]);
        assert_eq!(cursor.offset(), start);
        assert_eq!(cursor.total_size(), 1536);
    }

    #[test]
    fn test_stride_is_aligned() {
        let state = MultiplexState::new(3, 4 * 24, 256);
        assert_eq!(state.cursor().stride(), 256);
        assert_eq!(state.capacity(), 96);

        let state = MultiplexState::new(2, 300, 256);
        assert_eq!(state.cursor().stride(), 512);
    }

    #[test]
    fn test_write_copy_advance_cycle() {
        let mut state = MultiplexState::new(3, 96, 256);
        assert_eq!(state.phase(), CyclePhase::Open);

        assert_eq!(state.begin_write(96).expect("write"), 0);
        assert_eq!(state.begin_copy().expect("copy"), (0, 256));
        state.advance();

        assert_eq!(state.begin_write(10).expect("write"), 256);
        assert_eq!(state.begin_copy().expect("copy"), (256, 256));
        state.advance();
        assert_eq!(state.cursor().offset(), 512);
    }

    #[test]
    fn test_copy_requires_write() {
        let mut state = MultiplexState::new(3, 96, 256);
        assert!(matches!(state.begin_copy(), Err(UploadError::CopyWithoutWrite)));

        state.begin_write(4).expect("write");
        state.begin_copy().expect("copy");
        // A second copy without a new write is also rejected.
        assert!(matches!(state.begin_copy(), Err(UploadError::CopyWithoutWrite)));

        // Advancing resets the cycle.
        state.advance();
        assert!(matches!(state.begin_copy(), Err(UploadError::CopyWithoutWrite)));
    }

    #[test]
    fn test_write_rejects_oversized_payload() {
        let mut state = MultiplexState::new(3, 96, 256);
        let err = state.begin_write(100).unwrap_err();
        assert!(matches!(
            err,
            UploadError::PayloadTooLarge {
                size: 100,
                capacity: 96
            }
        ));
        assert_eq!(state.phase(), CyclePhase::Open);
    }

    #[test]
    fn test_advance_without_write_returns_home() {
        let mut state = MultiplexState::new(3, 96, 256);
        state.begin_write(8).expect("write");
        state.begin_copy().expect("copy");
        let home = state.cursor().offset();
        for _ in 0..3 {
            state.advance();
        }
        assert_eq!(state.cursor().offset(), home);
    }
}
