use thiserror::Error;

/// Errors raised while staging or publishing GPU data.
#[derive(Debug, Error)]
pub enum UploadError {
    /// More bytes staged this frame than one staging region holds. The staging
    /// ring is undersized for the per-frame tile volume; not recoverable.
    #[error("staging region overflow: {requested} bytes needed, region holds {capacity}")]
    StagingOverflow { requested: u64, capacity: u64 },

    #[error("tile is {width}x{height} at {bytes_per_pixel} B/px, array expects {expected}x{expected} at 4 B/px")]
    TileSizeMismatch {
        expected: u32,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    },

    #[error("{0} staged writes were not flushed before rotating the staging ring")]
    UnflushedWrites(usize),

    #[error("copy enqueued before any write in this frame")]
    CopyWithoutWrite,

    #[error("payload of {size} bytes exceeds per-frame capacity of {capacity} bytes")]
    PayloadTooLarge { size: u64, capacity: u64 },

    #[error("tile array {width}x{height}x{layers} exceeds device limits ({max_dimension} px, {max_layers} layers)")]
    TextureTooLarge {
        width: u32,
        height: u32,
        layers: u32,
        max_dimension: u32,
        max_layers: u32,
    },
}
