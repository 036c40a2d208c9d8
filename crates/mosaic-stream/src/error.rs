use mosaic_core::ConfigError;
use thiserror::Error;

/// Raw tile bytes that do not match the layout the store advertised.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("raw tile size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("unsupported channel width of {0} bytes")]
    UnsupportedChannelBytes(u32),

    #[error("tile format has zero channels")]
    NoChannels,

    #[error("tile is {width}x{height} at {bytes_per_pixel} B/px, array expects {expected}x{expected} RGBA8")]
    ShapeMismatch {
        expected: u32,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    },
}

/// Errors creating or running a `TileStreamer`.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid stream config: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn fetch worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}
