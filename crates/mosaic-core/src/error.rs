use thiserror::Error;

/// Errors raised while loading or validating a `StreamConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse stream config RON: {0}")]
    ParseError(String),

    #[error("grid size must be non-zero on both axes (got {0}x{1})")]
    EmptyGrid(u32, u32),

    #[error("max_levels must be in 1..={max} (got {actual})")]
    LevelCount { max: u32, actual: u32 },

    #[error("tile_size {0} gives a row pitch that is not a multiple of 256 bytes")]
    UnalignedTileRow(u32),

    #[error("{0} must be non-zero")]
    Zero(&'static str),
}
