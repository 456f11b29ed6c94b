use std::path::PathBuf;
use thiserror::Error;

/// Failure while decoding or partitioning an atlas image.
#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("failed to load atlas image {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid atlas grid {columns}x{rows}")]
    InvalidGrid { columns: u32, rows: u32 },

    #[error("pixel buffer holds {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Failure reported by the toggle host for a public operation.
#[derive(Debug, Error)]
pub enum ToggleError {
    #[error("invalid or stale toggle handle")]
    InvalidHandle,

    #[error("toggle needs a parent surface")]
    InvalidParent,

    #[error("toggle control class is not registered")]
    NotRegistered,

    #[error("toggle atlases are unavailable: {0}")]
    AtlasUnavailable(String),

    #[error("platform failed to create a surface for the toggle")]
    SurfaceCreation,
}
