use std::path::PathBuf;

use thiserror::Error;

use crate::frame::Channel;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("TIFF error: {0}")]
    TiffError(#[from] tiff::TiffError),

    #[error("Accumulator is empty at {channel} ({x}, {y})")]
    AccumulatorEmpty { channel: Channel, x: usize, y: usize },

    #[error("Standard deviation undefined at {channel} ({x}, {y}): {count} contribution(s)")]
    StddevUndefined {
        channel: Channel,
        x: usize,
        y: usize,
        count: u32,
    },

    #[error("No offset record for {}", .0.display())]
    OffsetNotFound(PathBuf),

    #[error("Invalid offset record {}: {reason}", path.display())]
    InvalidOffsetRecord { path: PathBuf, reason: String },

    #[error("Invalid sigma-clip parameter line: {0}")]
    InvalidSigmaClipLine(String),

    #[error("Frame dimensions {found_width}x{found_height} differ from reference {expected_width}x{expected_height}")]
    ShapeMismatch {
        expected_width: usize,
        expected_height: usize,
        found_width: usize,
        found_height: usize,
    },

    #[error("Reference frame {} could not be loaded: {source}", path.display())]
    ReferenceLoad {
        path: PathBuf,
        #[source]
        source: Box<StackError>,
    },

    #[error("Empty frame set")]
    EmptyFrameSet,

    #[error("Reference index {index} out of range (total: {total})")]
    ReferenceOutOfRange { index: usize, total: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, StackError>;
