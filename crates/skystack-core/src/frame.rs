use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::{Array3, ArrayView2, Axis};

use crate::consts::CHANNEL_COUNT;
use crate::error::{Result, StackError};

/// One colour plane of a pixel array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; CHANNEL_COUNT] = [Channel::Red, Channel::Green, Channel::Blue];

    /// Plane index inside a `Frame`'s data array.
    pub fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Red => write!(f, "R"),
            Channel::Green => write!(f, "G"),
            Channel::Blue => write!(f, "B"),
        }
    }
}

/// A three-plane (R, G, B) floating-point image.
/// Samples are nominally in 0..=65535 but may leave that range during arithmetic.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Pixel data, shape = (channel, height, width)
    pub data: Array3<f32>,
    /// Bit depth of the source sample format (8, 16 or 32)
    pub original_bit_depth: u8,
}

impl Frame {
    /// Wrap a `(3, height, width)` array.
    pub fn new(data: Array3<f32>, bit_depth: u8) -> Self {
        debug_assert_eq!(data.dim().0, CHANNEL_COUNT);
        Self {
            data,
            original_bit_depth: bit_depth,
        }
    }

    pub fn width(&self) -> usize {
        self.data.dim().2
    }

    pub fn height(&self) -> usize {
        self.data.dim().1
    }

    /// Borrow a single plane as a `(height, width)` view.
    pub fn channel(&self, channel: Channel) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), channel.index())
    }

    /// Fail with `ShapeMismatch` unless this frame is `width` x `height`.
    pub fn ensure_dims(&self, width: usize, height: usize) -> Result<()> {
        if self.width() != width || self.height() != height {
            return Err(StackError::ShapeMismatch {
                expected_width: width,
                expected_height: height,
                found_width: self.width(),
                found_height: self.height(),
            });
        }
        Ok(())
    }
}

/// Integer translation of a frame onto the reference grid.
///
/// Destination pixel `(x, y)` receives source pixel `(x - dx, y - dy)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Offset {
    pub const ZERO: Offset = Offset { dx: 0, dy: 0 };

    pub fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.dx, self.dy)
    }
}

/// One candidate frame of a stacking run.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameEntry {
    pub path: PathBuf,
    /// Whether the frame takes part in the stack. Ignored for the reference.
    pub included: bool,
}

impl FrameEntry {
    pub fn new(path: impl Into<PathBuf>, included: bool) -> Self {
        Self {
            path: path.into(),
            included,
        }
    }
}

/// Ordered frame list with a distinguished reference frame.
#[derive(Clone, Debug)]
pub struct FrameSet {
    entries: Vec<FrameEntry>,
    reference: usize,
}

impl FrameSet {
    pub fn new(entries: Vec<FrameEntry>, reference: usize) -> Result<Self> {
        if entries.is_empty() {
            return Err(StackError::EmptyFrameSet);
        }
        if reference >= entries.len() {
            return Err(StackError::ReferenceOutOfRange {
                index: reference,
                total: entries.len(),
            });
        }
        Ok(Self { entries, reference })
    }

    /// Include a frame iff an offset record exists for it (the reference is always included).
    pub fn from_offsets(
        paths: &[PathBuf],
        reference: usize,
        offsets: &dyn crate::io::offsets::OffsetStore,
    ) -> Result<Self> {
        let entries = paths
            .iter()
            .enumerate()
            .map(|(i, path)| FrameEntry::new(path.clone(), i == reference || offsets.contains(path)))
            .collect();
        Self::new(entries, reference)
    }

    pub fn entries(&self) -> &[FrameEntry] {
        &self.entries
    }

    pub fn reference_index(&self) -> usize {
        self.reference
    }

    pub fn reference(&self) -> &FrameEntry {
        &self.entries[self.reference]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of frames that would contribute, the reference included.
    pub fn included_count(&self) -> usize {
        self.entries
            .iter()
            .enumerate()
            .filter(|(i, e)| *i == self.reference || e.included)
            .count()
    }
}

/// Role of a resolved stack input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameRole {
    Reference,
    Light,
}

/// A frame ready for accumulation: where to read it and how to place it.
#[derive(Clone, Debug)]
pub struct StackInput {
    pub path: PathBuf,
    pub offset: Offset,
    pub role: FrameRole,
}

impl StackInput {
    pub fn reference(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            offset: Offset::ZERO,
            role: FrameRole::Reference,
        }
    }

    pub fn light(path: &Path, offset: Offset) -> Self {
        Self {
            path: path.to_path_buf(),
            offset,
            role: FrameRole::Light,
        }
    }

    pub fn is_reference(&self) -> bool {
        self.role == FrameRole::Reference
    }
}
