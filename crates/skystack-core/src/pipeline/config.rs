use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_OFFSET_SUFFIX;
use crate::error::{Result, StackError};
use crate::io::quantize::Dither;
use crate::stack::sigma_clip::SigmaClipParams;

/// Seed used for dithered output when none is configured.
pub const DEFAULT_DITHER_SEED: u64 = 0x5eed;

/// A complete stacking job: which frames, how to clip, where to write.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StackJobConfig {
    pub frames: Vec<PathBuf>,
    /// Index of the reference frame in `frames`.
    #[serde(default)]
    pub reference: usize,
    /// Stack frames that have no offset record, at offset (0, 0).
    #[serde(default)]
    pub include_unaligned: bool,
    #[serde(default)]
    pub sigma_clip: SigmaClipParams,
    #[serde(default)]
    pub offsets: OffsetConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl StackJobConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frames.is_empty() {
            return Err(StackError::EmptyFrameSet);
        }
        if self.reference >= self.frames.len() {
            return Err(StackError::ReferenceOutOfRange {
                index: self.reference,
                total: self.frames.len(),
            });
        }
        if self.output.float.is_none() && self.output.integer.is_none() {
            return Err(StackError::InvalidConfig(
                "at least one output (float or integer) is required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OffsetConfig {
    /// Appended to a frame's file stem to name its offset record.
    pub suffix: String,
}

impl Default for OffsetConfig {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_OFFSET_SUFFIX.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Full-precision 32-bit float TIFF.
    pub float: Option<PathBuf>,
    /// 16-bit integer image (TIFF or PNG by extension).
    pub integer: Option<PathBuf>,
    /// Stochastic rounding for the integer output.
    #[serde(default = "default_dither")]
    pub dither: bool,
    #[serde(default)]
    pub dither_seed: Option<u64>,
}

fn default_dither() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            float: Some(PathBuf::from("stacked_f32.tiff")),
            integer: Some(PathBuf::from("stacked_16.tiff")),
            dither: default_dither(),
            dither_seed: None,
        }
    }
}

impl OutputConfig {
    pub fn dither_mode(&self) -> Dither {
        if self.dither {
            Dither::Stochastic {
                seed: self.dither_seed.unwrap_or(DEFAULT_DITHER_SEED),
            }
        } else {
            Dither::None
        }
    }
}
