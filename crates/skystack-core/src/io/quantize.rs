use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::consts::{CHANNEL_COUNT, INTENSITY_SCALE};
use crate::frame::Frame;

/// Rounding policy used when reducing float samples to 16-bit integers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dither {
    /// Round to nearest.
    #[default]
    None,
    /// Add a uniform `[0, 1)` draw before flooring, so that smooth gradients
    /// do not band. The seed makes the output reproducible.
    Stochastic { seed: u64 },
}

/// Interleaved RGB 16-bit samples, row-major.
#[derive(Clone, Debug)]
pub struct QuantizedImage {
    pub width: usize,
    pub height: usize,
    pub samples: Vec<u16>,
    /// Samples that were NaN or infinite and were written as 0.
    pub non_finite: usize,
}

/// Quantize a frame to interleaved RGB `u16`, clamping to 0..=65535.
pub fn quantize_u16(frame: &Frame, dither: Dither) -> QuantizedImage {
    let h = frame.height();
    let w = frame.width();
    let mut samples = Vec::with_capacity(h * w * CHANNEL_COUNT);
    let mut non_finite = 0usize;

    let mut rng = match dither {
        Dither::Stochastic { seed } => Some(StdRng::seed_from_u64(seed)),
        Dither::None => None,
    };

    for row in 0..h {
        for col in 0..w {
            for c in 0..CHANNEL_COUNT {
                let v = frame.data[[c, row, col]];
                if !v.is_finite() {
                    non_finite += 1;
                    samples.push(0);
                    continue;
                }
                let q = match rng.as_mut() {
                    Some(rng) => (v + rng.gen::<f32>()).floor(),
                    None => v.round(),
                };
                samples.push(q.clamp(0.0, INTENSITY_SCALE) as u16);
            }
        }
    }

    if non_finite > 0 {
        warn!(
            samples = non_finite,
            "Non-finite samples written as 0 in integer output"
        );
    }

    QuantizedImage {
        width: w,
        height: h,
        samples,
        non_finite,
    }
}
