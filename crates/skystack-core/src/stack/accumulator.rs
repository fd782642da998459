use ndarray::{Array3, Zip};

use crate::consts::{CHANNEL_COUNT, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{Result, StackError};
use crate::frame::{Channel, Frame, Offset};

use super::footprint::Footprint;
use super::median::median_of;

/// A pixel-channel cell of the accumulator grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    pub channel: Channel,
    pub x: usize,
    pub y: usize,
}

impl Location {
    pub fn new(channel: Channel, x: usize, y: usize) -> Self {
        Self { channel, x, y }
    }

    fn index(self) -> [usize; 3] {
        [self.channel.index(), self.y, self.x]
    }
}

/// Running per-pixel-channel statistics over an accruing set of frames.
///
/// Holds `sum`, `sum_of_squares` and a contribution `count` per cell so
/// mean and standard deviation can be computed without keeping frames.
/// `count == 0` implies both sums are zero.
#[derive(Clone, Debug)]
pub struct Accumulator {
    sum: Array3<f64>,
    sum_sq: Array3<f64>,
    count: Array3<u32>,
}

impl Accumulator {
    pub fn new(width: usize, height: usize) -> Self {
        let shape = (CHANNEL_COUNT, height, width);
        Self {
            sum: Array3::zeros(shape),
            sum_sq: Array3::zeros(shape),
            count: Array3::zeros(shape),
        }
    }

    pub fn width(&self) -> usize {
        self.count.dim().2
    }

    pub fn height(&self) -> usize {
        self.count.dim().1
    }

    /// Zero every cell.
    pub fn reset(&mut self) {
        self.sum.fill(0.0);
        self.sum_sq.fill(0.0);
        self.count.fill(0);
    }

    /// Add `frame`, translated by `offset`, to every cell it overlaps.
    /// Cells outside the translated footprint are left untouched.
    pub fn accumulate(&mut self, frame: &Frame, offset: Offset) {
        let fp = Footprint::new(
            frame.width(),
            frame.height(),
            self.width(),
            self.height(),
            offset,
        );
        if fp.is_empty() {
            return;
        }
        for c in 0..CHANNEL_COUNT {
            for row in fp.rows.clone() {
                for col in fp.cols.clone() {
                    let (src_row, src_col) = fp.source(row, col);
                    self.add_sample(c, row, col, frame.data[[c, src_row, src_col]] as f64);
                }
            }
        }
    }

    #[inline]
    pub(crate) fn add_sample(&mut self, channel: usize, row: usize, col: usize, value: f64) {
        let idx = [channel, row, col];
        self.sum[idx] += value;
        self.sum_sq[idx] += value * value;
        self.count[idx] += 1;
    }

    pub fn count_at(&self, loc: Location) -> u32 {
        self.count[loc.index()]
    }

    pub fn sum_at(&self, loc: Location) -> f64 {
        self.sum[loc.index()]
    }

    pub fn sum_sq_at(&self, loc: Location) -> f64 {
        self.sum_sq[loc.index()]
    }

    /// `sum / count` at `loc`; `AccumulatorEmpty` when nothing contributed.
    pub fn mean(&self, loc: Location) -> Result<f64> {
        let n = self.count_at(loc);
        if n == 0 {
            return Err(StackError::AccumulatorEmpty {
                channel: loc.channel,
                x: loc.x,
                y: loc.y,
            });
        }
        Ok(self.sum_at(loc) / n as f64)
    }

    /// Sample standard deviation from the running sums; needs two contributions.
    pub fn stddev(&self, loc: Location) -> Result<f64> {
        let n = self.count_at(loc);
        if n < 2 {
            return Err(StackError::StddevUndefined {
                channel: loc.channel,
                x: loc.x,
                y: loc.y,
                count: n,
            });
        }
        Ok(direct_stddev(self.sum_at(loc), self.sum_sq_at(loc), n))
    }

    /// Mean and standard deviation at a cell, or `None` below two contributions.
    #[inline]
    pub(crate) fn stats(&self, channel: usize, row: usize, col: usize) -> Option<(f64, f64)> {
        let idx = [channel, row, col];
        let n = self.count[idx];
        if n < 2 {
            return None;
        }
        let sum = self.sum[idx];
        Some((sum / n as f64, direct_stddev(sum, self.sum_sq[idx], n)))
    }

    /// Per-cell `sum / count`. Cells with no contribution come out as NaN.
    pub fn normalize(&self) -> Frame {
        let mut out = Array3::<f32>::zeros(self.sum.raw_dim());
        let divide = |o: &mut f32, &s: &f64, &n: &u32| *o = (s / n as f64) as f32;

        if self.width() * self.height() >= PARALLEL_PIXEL_THRESHOLD {
            Zip::from(&mut out)
                .and(&self.sum)
                .and(&self.count)
                .par_for_each(divide);
        } else {
            Zip::from(&mut out)
                .and(&self.sum)
                .and(&self.count)
                .for_each(divide);
        }

        Frame::new(out, 32)
    }

    /// Number of cells with no contribution.
    pub fn empty_cells(&self) -> usize {
        self.count.iter().filter(|&&n| n == 0).count()
    }

    /// Fail with `AccumulatorEmpty` at the first cell that has no contribution.
    pub fn ensure_covered(&self) -> Result<()> {
        match self.count.indexed_iter().find(|&(_, &n)| n == 0) {
            Some(((c, y, x), _)) => Err(StackError::AccumulatorEmpty {
                channel: Channel::ALL[c],
                x,
                y,
            }),
            None => Ok(()),
        }
    }

    /// Median contribution count over all cells.
    pub fn median_count(&self) -> Option<f32> {
        let mut counts: Vec<f32> = self.count.iter().map(|&n| n as f32).collect();
        median_of(&mut counts)
    }
}

/// `sqrt((Σx² - 2·mean·Σx + mean²·n) / (n - 1))`.
///
/// Single-pass form; small negative variances from cancellation read as zero.
fn direct_stddev(sum: f64, sum_sq: f64, n: u32) -> f64 {
    let n = n as f64;
    let mean = sum / n;
    let variance = (sum_sq - 2.0 * mean * sum + mean * mean * n) / (n - 1.0);
    variance.max(0.0).sqrt()
}
