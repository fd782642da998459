use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::consts::{
    CHANNEL_COUNT, DEFAULT_CLIP_ITERATIONS, DEFAULT_SIGMA_TENTHS, SIGMA_CLIP_LINE_FIELDS,
    SIGMA_TENTHS_PER_UNIT,
};
use crate::error::{Result, StackError};
use crate::frame::{Channel, StackInput};
use crate::io::image_io::FrameStore;
use crate::pipeline::{ProgressReporter, StackStage, StopFlag};

use super::accumulator::Accumulator;
use super::footprint::Footprint;
use super::median::channel_medians;

/// Which value a sky-level-adjusted sample contributes to the new sums.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkyAdjustment {
    /// The adjusted value decides rejection; the raw value is accumulated.
    #[default]
    RejectionOnly,
    /// The adjusted value decides rejection and is accumulated.
    RejectionAndAccumulation,
}

impl std::fmt::Display for SkyAdjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkyAdjustment::RejectionOnly => write!(f, "rejection only"),
            SkyAdjustment::RejectionAndAccumulation => write!(f, "rejection and accumulation"),
        }
    }
}

/// Parameters for iterative sigma-clipped stacking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SigmaClipParams {
    /// Number of rejection passes after the initial accumulation.
    pub iterations: usize,
    /// Per-channel threshold in tenths of sigma (R, G, B); `<= 0` disables
    /// clipping for that channel.
    pub sigma_tenths: [i32; CHANNEL_COUNT],
    /// Compare samples after shifting each frame's median onto the stack's.
    #[serde(default)]
    pub sky_level: bool,
    /// Never reject the reference frame on the final pass.
    #[serde(default)]
    pub comet_mode: bool,
    #[serde(default)]
    pub sky_adjustment: SkyAdjustment,
}

impl Default for SigmaClipParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_CLIP_ITERATIONS,
            sigma_tenths: [DEFAULT_SIGMA_TENTHS; CHANNEL_COUNT],
            sky_level: false,
            comet_mode: false,
            sky_adjustment: SkyAdjustment::default(),
        }
    }
}

impl SigmaClipParams {
    /// Rejection multiplier for a channel, `None` when clipping is disabled.
    pub fn threshold(&self, channel: Channel) -> Option<f64> {
        let tenths = self.sigma_tenths[channel.index()];
        (tenths > 0).then(|| tenths as f64 / SIGMA_TENTHS_PER_UNIT)
    }

    /// `iterations sigma-R sigma-G sigma-B sky-level comet`, flags as 0/1.
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {} {}",
            self.iterations,
            self.sigma_tenths[0],
            self.sigma_tenths[1],
            self.sigma_tenths[2],
            self.sky_level as u8,
            self.comet_mode as u8
        )
    }
}

impl FromStr for SigmaClipParams {
    type Err = StackError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: String| StackError::InvalidSigmaClipLine(reason);

        let values = s
            .split_whitespace()
            .map(|t| {
                t.parse::<i64>()
                    .map_err(|e| invalid(format!("{t:?}: {e}")))
            })
            .collect::<Result<Vec<i64>>>()?;
        if values.len() != SIGMA_CLIP_LINE_FIELDS {
            return Err(invalid(format!(
                "expected {SIGMA_CLIP_LINE_FIELDS} integers, found {}",
                values.len()
            )));
        }

        let iterations = usize::try_from(values[0])
            .map_err(|_| invalid(format!("negative iteration count {}", values[0])))?;
        let mut sigma_tenths = [0i32; CHANNEL_COUNT];
        for (slot, &v) in sigma_tenths.iter_mut().zip(&values[1..4]) {
            *slot = i32::try_from(v).map_err(|_| invalid(format!("sigma {v} out of range")))?;
        }
        let flag = |v: i64, name: &str| match v {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(invalid(format!("{name} flag must be 0 or 1, found {v}"))),
        };

        Ok(Self {
            iterations,
            sigma_tenths,
            sky_level: flag(values[4], "sky-level")?,
            comet_mode: flag(values[5], "comet")?,
            sky_adjustment: SkyAdjustment::default(),
        })
    }
}

/// Progress of a sigma-clip run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClipState {
    /// Only the unconditional accumulation has been done.
    Pass0Done,
    /// `completed` rejection passes are done and more are planned.
    Iterating { completed: usize },
    /// All planned passes are done; the current accumulator is final.
    Converged,
}

/// Outcome of one rejection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    pub pass: usize,
    pub frames_used: usize,
    pub frames_skipped: usize,
    /// Accepted pixel-channel contributions.
    pub accepted: u64,
    /// Rejected pixel-channel contributions per channel.
    pub rejected: [u64; CHANNEL_COUNT],
}

impl PassReport {
    pub fn total_rejected(&self) -> u64 {
        self.rejected.iter().sum()
    }
}

/// Iterative sigma-clipping over a double-buffered accumulator.
///
/// Pass `k` reads statistics from buffer `(k - 1) % 2` and writes its result
/// into buffer `k % 2`. Frames are re-read from the store on every pass.
pub struct SigmaClipper<'a> {
    params: &'a SigmaClipParams,
    buffers: [Accumulator; 2],
    passes_done: usize,
    passes_planned: usize,
}

impl<'a> SigmaClipper<'a> {
    /// Start from the unconditional accumulation of `contributing_frames`.
    ///
    /// With fewer than two frames no standard deviation exists, so no pass
    /// is planned regardless of `params.iterations`.
    pub fn new(initial: Accumulator, params: &'a SigmaClipParams, contributing_frames: usize) -> Self {
        let passes_planned = if contributing_frames < 2 {
            if params.iterations > 0 {
                info!(
                    frames = contributing_frames,
                    "Sigma clipping skipped: needs at least two frames"
                );
            }
            0
        } else {
            params.iterations
        };
        let scratch = Accumulator::new(initial.width(), initial.height());
        Self {
            params,
            buffers: [initial, scratch],
            passes_done: 0,
            passes_planned,
        }
    }

    pub fn state(&self) -> ClipState {
        if self.passes_done >= self.passes_planned {
            ClipState::Converged
        } else if self.passes_done == 0 {
            ClipState::Pass0Done
        } else {
            ClipState::Iterating {
                completed: self.passes_done,
            }
        }
    }

    pub fn passes_done(&self) -> usize {
        self.passes_done
    }

    pub fn passes_planned(&self) -> usize {
        self.passes_planned
    }

    /// Accumulator produced by the most recent pass.
    pub fn current(&self) -> &Accumulator {
        &self.buffers[self.passes_done % 2]
    }

    pub fn into_result(self) -> Accumulator {
        let [even, odd] = self.buffers;
        if self.passes_done % 2 == 0 {
            even
        } else {
            odd
        }
    }

    /// Run passes until converged or until `stop` is requested between passes.
    pub fn run(
        &mut self,
        inputs: &[StackInput],
        store: &dyn FrameStore,
        reporter: &dyn ProgressReporter,
        stop: &StopFlag,
    ) -> Result<Vec<PassReport>> {
        let mut reports = Vec::with_capacity(self.passes_planned);
        while self.state() != ClipState::Converged {
            if stop.is_requested() {
                info!(
                    completed = self.passes_done,
                    planned = self.passes_planned,
                    "Stop requested; keeping last completed pass"
                );
                break;
            }
            if let Some(report) = self.run_pass(inputs, store, reporter)? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Run the next rejection pass. Returns `None` once converged.
    ///
    /// A light frame that fails to load or has the wrong shape is skipped for
    /// this pass; a reference frame failure aborts with `ReferenceLoad`.
    pub fn run_pass(
        &mut self,
        inputs: &[StackInput],
        store: &dyn FrameStore,
        reporter: &dyn ProgressReporter,
    ) -> Result<Option<PassReport>> {
        if self.state() == ClipState::Converged {
            return Ok(None);
        }

        let pass = self.passes_done + 1;
        let is_final = pass == self.passes_planned;
        let params = self.params;

        let [even, odd] = &mut self.buffers;
        let (previous, next) = if pass % 2 == 1 {
            (&*even, odd)
        } else {
            (&*odd, even)
        };
        let (width, height) = (previous.width(), previous.height());

        let global_medians = if params.sky_level {
            channel_medians(&previous.normalize())
        } else {
            [None; CHANNEL_COUNT]
        };
        let thresholds = Channel::ALL.map(|c| params.threshold(c));

        next.reset();
        reporter.begin_stage(
            StackStage::Clipping {
                pass,
                of: self.passes_planned,
            },
            Some(inputs.len()),
        );

        let mut report = PassReport {
            pass,
            ..Default::default()
        };

        for (i, input) in inputs.iter().enumerate() {
            let loaded = store
                .load(&input.path)
                .and_then(|f| f.ensure_dims(width, height).map(|_| f));
            let frame = match loaded {
                Ok(frame) => frame,
                Err(e) if input.is_reference() => {
                    return Err(StackError::ReferenceLoad {
                        path: input.path.clone(),
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!(
                        frame = %input.path.display(),
                        pass,
                        error = %e,
                        "Skipping frame for this pass"
                    );
                    report.frames_skipped += 1;
                    reporter.advance(i + 1);
                    continue;
                }
            };

            let exempt = params.comet_mode && is_final && input.is_reference();
            let sky_shift = if params.sky_level {
                let frame_medians = channel_medians(&frame);
                Channel::ALL.map(|c| match (global_medians[c.index()], frame_medians[c.index()]) {
                    (Some(global), Some(own)) => global as f64 - own as f64,
                    _ => 0.0,
                })
            } else {
                [0.0; CHANNEL_COUNT]
            };

            let fp = Footprint::new(frame.width(), frame.height(), width, height, input.offset);
            for c in 0..CHANNEL_COUNT {
                let threshold = if exempt { None } else { thresholds[c] };
                for row in fp.rows.clone() {
                    for col in fp.cols.clone() {
                        let (src_row, src_col) = fp.source(row, col);
                        let raw = frame.data[[c, src_row, src_col]] as f64;
                        let adjusted = raw + sky_shift[c];

                        let rejected = match (threshold, previous.stats(c, row, col)) {
                            (Some(t), Some((mean, sigma))) => t * sigma < (mean - adjusted).abs(),
                            _ => false,
                        };
                        if rejected {
                            report.rejected[c] += 1;
                            continue;
                        }

                        let value = match params.sky_adjustment {
                            SkyAdjustment::RejectionOnly => raw,
                            SkyAdjustment::RejectionAndAccumulation => adjusted,
                        };
                        next.add_sample(c, row, col, value);
                        report.accepted += 1;
                    }
                }
            }

            report.frames_used += 1;
            reporter.advance(i + 1);
        }

        reporter.finish_stage();
        self.passes_done = pass;

        info!(
            pass,
            of = self.passes_planned,
            frames = report.frames_used,
            skipped = report.frames_skipped,
            rejected_r = report.rejected[0],
            rejected_g = report.rejected[1],
            rejected_b = report.rejected[2],
            "Sigma-clip pass complete"
        );
        Ok(Some(report))
    }
}
