use tracing::{debug, info, warn};

use crate::consts::CHANNEL_COUNT;
use crate::error::{Result, StackError};
use crate::frame::{Frame, FrameSet, Offset, StackInput};
use crate::io::image_io::FrameStore;
use crate::io::offsets::OffsetStore;
use crate::pipeline::{NoOpReporter, ProgressReporter, StackStage, StopFlag};

use super::accumulator::Accumulator;
use super::sigma_clip::{PassReport, SigmaClipParams, SigmaClipper};

/// What a stacking run did, for the final user-facing summary.
#[derive(Clone, Debug, Default)]
pub struct StackSummary {
    /// Frames that contributed to the initial accumulation, reference included.
    pub frames_stacked: usize,
    /// Included frames dropped before stacking (load failure, shape mismatch,
    /// unreadable offset record).
    pub frames_skipped: usize,
    pub passes_requested: usize,
    pub passes_run: usize,
    /// Stopped on request before all planned passes ran.
    pub stopped_early: bool,
    /// Median per-pixel contribution count, present when clipping ran.
    pub median_contributions: Option<f32>,
    /// Pixel-channel cells with no contribution; NaN in the result.
    pub empty_cells: usize,
    /// Rejections per channel in the last pass that ran.
    pub rejected: [u64; CHANNEL_COUNT],
    pub passes: Vec<PassReport>,
}

/// Normalized stack and its summary.
#[derive(Clone, Debug)]
pub struct StackOutcome {
    pub image: Frame,
    pub summary: StackSummary,
}

/// Stack a frame set with iterative sigma clipping.
pub fn stack(
    frame_set: &FrameSet,
    params: &SigmaClipParams,
    offsets: &dyn OffsetStore,
    store: &dyn FrameStore,
) -> Result<StackOutcome> {
    stack_reported(
        frame_set,
        params,
        offsets,
        store,
        &NoOpReporter,
        &StopFlag::new(),
    )
}

/// Stack a frame set, reporting progress and honouring a stop request
/// between sigma-clip passes.
pub fn stack_reported(
    frame_set: &FrameSet,
    params: &SigmaClipParams,
    offsets: &dyn OffsetStore,
    store: &dyn FrameStore,
    reporter: &dyn ProgressReporter,
    stop: &StopFlag,
) -> Result<StackOutcome> {
    let (candidates, offset_failures) = resolve_inputs(frame_set, offsets);
    let reference = &candidates[0];

    reporter.begin_stage(StackStage::Loading, None);
    let reference_frame = store
        .load(&reference.path)
        .map_err(|e| StackError::ReferenceLoad {
            path: reference.path.clone(),
            source: Box::new(e),
        })?;
    reporter.finish_stage();

    let (width, height) = (reference_frame.width(), reference_frame.height());
    info!(
        reference = %reference.path.display(),
        width,
        height,
        frames = candidates.len(),
        "Stacking"
    );

    reporter.begin_stage(StackStage::Accumulating, Some(candidates.len()));
    let mut accumulator = Accumulator::new(width, height);
    accumulator.accumulate(&reference_frame, Offset::ZERO);
    drop(reference_frame);
    reporter.advance(1);

    let mut inputs = vec![reference.clone()];
    let mut load_failures = 0usize;
    for (i, input) in candidates.iter().enumerate().skip(1) {
        let loaded = store
            .load(&input.path)
            .and_then(|f| f.ensure_dims(width, height).map(|_| f));
        match loaded {
            Ok(frame) => {
                accumulator.accumulate(&frame, input.offset);
                debug!(frame = %input.path.display(), offset = %input.offset, "Accumulated");
                inputs.push(input.clone());
            }
            Err(e) => {
                warn!(frame = %input.path.display(), error = %e, "Skipping frame");
                load_failures += 1;
            }
        }
        reporter.advance(i + 1);
    }
    reporter.finish_stage();
    info!(frames = inputs.len(), skipped = load_failures, "Initial accumulation complete");

    let mut clipper = SigmaClipper::new(accumulator, params, inputs.len());
    let passes = clipper.run(&inputs, store, reporter, stop)?;
    let passes_run = clipper.passes_done();
    let stopped_early = passes_run < clipper.passes_planned();
    let result = clipper.into_result();

    reporter.begin_stage(StackStage::Normalizing, None);
    let image = result.normalize();
    reporter.finish_stage();

    let empty_cells = result.empty_cells();
    if let Err(first) = result.ensure_covered() {
        warn!(
            cells = empty_cells,
            first = %first,
            "Every contribution was rejected at some pixels; they are NaN in the result"
        );
    }

    let summary = StackSummary {
        frames_stacked: inputs.len(),
        frames_skipped: load_failures + offset_failures,
        passes_requested: params.iterations,
        passes_run,
        stopped_early,
        median_contributions: if passes_run > 0 {
            result.median_count()
        } else {
            None
        },
        empty_cells,
        rejected: passes.last().map(|p| p.rejected).unwrap_or_default(),
        passes,
    };
    info!(
        frames = summary.frames_stacked,
        passes = summary.passes_run,
        median_contributions = ?summary.median_contributions,
        "Stack complete"
    );

    Ok(StackOutcome { image, summary })
}

/// Turn a frame set into stack inputs, reference first.
///
/// An included frame without an offset record is placed at (0, 0) with a
/// warning. A frame whose record cannot be read is dropped; the second
/// return value counts those.
pub fn resolve_inputs(frame_set: &FrameSet, offsets: &dyn OffsetStore) -> (Vec<StackInput>, usize) {
    let reference_index = frame_set.reference_index();
    let mut inputs = vec![StackInput::reference(&frame_set.reference().path)];
    let mut failures = 0usize;

    for (i, entry) in frame_set.entries().iter().enumerate() {
        if i == reference_index || !entry.included {
            continue;
        }
        match offsets.load(&entry.path) {
            Ok(offset) => inputs.push(StackInput::light(&entry.path, offset)),
            Err(StackError::OffsetNotFound(_)) => {
                warn!(
                    frame = %entry.path.display(),
                    "No offset record; frame was probably never aligned, using (0, 0)"
                );
                inputs.push(StackInput::light(&entry.path, Offset::ZERO));
            }
            Err(e) => {
                warn!(frame = %entry.path.display(), error = %e, "Unreadable offset record; skipping frame");
                failures += 1;
            }
        }
    }

    (inputs, failures)
}
