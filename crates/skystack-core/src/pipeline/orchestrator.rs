use std::path::PathBuf;

use tracing::{error, info};

use crate::error::Result;
use crate::frame::{FrameEntry, FrameSet};
use crate::io::image_io::{FrameStore, ImageFileStore, OutputFormat};
use crate::io::offsets::{FileOffsetStore, OffsetStore};
use crate::stack::{stack_reported, StackSummary};

use super::config::StackJobConfig;
use super::types::{ProgressReporter, StackStage, StopFlag};

/// Result of a stacking job.
#[derive(Clone, Debug)]
pub struct JobReport {
    pub summary: StackSummary,
    pub written: Vec<PathBuf>,
    /// Output variants that could not be written, with the error message.
    pub failed_outputs: Vec<(PathBuf, String)>,
}

impl JobReport {
    pub fn all_outputs_written(&self) -> bool {
        self.failed_outputs.is_empty()
    }
}

/// Run a stacking job against image files and offset side files on disk.
pub fn run_stack_job(
    config: &StackJobConfig,
    reporter: &dyn ProgressReporter,
) -> Result<JobReport> {
    let offsets = FileOffsetStore::new(config.offsets.suffix.clone());
    run_stack_job_reported(config, &ImageFileStore, &offsets, reporter, &StopFlag::new())
}

/// Run a stacking job with explicit collaborators.
///
/// Each output variant is written independently: a failure on one is
/// logged and recorded, and the other is still attempted.
pub fn run_stack_job_reported(
    config: &StackJobConfig,
    store: &dyn FrameStore,
    offsets: &dyn OffsetStore,
    reporter: &dyn ProgressReporter,
    stop: &StopFlag,
) -> Result<JobReport> {
    config.validate()?;

    let frame_set = if config.include_unaligned {
        let entries = config
            .frames
            .iter()
            .map(|p| FrameEntry::new(p.clone(), true))
            .collect();
        FrameSet::new(entries, config.reference)?
    } else {
        FrameSet::from_offsets(&config.frames, config.reference, offsets)?
    };
    info!(
        frames = frame_set.len(),
        included = frame_set.included_count(),
        "Frame set resolved"
    );

    let outcome = stack_reported(&frame_set, &config.sigma_clip, offsets, store, reporter, stop)?;

    let mut outputs = Vec::new();
    if let Some(path) = &config.output.float {
        outputs.push((OutputFormat::Float32, path.clone()));
    }
    if let Some(path) = &config.output.integer {
        outputs.push((
            OutputFormat::Integer16 {
                dither: config.output.dither_mode(),
            },
            path.clone(),
        ));
    }

    let mut written = Vec::new();
    let mut failed_outputs = Vec::new();
    reporter.begin_stage(StackStage::Writing, Some(outputs.len()));
    for (i, (format, path)) in outputs.into_iter().enumerate() {
        match store.write(&outcome.image, format, &path) {
            Ok(()) => {
                info!(output = %path.display(), ?format, "Wrote stack");
                written.push(path);
            }
            Err(e) => {
                error!(output = %path.display(), ?format, error = %e, "Failed to write output");
                failed_outputs.push((path, e.to_string()));
            }
        }
        reporter.advance(i + 1);
    }
    reporter.finish_stage();

    Ok(JobReport {
        summary: outcome.summary,
        written,
        failed_outputs,
    })
}
