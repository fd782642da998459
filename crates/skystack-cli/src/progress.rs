use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use skystack_core::pipeline::{ProgressReporter, StackStage};

/// Drives one progress bar per stacking stage.
#[derive(Default)]
pub struct BarReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: StackStage, total_items: Option<usize>) {
        let pb = match total_items {
            Some(total) => {
                let pb = ProgressBar::new(total as u64);
                if let Ok(style) =
                    ProgressStyle::default_bar().template("{msg:20} [{bar:40}] {pos}/{len}")
                {
                    pb.set_style(style.progress_chars("=> "));
                }
                pb
            }
            None => ProgressBar::new_spinner(),
        };
        pb.set_message(stage.to_string());

        if let Ok(mut slot) = self.bar.lock() {
            if let Some(previous) = slot.replace(pb) {
                previous.finish_and_clear();
            }
        }
    }

    fn advance(&self, items_done: usize) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(pb) = slot.as_ref() {
                pb.set_position(items_done as u64);
            }
        }
    }

    fn finish_stage(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(pb) = slot.take() {
                pb.finish();
            }
        }
    }
}
