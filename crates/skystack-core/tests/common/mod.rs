#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array3;

use skystack_core::error::{Result, StackError};
use skystack_core::frame::{Frame, StackInput};
use skystack_core::io::image_io::{FrameStore, OutputFormat};
use skystack_core::pipeline::{ProgressReporter, StackStage, StopFlag};

/// Frame with the same `rows` (row-major, `rows[y][x]`) in all three planes.
pub fn frame_from_rows(rows: &[&[f32]]) -> Frame {
    let h = rows.len();
    let w = rows[0].len();
    let mut data = Array3::<f32>::zeros((3, h, w));
    for (y, row) in rows.iter().enumerate() {
        for (x, &v) in row.iter().enumerate() {
            for c in 0..3 {
                data[[c, y, x]] = v;
            }
        }
    }
    Frame::new(data, 16)
}

pub fn uniform_frame(h: usize, w: usize, fill: f32) -> Frame {
    Frame::new(Array3::from_elem((3, h, w), fill), 16)
}

/// In-memory `FrameStore` that counts loads and can inject failures.
#[derive(Default)]
pub struct MemoryFrameStore {
    frames: HashMap<PathBuf, Frame>,
    loads: RefCell<HashMap<PathBuf, usize>>,
    /// Loads of a path succeed this many times, then fail.
    fail_after: HashMap<PathBuf, usize>,
    failing_writes: HashSet<PathBuf>,
    pub written: RefCell<Vec<(PathBuf, OutputFormat, Frame)>>,
}

impl MemoryFrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, path: &str, frame: Frame) -> Self {
        self.frames.insert(PathBuf::from(path), frame);
        self
    }

    pub fn fail_after(mut self, path: &str, successful_loads: usize) -> Self {
        self.fail_after.insert(PathBuf::from(path), successful_loads);
        self
    }

    pub fn fail_writes_to(mut self, path: &str) -> Self {
        self.failing_writes.insert(PathBuf::from(path));
        self
    }

    pub fn load_count(&self, path: &str) -> usize {
        self.loads
            .borrow()
            .get(Path::new(path))
            .copied()
            .unwrap_or(0)
    }
}

impl FrameStore for MemoryFrameStore {
    fn load(&self, path: &Path) -> Result<Frame> {
        let attempt = {
            let mut loads = self.loads.borrow_mut();
            let n = loads.entry(path.to_path_buf()).or_insert(0);
            *n += 1;
            *n
        };
        if let Some(&limit) = self.fail_after.get(path) {
            if attempt > limit {
                return Err(StackError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    format!("injected failure for {}", path.display()),
                )));
            }
        }
        self.frames.get(path).cloned().ok_or_else(|| {
            StackError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            ))
        })
    }

    fn write(&self, frame: &Frame, format: OutputFormat, path: &Path) -> Result<()> {
        if self.failing_writes.contains(path) {
            return Err(StackError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )));
        }
        self.written
            .borrow_mut()
            .push((path.to_path_buf(), format, frame.clone()));
        Ok(())
    }
}

/// Reference first, then lights at the given offsets.
pub fn inputs(reference: &str, lights: &[(&str, i32, i32)]) -> Vec<StackInput> {
    let mut v = vec![StackInput::reference(Path::new(reference))];
    for &(path, dx, dy) in lights {
        v.push(StackInput::light(
            Path::new(path),
            skystack_core::frame::Offset::new(dx, dy),
        ));
    }
    v
}

/// Reporter that requests a stop as soon as the given clip pass begins.
pub struct StopAtPass {
    pub pass: usize,
    pub stop: StopFlag,
    pub stages: Mutex<Vec<StackStage>>,
}

impl StopAtPass {
    pub fn new(pass: usize, stop: StopFlag) -> Self {
        Self {
            pass,
            stop,
            stages: Mutex::new(Vec::new()),
        }
    }
}

impl ProgressReporter for StopAtPass {
    fn begin_stage(&self, stage: StackStage, _total_items: Option<usize>) {
        if let StackStage::Clipping { pass, .. } = stage {
            if pass == self.pass {
                self.stop.request();
            }
        }
        self.stages.lock().unwrap().push(stage);
    }
}
