use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::consts::DEFAULT_OFFSET_SUFFIX;
use crate::error::{Result, StackError};
use crate::frame::Offset;

/// Persistent frame-name → offset mapping.
///
/// A frame with a record is considered aligned; deleting the record takes
/// it out of later stacking runs.
pub trait OffsetStore {
    /// Fails with `OffsetNotFound` when the frame has no record.
    fn load(&self, frame: &Path) -> Result<Offset>;

    fn save(&self, frame: &Path, offset: Offset) -> Result<()>;

    /// Removing a record that does not exist is a no-op.
    fn delete(&self, frame: &Path) -> Result<()>;

    fn contains(&self, frame: &Path) -> bool;
}

/// Offset records kept as one-line side files next to each frame.
#[derive(Clone, Debug)]
pub struct FileOffsetStore {
    suffix: String,
}

impl Default for FileOffsetStore {
    fn default() -> Self {
        Self::new(DEFAULT_OFFSET_SUFFIX)
    }
}

impl FileOffsetStore {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// `dir/light_001.tif` → `dir/light_001<suffix>`.
    pub fn record_path(&self, frame: &Path) -> PathBuf {
        let stem = frame
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        frame.with_file_name(format!("{stem}{}", self.suffix))
    }
}

impl OffsetStore for FileOffsetStore {
    fn load(&self, frame: &Path) -> Result<Offset> {
        let path = self.record_path(frame);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StackError::OffsetNotFound(frame.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        parse_offset_record(&contents).map_err(|reason| StackError::InvalidOffsetRecord {
            path: path.clone(),
            reason,
        })
    }

    fn save(&self, frame: &Path, offset: Offset) -> Result<()> {
        let path = self.record_path(frame);
        std::fs::write(&path, format_offset_record(offset))?;
        debug!(record = %path.display(), %offset, "Saved offset");
        Ok(())
    }

    fn delete(&self, frame: &Path) -> Result<()> {
        let path = self.record_path(frame);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, frame: &Path) -> bool {
        self.record_path(frame).is_file()
    }
}

/// In-process offset table.
#[derive(Debug, Default)]
pub struct MemoryOffsetStore {
    records: RefCell<HashMap<PathBuf, Offset>>,
}

impl MemoryOffsetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OffsetStore for MemoryOffsetStore {
    fn load(&self, frame: &Path) -> Result<Offset> {
        self.records
            .borrow()
            .get(frame)
            .copied()
            .ok_or_else(|| StackError::OffsetNotFound(frame.to_path_buf()))
    }

    fn save(&self, frame: &Path, offset: Offset) -> Result<()> {
        self.records
            .borrow_mut()
            .insert(frame.to_path_buf(), offset);
        Ok(())
    }

    fn delete(&self, frame: &Path) -> Result<()> {
        self.records.borrow_mut().remove(frame);
        Ok(())
    }

    fn contains(&self, frame: &Path) -> bool {
        self.records.borrow().contains_key(frame)
    }
}

/// Parse a `dx dy` record. Both values are whitespace-separated integers.
pub fn parse_offset_record(contents: &str) -> std::result::Result<Offset, String> {
    let mut tokens = contents.split_whitespace();
    let mut next = |name: &str| -> std::result::Result<i32, String> {
        let token = tokens.next().ok_or_else(|| format!("missing {name}"))?;
        token
            .parse::<i32>()
            .map_err(|e| format!("{name} {token:?}: {e}"))
    };
    let dx = next("dx")?;
    let dy = next("dy")?;
    if let Some(extra) = tokens.next() {
        return Err(format!("unexpected trailing value {extra:?}"));
    }
    Ok(Offset { dx, dy })
}

pub fn format_offset_record(offset: Offset) -> String {
    format!("{} {}\n", offset.dx, offset.dy)
}
