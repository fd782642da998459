use std::ops::Range;

use crate::frame::Offset;

/// Overlap of a translated source frame with a destination grid.
///
/// `rows` and `cols` are destination coordinates; `source` maps them back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Footprint {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
    offset: Offset,
}

impl Footprint {
    pub fn new(
        src_width: usize,
        src_height: usize,
        dst_width: usize,
        dst_height: usize,
        offset: Offset,
    ) -> Self {
        Self {
            rows: overlap(src_height, dst_height, offset.dy),
            cols: overlap(src_width, dst_width, offset.dx),
            offset,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.cols.is_empty()
    }

    /// Source `(row, col)` feeding destination `(row, col)`.
    #[inline]
    pub fn source(&self, row: usize, col: usize) -> (usize, usize) {
        (
            (row as i64 - self.offset.dy as i64) as usize,
            (col as i64 - self.offset.dx as i64) as usize,
        )
    }
}

fn overlap(src_len: usize, dst_len: usize, shift: i32) -> Range<usize> {
    let shift = shift as i64;
    let start = shift.max(0);
    let end = (src_len as i64 + shift).min(dst_len as i64);
    if end <= start {
        0..0
    } else {
        start as usize..end as usize
    }
}
