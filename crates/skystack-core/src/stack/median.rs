use rayon::prelude::*;

use crate::frame::{Channel, Frame};

/// Median of a plane, ignoring NaN and infinite samples.
///
/// Returns `None` when the plane holds no finite sample.
pub fn channel_median(frame: &Frame, channel: Channel) -> Option<f32> {
    let mut values: Vec<f32> = frame
        .channel(channel)
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    median_of(&mut values)
}

/// Per-plane medians in R, G, B order.
pub fn channel_medians(frame: &Frame) -> [Option<f32>; 3] {
    let medians: Vec<Option<f32>> = Channel::ALL
        .par_iter()
        .map(|&c| channel_median(frame, c))
        .collect();
    [medians[0], medians[1], medians[2]]
}

/// Median of a slice, reordering it in place.
///
/// Uses `select_nth_unstable` for O(n) median without full sort.
pub fn median_of(values: &mut [f32]) -> Option<f32> {
    let n = values.len();
    if n == 0 {
        None
    } else if n == 1 {
        Some(values[0])
    } else if n % 2 == 1 {
        let mid = n / 2;
        Some(*values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1)
    } else {
        let mid = n / 2;
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
