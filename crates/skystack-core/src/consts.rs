/// Number of colour planes in every pixel array (R, G, B).
pub const CHANNEL_COUNT: usize = 3;

/// Nominal full-scale intensity. Frames are scaled to 0..=65535 on load.
pub const INTENSITY_SCALE: f32 = 65535.0;

/// Sigma thresholds are stored as tenths of a standard deviation.
pub const SIGMA_TENTHS_PER_UNIT: f64 = 10.0;

/// Default suffix appended to a frame's stem to name its offset side file.
pub const DEFAULT_OFFSET_SUFFIX: &str = "_offset.txt";

/// Default number of sigma-clip rejection passes.
pub const DEFAULT_CLIP_ITERATIONS: usize = 2;

/// Default per-channel threshold in tenths of sigma (2.5σ).
pub const DEFAULT_SIGMA_TENTHS: i32 = 25;

/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Number of integers in a persisted sigma-clip parameter line.
pub const SIGMA_CLIP_LINE_FIELDS: usize = 6;
