pub mod image_io;
pub mod offsets;
pub mod params;
pub mod quantize;

pub use image_io::{FrameStore, ImageFileStore, OutputFormat};
pub use offsets::{FileOffsetStore, MemoryOffsetStore, OffsetStore};
pub use quantize::{quantize_u16, Dither, QuantizedImage};
