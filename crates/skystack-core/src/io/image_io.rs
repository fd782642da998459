use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::{ColorType, ImageFormat, Rgb};
use ndarray::Array3;
use tiff::encoder::{colortype, TiffEncoder};

use crate::consts::{CHANNEL_COUNT, INTENSITY_SCALE};
use crate::error::{Result, StackError};
use crate::frame::Frame;

use super::quantize::{quantize_u16, Dither};

/// Sample format of a written image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// 32-bit IEEE float per sample; NaN and out-of-range values are kept.
    Float32,
    /// 16-bit unsigned integer per sample.
    Integer16 { dither: Dither },
}

/// Source and sink of pixel arrays.
///
/// Every loaded frame is scaled to the 0..=65535 range whatever the source
/// sample type, so nothing downstream branches on bit depth.
pub trait FrameStore {
    fn load(&self, path: &Path) -> Result<Frame>;

    fn write(&self, frame: &Frame, format: OutputFormat, path: &Path) -> Result<()>;
}

/// `FrameStore` backed by image files on disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImageFileStore;

impl FrameStore for ImageFileStore {
    fn load(&self, path: &Path) -> Result<Frame> {
        load_frame(path)
    }

    fn write(&self, frame: &Frame, format: OutputFormat, path: &Path) -> Result<()> {
        match format {
            OutputFormat::Float32 => save_float_tiff(frame, path),
            OutputFormat::Integer16 { dither } => save_integer_image(frame, dither, path),
        }
    }
}

/// Load any image the `image` crate can decode into a three-plane frame.
/// Grey images are replicated into all three planes.
///
/// Integer samples are scaled to 0..=65535. Float samples are taken as
/// already on that scale, matching what `save_float_tiff` writes.
pub fn load_frame(path: &Path) -> Result<Frame> {
    let img = image::open(path)?;
    let color = img.color();
    let bit_depth = color.bytes_per_pixel() / color.channel_count() * 8;
    let scale = match color {
        ColorType::Rgb32F | ColorType::Rgba32F => 1.0,
        _ => INTENSITY_SCALE,
    };

    let rgb = img.to_rgb32f();
    let (w, h) = rgb.dimensions();
    let mut data = Array3::<f32>::zeros((CHANNEL_COUNT, h as usize, w as usize));

    for (col, row, pixel) in rgb.enumerate_pixels() {
        for c in 0..CHANNEL_COUNT {
            data[[c, row as usize, col as usize]] = pixel.0[c] * scale;
        }
    }

    Ok(Frame::new(data, bit_depth))
}

/// Save a frame as a 3-sample 32-bit float TIFF, values unscaled.
pub fn save_float_tiff(frame: &Frame, path: &Path) -> Result<()> {
    let h = frame.height();
    let w = frame.width();

    let mut samples: Vec<f32> = Vec::with_capacity(h * w * CHANNEL_COUNT);
    for row in 0..h {
        for col in 0..w {
            for c in 0..CHANNEL_COUNT {
                samples.push(frame.data[[c, row, col]]);
            }
        }
    }

    let file = BufWriter::new(File::create(path)?);
    let mut encoder = TiffEncoder::new(file)?;
    encoder.write_image::<colortype::RGB32Float>(w as u32, h as u32, &samples)?;
    Ok(())
}

/// Save a frame as 16-bit RGB, choosing the container from the file extension.
pub fn save_integer_image(frame: &Frame, dither: Dither, path: &Path) -> Result<()> {
    let quantized = quantize_u16(frame, dither);

    let img = image::ImageBuffer::<Rgb<u16>, Vec<u16>>::from_raw(
        quantized.width as u32,
        quantized.height as u32,
        quantized.samples,
    )
    .ok_or_else(|| {
        StackError::InvalidConfig(format!(
            "sample buffer does not match {}x{}",
            quantized.width, quantized.height
        ))
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => img.save_with_format(path, ImageFormat::Png)?,
        _ => img.save_with_format(path, ImageFormat::Tiff)?,
    }
    Ok(())
}
