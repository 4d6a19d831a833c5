//! Iterative JPEG recompression.
//!
//! The original image is repeatedly downscaled by a fixed step and encoded at
//! an intermediate quality until the result drops under a fraction of the
//! input size. The last intermediate is then re-encoded once at a low final
//! quality. Every step resizes the original decoded image, never a previous
//! intermediate.

use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat};
use jpeg_encoder::{ColorType, Encoder, SamplingFactor};

/// Tuning for [`compress`]. Defaults reproduce the production heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionSettings {
    /// Stop shrinking once output is at most this fraction of the input size.
    pub target_ratio: f64,
    /// Multiplier applied to the resize factor on each iteration.
    pub resize_step: f64,
    pub intermediate_quality: u8,
    pub final_quality: u8,
    /// Give up shrinking once the resize factor falls below this floor.
    pub min_resize_factor: f64,
    pub max_iterations: u32,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            target_ratio: 0.5,
            resize_step: 0.8,
            intermediate_quality: 50,
            final_quality: 20,
            min_resize_factor: 0.05,
            max_iterations: 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompressionOutput {
    pub bytes: Vec<u8>,
    /// Number of intermediate encodes performed.
    pub iterations: u32,
    /// Resize factor of the returned image relative to the original width.
    pub resize_factor: f64,
}

/// Compress raw image bytes into a progressive 4:2:0 JPEG.
pub fn compress(
    original: &[u8],
    settings: &CompressionSettings,
) -> Result<CompressionOutput, CodecError> {
    let source = image::load_from_memory(original)?;
    let (width, height) = source.dimensions();
    let threshold = original.len() as f64 * settings.target_ratio;
    let max_iterations = settings.max_iterations.max(1);

    let mut resize_factor = 1.0_f64;
    let mut iterations = 0;
    let intermediate = loop {
        resize_factor *= settings.resize_step;
        iterations += 1;

        let resized = resize_to_factor(&source, width, height, resize_factor);
        let encoded = encode_jpeg(&resized, settings.intermediate_quality)?;

        let reached_target = encoded.len() as f64 <= threshold;
        let exhausted =
            resize_factor < settings.min_resize_factor || iterations >= max_iterations;
        if reached_target || exhausted {
            if !reached_target {
                tracing::debug!(
                    iterations,
                    resize_factor,
                    size = encoded.len(),
                    threshold,
                    "Compression target not reached, using best effort"
                );
            }
            break encoded;
        }
    };

    let resized = image::load_from_memory_with_format(&intermediate, ImageFormat::Jpeg)?;
    let bytes = encode_jpeg(&resized, settings.final_quality)?;

    Ok(CompressionOutput {
        bytes,
        iterations,
        resize_factor,
    })
}

/// Resize to `round(width * factor)` wide, keeping the aspect ratio.
fn resize_to_factor(source: &DynamicImage, width: u32, height: u32, factor: f64) -> DynamicImage {
    let new_width = ((width as f64) * factor).round().max(1.0) as u32;
    let new_height = ((height as f64) * new_width as f64 / width as f64)
        .round()
        .max(1.0) as u32;
    source.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, CodecError> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    let (w, h) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(CodecError::Dimensions { width, height }),
    };

    let mut out = Vec::new();
    let mut encoder = Encoder::new(&mut out, quality);
    encoder.set_progressive(true);
    encoder.set_sampling_factor(SamplingFactor::R_4_2_0);
    encoder.encode(rgb.as_raw(), w, h, ColorType::Rgb)?;
    Ok(out)
}

/// Image compression capability used by the product pipeline.
///
/// Implementations are CPU-bound; callers run them on the blocking pool.
pub trait ImageCompressor: Send + Sync {
    fn compress(&self, original: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// [`compress`] with fixed settings.
#[derive(Debug, Clone, Default)]
pub struct JpegCompressor {
    settings: CompressionSettings,
}

impl JpegCompressor {
    pub fn new(settings: CompressionSettings) -> Self {
        Self { settings }
    }
}

impl ImageCompressor for JpegCompressor {
    fn compress(&self, original: &[u8]) -> Result<Vec<u8>, CodecError> {
        let start = std::time::Instant::now();
        let output = compress(original, &self.settings)?;
        metrics::histogram!("image_compression_seconds").record(start.elapsed().as_secs_f64());

        tracing::debug!(
            original_bytes = original.len(),
            compressed_bytes = output.bytes.len(),
            iterations = output.iterations,
            resize_factor = output.resize_factor,
            "Image compressed"
        );
        Ok(output.bytes)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("Image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] jpeg_encoder::EncodingError),

    #[error("Image dimensions {width}x{height} exceed JPEG limits")]
    Dimensions { width: u32, height: u32 },

    #[error("Compression worker failed: {0}")]
    Worker(String),
}
