//! Image processor - decodes, scales, and re-encodes images
//!
//! Scaling multiplies both dimensions by the request ratio (always in
//! (0, 1]), rounding to the nearest pixel with a 1px floor.
//!
//! Uses `spawn_blocking` for CPU-intensive operations to avoid blocking
//! the async runtime.

use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::ImageFormat;

/// Configuration for image encoding
#[derive(Clone, Debug)]
pub struct ImageProcessorConfig {
    /// JPEG quality (0-100)
    pub jpeg_quality: u8,
}

impl Default for ImageProcessorConfig {
    fn default() -> Self {
        Self { jpeg_quality: 85 }
    }
}

/// Result of a conversion
#[derive(Debug)]
pub struct ConvertOutput {
    /// Encoded image data in the target format
    pub data: Bytes,
    /// Width of the processed image
    pub width: u32,
    /// Height of the processed image
    pub height: u32,
}

pub struct ImageProcessor {
    config: ImageProcessorConfig,
}

impl ImageProcessor {
    pub fn new(config: ImageProcessorConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ImageProcessorConfig::default())
    }

    /// Decode image data in the given format (blocking version).
    pub fn decode(&self, data: &[u8], format: ImageFormat) -> Result<DynamicImage> {
        image::load_from_memory_with_format(data, codec_format(format))
            .map_err(|e| AppError::ImageProcessing(format!("failed to decode image: {e}")))
    }

    /// Decode on the blocking thread pool.
    pub async fn decode_async(
        self: Arc<Self>,
        data: Bytes,
        format: ImageFormat,
    ) -> Result<DynamicImage> {
        let processor = self.clone();

        tokio::task::spawn_blocking(move || processor.decode(&data, format))
            .await
            .map_err(|e| AppError::Internal(format!("decode task panicked: {e}")))?
    }

    /// Scale by `ratio` and encode as `format` (blocking version).
    ///
    /// **Note:** CPU-intensive; call `process_async` from async code.
    pub fn process(
        &self,
        img: &DynamicImage,
        ratio: f64,
        format: ImageFormat,
    ) -> Result<ConvertOutput> {
        let (orig_w, orig_h) = img.dimensions();

        // ratio == 1 passes the pixels through untouched
        if (ratio - 1.0).abs() < f64::EPSILON {
            let data = self.encode(img, format)?;
            return Ok(ConvertOutput {
                data,
                width: orig_w,
                height: orig_h,
            });
        }

        let (new_w, new_h) = scaled_dimensions(orig_w, orig_h, ratio);

        let resized = img.resize_exact(new_w, new_h, FilterType::Triangle);
        let data = self.encode(&resized, format)?;

        debug!(
            width = new_w,
            height = new_h,
            size = data.len(),
            "image scaled"
        );

        Ok(ConvertOutput {
            data,
            width: new_w,
            height: new_h,
        })
    }

    /// Scale and encode on the blocking thread pool.
    pub async fn process_async(
        self: Arc<Self>,
        img: DynamicImage,
        ratio: f64,
        format: ImageFormat,
    ) -> Result<ConvertOutput> {
        let processor = self.clone();

        tokio::task::spawn_blocking(move || processor.process(&img, ratio, format))
            .await
            .map_err(|e| AppError::Internal(format!("convert task panicked: {e}")))?
    }

    /// Encode an image in the given format.
    pub fn encode(&self, img: &DynamicImage, format: ImageFormat) -> Result<Bytes> {
        let mut buf = Vec::new();
        let mut cursor = Cursor::new(&mut buf);

        let output_format = match format {
            ImageFormat::Jpeg => ImageOutputFormat::Jpeg(self.config.jpeg_quality),
            ImageFormat::Png => ImageOutputFormat::Png,
            ImageFormat::Gif => ImageOutputFormat::Gif,
        };

        img.write_to(&mut cursor, output_format)
            .map_err(|e| AppError::ImageProcessing(format!("failed to encode image: {e}")))?;

        Ok(Bytes::from(buf))
    }
}

/// Target dimensions for a ratio, rounded to the nearest pixel with a 1px
/// floor so degenerate ratios never produce an empty image.
fn scaled_dimensions(width: u32, height: u32, ratio: f64) -> (u32, u32) {
    let new_w = ((width as f64) * ratio).round() as u32;
    let new_h = ((height as f64) * ratio).round() as u32;
    (new_w.max(1), new_h.max(1))
}

fn codec_format(format: ImageFormat) -> image::ImageFormat {
    match format {
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Gif => image::ImageFormat::Gif,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn test_scaled_dimensions_half() {
        assert_eq!(scaled_dimensions(1200, 800, 0.5), (600, 400));
    }

    #[test]
    fn test_scaled_dimensions_rounds() {
        assert_eq!(scaled_dimensions(101, 51, 0.5), (51, 26));
    }

    #[test]
    fn test_scaled_dimensions_floor_one_pixel() {
        assert_eq!(scaled_dimensions(10, 10, 0.01), (1, 1));
    }

    #[test]
    fn test_process_half_ratio_png_to_jpeg() {
        let processor = ImageProcessor::with_defaults();
        let img = sample_image(1200, 800);

        let out = processor.process(&img, 0.5, ImageFormat::Jpeg).unwrap();
        assert_eq!((out.width, out.height), (600, 400));

        // The output must decode as the target format with the recorded
        // dimensions.
        let decoded = processor.decode(&out.data, ImageFormat::Jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (600, 400));
    }

    #[test]
    fn test_process_ratio_one_passthrough() {
        let processor = ImageProcessor::with_defaults();
        let img = sample_image(320, 240);

        let out = processor.process(&img, 1.0, ImageFormat::Png).unwrap();
        assert_eq!((out.width, out.height), (320, 240));
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let processor = ImageProcessor::with_defaults();
        let img = sample_image(64, 48);

        for format in [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::Gif] {
            let data = processor.encode(&img, format).unwrap();
            let decoded = processor.decode(&data, format).unwrap();
            assert_eq!(decoded.dimensions(), (64, 48), "{}", format.as_str());
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let processor = ImageProcessor::with_defaults();
        assert!(processor.decode(b"not an image", ImageFormat::Png).is_err());
    }
}
