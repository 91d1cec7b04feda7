//! Thumbnailer - rendition derivation and format sniffing
//!
//! Policy: resize to fit inside the configured bounding box, aspect ratio
//! preserved, no crop and no padding; sources smaller than the box are
//! scaled up to it. Lanczos3 filtering, re-encoded in the sniffed source
//! format, JPEG at the configured quality.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{GenericImageView, ImageFormat, ImageReader};
use reliquary_core::AppError;
use std::io::Cursor;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenditionError {
    #[error("Unrecognized image format")]
    UnknownFormat,

    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Failed to encode rendition: {0}")]
    Encode(#[source] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<RenditionError> for AppError {
    fn from(err: RenditionError) -> Self {
        AppError::UnsupportedMedia(err.to_string())
    }
}

/// A derived rendition plus what the bytes actually were
#[derive(Debug, Clone)]
pub struct RenditionOutput {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Extension (with dot) matching the sniffed content format. May
    /// disagree with the declared upload extension; the caller decides
    /// whether to correct the record.
    pub detected_extension: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Thumbnailer {
    max_width: u32,
    max_height: u32,
    quality: u8,
}

impl Thumbnailer {
    pub fn new(max_width: u32, max_height: u32, quality: u8) -> Self {
        Thumbnailer {
            max_width,
            max_height,
            quality,
        }
    }

    /// Derive the resized rendition of `data`.
    ///
    /// The format is sniffed from the bytes, never taken from the declared
    /// filename. Undecodable input is rejected, which is what keeps a
    /// corrupt upload from ever reaching the durable tree.
    pub fn render(&self, data: &[u8]) -> Result<RenditionOutput, RenditionError> {
        let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        let format = reader.format().ok_or(RenditionError::UnknownFormat)?;
        let img = reader.decode().map_err(RenditionError::Decode)?;

        let resized = img.resize(self.max_width, self.max_height, FilterType::Lanczos3);
        let (width, height) = resized.dimensions();

        let mut buf = Cursor::new(Vec::new());
        match format {
            ImageFormat::Jpeg => {
                // JPEG carries no alpha channel
                let rgb = resized.to_rgb8();
                JpegEncoder::new_with_quality(&mut buf, self.quality)
                    .encode_image(&rgb)
                    .map_err(RenditionError::Encode)?;
            }
            _ => resized
                .write_to(&mut buf, format)
                .map_err(RenditionError::Encode)?,
        }

        tracing::debug!(width, height, format = ?format, "Rendition derived");

        Ok(RenditionOutput {
            data: buf.into_inner(),
            width,
            height,
            detected_extension: extension_for(format),
        })
    }
}

/// Canonical extension (with dot) for a sniffed format
fn extension_for(format: ImageFormat) -> String {
    format
        .extensions_str()
        .first()
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn png_image(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn jpeg_image(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([0, 128, 255]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Jpeg)
            .unwrap();
        buffer
    }

    #[test]
    fn test_render_fits_bounding_box() {
        let thumbnailer = Thumbnailer::new(800, 600, 85);
        let output = thumbnailer.render(&jpeg_image(1600, 1200)).unwrap();

        assert_eq!((output.width, output.height), (800, 600));
        assert_eq!(output.detected_extension, ".jpg");
        assert!(!output.data.is_empty());
    }

    #[test]
    fn test_render_preserves_aspect_ratio() {
        let thumbnailer = Thumbnailer::new(800, 600, 85);
        // 2:1 source: width is the binding dimension
        let output = thumbnailer.render(&jpeg_image(2000, 1000)).unwrap();
        assert_eq!((output.width, output.height), (800, 400));
    }

    #[test]
    fn test_render_upscales_small_sources() {
        let thumbnailer = Thumbnailer::new(800, 600, 85);
        let output = thumbnailer.render(&png_image(100, 100)).unwrap();
        assert_eq!((output.width, output.height), (600, 600));
    }

    #[test]
    fn test_render_output_is_decodable() {
        let thumbnailer = Thumbnailer::new(800, 600, 85);
        let output = thumbnailer.render(&jpeg_image(1600, 1200)).unwrap();

        let decoded = ImageReader::new(Cursor::new(&output.data))
            .with_guessed_format()
            .unwrap();
        assert_eq!(decoded.format(), Some(ImageFormat::Jpeg));
        let img = decoded.decode().unwrap();
        assert_eq!(img.dimensions(), (800, 600));
    }

    #[test]
    fn test_render_rejects_corrupt_input() {
        let thumbnailer = Thumbnailer::new(800, 600, 85);
        let result = thumbnailer.render(b"definitely not an image");
        assert!(matches!(result, Err(RenditionError::UnknownFormat)));

        // valid magic bytes, broken body
        let mut truncated = png_image(64, 64);
        truncated.truncate(32);
        assert!(thumbnailer.render(&truncated).is_err());
    }

    #[test]
    fn test_render_sniffs_real_format() {
        let thumbnailer = Thumbnailer::new(800, 600, 85);
        // PNG bytes no matter what the upload claimed to be
        let output = thumbnailer.render(&png_image(64, 64)).unwrap();
        assert_eq!(output.detected_extension, ".png");
    }

    #[test]
    fn test_error_maps_to_unsupported_media() {
        let thumbnailer = Thumbnailer::new(800, 600, 85);
        let err = thumbnailer.render(b"junk").unwrap_err();
        let app_err: AppError = err.into();
        assert_eq!(app_err.error_code(), "UNSUPPORTED_MEDIA");
    }
}
