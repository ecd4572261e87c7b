use anyhow::{bail, Context, Result};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, RgbaImage};
use std::time::Instant;
use xcap::Monitor;

/// Produces a JPEG snapshot of the display. Blocking; no internal retry.
pub trait CaptureSource: Send + Sync {
    fn capture(&self) -> Result<Vec<u8>>;
}

/// Captures the first monitor reported by the platform.
pub struct ScreenCapture {
    quality: u8,
}

impl ScreenCapture {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }
}

impl CaptureSource for ScreenCapture {
    fn capture(&self) -> Result<Vec<u8>> {
        let start = Instant::now();

        let monitors = Monitor::all().context("Failed to enumerate monitors")?;
        let monitor = monitors.first().context("No monitors found")?;
        let raw = monitor
            .capture_image()
            .context("Failed to capture monitor image")?;

        let jpeg = encode_jpeg(&raw, self.quality)?;
        log::debug!(
            "Captured {}x{} screen, {} bytes jpeg in {}ms",
            raw.width(),
            raw.height(),
            jpeg.len(),
            start.elapsed().as_millis()
        );
        Ok(jpeg)
    }
}

/// JPEG has no alpha channel, so the capture is flattened to RGB first.
pub fn encode_jpeg(image: &RgbaImage, quality: u8) -> Result<Vec<u8>> {
    if image.width() == 0 || image.height() == 0 {
        bail!("Captured empty screenshot ({}x{})", image.width(), image.height());
    }

    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(&rgb)
        .context("Failed to encode screenshot as JPEG")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 3 % 256) as u8, ((x + y) % 256) as u8, 255])
        })
    }

    #[test]
    fn encodes_decodable_jpeg_with_same_dimensions() {
        let bytes = encode_jpeg(&gradient(64, 48), 50).unwrap();
        assert_eq!(&bytes[..3], &[0xFF, 0xD8, 0xFF]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn lower_quality_is_smaller() {
        let image = gradient(256, 256);
        let low = encode_jpeg(&image, 10).unwrap();
        let high = encode_jpeg(&image, 95).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn empty_image_is_rejected() {
        assert!(encode_jpeg(&RgbaImage::new(0, 0), 50).is_err());
    }

    #[test]
    #[ignore = "requires a graphical display and screen recording permission"]
    fn captures_primary_display() {
        let bytes = ScreenCapture::new(50).capture().unwrap();
        assert!(!bytes.is_empty());
    }
}
