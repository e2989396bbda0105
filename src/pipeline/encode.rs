//! Image preparation for OCR: decode any supported upload, re-encode as PNG.
//!
//! A corrupt upload fails here with an image error, before tesseract runs.
//! Formats missing from some tesseract builds (WebP) arrive as PNG.

use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// Decode `bytes` as an image and return the PNG encoding of it.
pub fn prepare_for_ocr(bytes: &[u8]) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(bytes)?;
    debug!("Decoded image {}x{} for OCR", img.width(), img.height());

    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn jpeg_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255])))
            .to_rgb8();
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .expect("jpeg encode");
        buf
    }

    #[test]
    fn jpeg_is_reencoded_as_png() {
        let png = prepare_for_ocr(&jpeg_bytes()).expect("prepare should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&png).expect("valid png");
        assert_eq!(decoded.width(), 8);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(prepare_for_ocr(b"definitely not an image").is_err());
    }
}
