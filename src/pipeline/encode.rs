//! Page image encoding for the recognizers.
//!
//! Both recognizers consume PNG: Tesseract reads the raw bytes from memory,
//! the vision recognizer receives them base64-encoded inside the request.
//! PNG keeps glyph edges intact, which matters more for recognition accuracy
//! than payload size.

use crate::error::RecognitionError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as PNG bytes.
pub fn png_bytes(page_num: usize, img: &DynamicImage) -> Result<Vec<u8>, RecognitionError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| RecognitionError::ImageFailed {
            page: page_num,
            detail: e.to_string(),
        })?;
    debug!("Page {}: encoded {} PNG bytes", page_num, buf.len());
    Ok(buf)
}

/// Encode a rendered page as a base64 PNG attachment for a vision model.
///
/// `detail: "high"` keeps the provider from downscaling the page to a single
/// low-resolution tile, which loses small print such as GSTINs.
pub fn vision_attachment(
    page_num: usize,
    img: &DynamicImage,
) -> Result<ImageData, RecognitionError> {
    let png = png_bytes(page_num, img)?;
    Ok(ImageData::new(STANDARD.encode(&png), "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, GrayImage};

    fn blank_page() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_pixel(12, 8, Luma([255])))
    }

    #[test]
    fn png_bytes_have_png_signature() {
        let bytes = png_bytes(1, &blank_page()).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn attachment_is_base64_png() {
        let data = vision_attachment(2, &blank_page()).unwrap();
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).unwrap();
        assert_eq!(&decoded[..4], b"\x89PNG");
    }
}
