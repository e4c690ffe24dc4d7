//! Image encoding for recognisers that take encoded images, not pixels.
//!
//! PNG throughout: lossless compression keeps glyph edges crisp, and JPEG
//! ringing around text measurably hurts recognition at any DPI.

use super::render::RasterImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG bytes.
pub fn encode_png(raster: &RasterImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    raster
        .image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded page {} → {} bytes PNG",
        raster.page_index + 1,
        buf.len()
    );
    Ok(buf)
}

/// Encode a rasterised page as a base64 PNG attachment for a vision model.
///
/// `detail: "high"` asks OpenAI-style tiling for the full tile budget; the
/// low-detail single tile loses small print.
pub fn encode_image_data(raster: &RasterImage) -> Result<ImageData, image::ImageError> {
    let png = encode_png(raster)?;
    Ok(ImageData::new(STANDARD.encode(&png), "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};

    fn red_square() -> RasterImage {
        RasterImage::new(
            0,
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255]))),
        )
    }

    #[test]
    fn png_has_signature() {
        let png = encode_png(&red_square()).expect("encode should succeed");
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn image_data_is_base64_png() {
        let data = encode_image_data(&red_square()).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[..4], b"\x89PNG");
    }
}
