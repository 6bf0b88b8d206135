//! Image decoding and PNG encoding.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) and produces an RGBA
//! image for the engine. Generated artifacts are always encoded as PNG.

use image::{ImageEncoder, RgbaImage};

use crate::types::EngineError;

/// Decode raw image bytes into 8-bit RGBA.
///
/// Supports whatever formats the enabled `image` codecs can read. Images
/// without an alpha channel decode as fully opaque.
///
/// # Errors
///
/// Returns [`EngineError::EmptyInput`] if `bytes` is empty.
/// Returns [`EngineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, EngineError> {
    if bytes.is_empty() {
        return Err(EngineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Encode an RGBA image as PNG bytes.
///
/// # Errors
///
/// Returns [`EngineError::ImageDecode`] if the encoder rejects the image.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, EngineError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(buf)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;

    use super::*;

    #[test]
    fn empty_input_returns_error() {
        let result = decode_rgba(&[]);
        assert!(matches!(result, Err(EngineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode_rgba(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(EngineError::ImageDecode(_))));
    }

    #[test]
    fn png_preserves_pixels_and_alpha() {
        let img = RgbaImage::from_fn(17, 31, |x, y| {
            Rgba([
                u8::try_from(x * 7).unwrap(),
                u8::try_from(y * 5).unwrap(),
                42,
                u8::try_from((x + y) * 3).unwrap(),
            ])
        });
        let bytes = encode_png(&img).unwrap();
        let decoded = decode_rgba(&bytes).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn opaque_formats_decode_with_full_alpha() {
        let rgb = image::RgbImage::from_pixel(3, 2, image::Rgb([9, 8, 7]));
        let mut buf = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buf)
            .write_image(rgb.as_raw(), 3, 2, image::ExtendedColorType::Rgb8)
            .unwrap();

        let decoded = decode_rgba(&buf).unwrap();
        assert!(decoded.pixels().all(|p| *p == Rgba([9, 8, 7, 255])));
    }
}
