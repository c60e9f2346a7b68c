//! Image payload checks
//!
//! Jobs carry arbitrary bytes. Decoding them once with the `image` crate
//! separates corrupt uploads from model failures before the external
//! embedder is started.

use image::{DynamicImage, ImageResult};

/// Decode a staged payload in any format the `image` crate recognizes
pub fn decode_image(data: &[u8]) -> ImageResult<DynamicImage> {
    image::load_from_memory(data)
}

/// PNG bytes for synthetic fixtures
#[cfg(test)]
pub fn encode_png(image: &DynamicImage) -> ImageResult<Vec<u8>> {
    let mut out = std::io::Cursor::new(Vec::new());
    image.write_to(&mut out, image::ImageFormat::Png)?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_png_decodes() {
        let bytes = encode_png(&DynamicImage::new_rgb8(4, 3)).unwrap();
        let decoded = decode_image(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn test_truncated_png_is_rejected() {
        let bytes = encode_png(&DynamicImage::new_rgb8(4, 3)).unwrap();
        assert!(decode_image(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_text_payload_is_rejected() {
        assert!(decode_image(b"definitely not an image").is_err());
    }
}
