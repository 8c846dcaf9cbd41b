//! Image encoding: raw embedded image bytes → base64 `ImageData` for the VLM.
//!
//! Embedded images arrive in whatever format the author pasted: PNG and JPEG
//! mostly, but also GIF, BMP and TIFF from older decks. Vision APIs reliably
//! accept only PNG and JPEG, so those pass through untouched and everything
//! else is decoded and re-encoded as PNG.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Wrap an embedded image for a multimodal request.
///
/// `detail: "high"` lets GPT-4-class models tile the image instead of
/// squashing it into one 512 px overview, which loses small print in charts
/// and screenshots.
pub fn encode_image(bytes: &[u8]) -> Result<ImageData, image::ImageError> {
    let format = image::guess_format(bytes)?;
    let (payload, mime) = match format {
        ImageFormat::Png => (STANDARD.encode(bytes), "image/png"),
        ImageFormat::Jpeg => (STANDARD.encode(bytes), "image/jpeg"),
        other => {
            debug!("Transcoding {:?} image to PNG", other);
            let img = image::load_from_memory_with_format(bytes, other)?;
            (STANDARD.encode(encode_png(&img)?), "image/png")
        }
    };

    debug!("Encoded image → {} bytes base64 ({})", payload.len(), mime);
    Ok(ImageData::new(payload, mime).with_detail("high"))
}

/// PNG-encode a decoded image.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn red_square() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn png_passes_through() {
        let png = encode_png(&red_square()).unwrap();
        let data = encode_image(&png).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), png);
    }

    #[test]
    fn bmp_is_transcoded_to_png() {
        let mut bmp = Vec::new();
        red_square()
            .write_to(&mut Cursor::new(&mut bmp), ImageFormat::Bmp)
            .unwrap();

        let data = encode_image(&bmp).unwrap();
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).unwrap();
        assert_eq!(image::guess_format(&decoded).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(encode_image(b"definitely not an image").is_err());
    }
}
