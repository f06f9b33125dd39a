//! Image encoding: screenshot → base64 payload for the vision APIs.
//!
//! Google Vision and the VLM chat APIs both take images as base64 inside a
//! JSON body. PNG and JPEG inputs are forwarded byte-for-byte; GIF and WebP
//! are re-encoded as PNG, which every provider accepts. `detail: "high"`
//! matters for tall screenshots: with low detail the model sees a single
//! downscaled tile and cannot place boundaries to within a section.

use crate::pipeline::decode::LoadedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// Bytes and MIME type of the image as it will be sent over the wire.
pub fn wire_bytes(loaded: &LoadedImage) -> Result<(Vec<u8>, &'static str), image::ImageError> {
    match loaded.format {
        ImageFormat::Png => Ok((loaded.bytes.clone(), "image/png")),
        ImageFormat::Jpeg => Ok((loaded.bytes.clone(), "image/jpeg")),
        _ => Ok((encode_png(&loaded.image)?, "image/png")),
    }
}

/// Base64-encode the screenshot for a vision LLM.
pub fn encode_for_vision(loaded: &LoadedImage) -> Result<ImageData, image::ImageError> {
    let (bytes, mime) = wire_bytes(loaded)?;
    let b64 = STANDARD.encode(&bytes);
    debug!("Encoded screenshot → {} bytes base64 ({})", b64.len(), mime);

    Ok(ImageData::new(b64, mime).with_detail("high"))
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn loaded(format: ImageFormat) -> LoadedImage {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        LoadedImage { bytes, format, image }
    }

    #[test]
    fn png_is_forwarded_unchanged() {
        let img = loaded(ImageFormat::Png);
        let (bytes, mime) = wire_bytes(&img).unwrap();
        assert_eq!(bytes, img.bytes);
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn gif_is_reencoded_as_png() {
        let img = loaded(ImageFormat::Gif);
        let (bytes, mime) = wire_bytes(&img).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn encode_for_vision_is_valid_base64() {
        let data = encode_for_vision(&loaded(ImageFormat::Png)).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(!decoded.is_empty());
    }
}
