use crate::error::{Error, Result};
use crate::models::image_types::RawImage;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;

const THUMBNAIL_SIZE: u32 = 100;
const THUMBNAIL_QUALITY: u8 = 60;

/// Encode a small preview of the uploaded (un-enhanced) image as JPEG bytes.
pub fn generate_thumbnail_bytes(raw: &RawImage) -> Result<Vec<u8>> {
    let img = DynamicImage::ImageRgb8(raw.pixels().clone())
        .resize(THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle);

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, THUMBNAIL_QUALITY);
    img.write_with_encoder(encoder)
        .map_err(|e| Error::Thumbnail(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// Thumbnail as a `data:` URI ready to drop into an `<img>` tag.
pub fn generate_thumbnail(raw: &RawImage) -> Result<String> {
    let bytes = generate_thumbnail_bytes(raw)?;
    let b64 = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(format!("data:image/jpeg;base64,{}", b64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn fits_inside_the_bounding_box() {
        let raw = RawImage::new(RgbImage::from_pixel(400, 200, Rgb([30, 150, 40]))).unwrap();
        let bytes = generate_thumbnail_bytes(&raw).unwrap();
        let thumb = image::load_from_memory(&bytes).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (100, 50));
    }

    #[test]
    fn data_uri_has_jpeg_prefix() {
        let raw = RawImage::new(RgbImage::new(20, 20)).unwrap();
        let uri = generate_thumbnail(&raw).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,/9j/"));
    }
}
