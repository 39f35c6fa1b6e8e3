use crate::error::{Error, Result};
use crate::models::image_types::RawImage;
use crate::services::exif_service;
use image::ImageReader;
use std::io::Cursor;
use std::path::Path;

/// Decode an in-memory encoded image (any format `image` can sniff).
pub fn load_bytes(bytes: &[u8]) -> Result<RawImage> {
    decode(bytes, "<buffer>")
}

/// Read and decode an image file.
pub fn load_path(path: &Path) -> Result<RawImage> {
    let origin = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| Error::decode(&origin, e))?;
    decode(&bytes, &origin)
}

fn decode(bytes: &[u8], origin: &str) -> Result<RawImage> {
    if bytes.is_empty() {
        return Err(Error::decode(origin, "input is empty"));
    }

    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::decode(origin, e))?
        .decode()
        .map_err(|e| Error::decode(origin, e))?;

    // Phone cameras store rotation in EXIF instead of the pixel grid.
    let orientation = exif_service::read_orientation(bytes);
    let img = exif_service::apply_orientation(img, orientation);

    // Gray, RGBA and 16-bit inputs all collapse to 8-bit RGB here.
    RawImage::new(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, RgbaImage};

    fn encode(img: &image::DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn decodes_png_as_rgb() {
        let img = RgbImage::from_pixel(32, 16, Rgb([200, 10, 30]));
        let bytes = encode(&image::DynamicImage::ImageRgb8(img), ImageFormat::Png);

        let raw = load_bytes(&bytes).unwrap();
        assert_eq!((raw.width(), raw.height()), (32, 16));
        assert_eq!(raw.pixels().get_pixel(5, 5), &Rgb([200, 10, 30]));
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let img = RgbaImage::from_pixel(12, 12, image::Rgba([1, 2, 3, 128]));
        let bytes = encode(&image::DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let raw = load_bytes(&bytes).unwrap();
        assert_eq!(raw.pixels().get_pixel(0, 0), &Rgb([1, 2, 3]));
    }

    #[test]
    fn truncated_jpeg_is_a_decode_error() {
        let img = RgbImage::from_pixel(64, 64, Rgb([90, 160, 60]));
        let bytes = encode(&image::DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

        let err = load_bytes(&bytes[..20]).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn empty_and_garbage_input_fail_to_decode() {
        assert!(matches!(load_bytes(&[]), Err(Error::Decode { .. })));
        assert!(matches!(
            load_bytes(b"definitely not pixels"),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn tiny_image_is_a_dimension_error() {
        let bytes = encode(
            &image::DynamicImage::ImageRgb8(RgbImage::new(9, 9)),
            ImageFormat::Png,
        );
        assert!(matches!(load_bytes(&bytes), Err(Error::Dimension { .. })));
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_path(&dir.path().join("absent.jpg")).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        RgbImage::from_pixel(20, 30, Rgb([0, 255, 0]))
            .save(&path)
            .unwrap();

        let raw = load_path(&path).unwrap();
        assert_eq!((raw.width(), raw.height()), (20, 30));
    }
}
