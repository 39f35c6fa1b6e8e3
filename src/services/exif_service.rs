use image::DynamicImage;
use std::io::Cursor;

// EXIF lives in the first segments of a JPEG; 128KB covers it.
const EXIF_SCAN_LIMIT: usize = 128 * 1024;

/// Read the EXIF orientation tag from an encoded image, defaulting to 1.
pub fn read_orientation(bytes: &[u8]) -> u32 {
    let header = &bytes[..bytes.len().min(EXIF_SCAN_LIMIT)];

    exif::Reader::new()
        .read_from_container(&mut Cursor::new(header))
        .ok()
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .filter(|o| (1..=8).contains(o))
        .unwrap_or(1)
}

/// Undo the camera rotation so pixels are upright; unknown values pass through.
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.fliph().rotate90(),
        6 => img.rotate90(),
        7 => img.fliph().rotate270(),
        8 => img.rotate270(),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn missing_exif_defaults_to_upright() {
        assert_eq!(read_orientation(&[]), 1);
        assert_eq!(read_orientation(b"not an image at all"), 1);
    }

    #[test]
    fn quarter_turns_swap_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        let rotated = apply_orientation(img.clone(), 6);
        assert_eq!((rotated.width(), rotated.height()), (20, 40));
        let mirrored = apply_orientation(img, 2);
        assert_eq!((mirrored.width(), mirrored.height()), (40, 20));
    }
}
