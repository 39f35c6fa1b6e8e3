use crate::error::{Error, Result};
use image::RgbImage;
use ndarray::Array4;

/// Smallest accepted edge length, in pixels.
pub const MIN_DIMENSION: u32 = 10;

/// Decoded RGB pixels straight from the loader.
#[derive(Debug, Clone)]
pub struct RawImage {
    pixels: RgbImage,
}

impl RawImage {
    pub fn new(pixels: RgbImage) -> Result<Self> {
        let (width, height) = pixels.dimensions();
        if width < MIN_DIMENSION || height < MIN_DIMENSION {
            return Err(Error::Dimension {
                width: width as usize,
                height: height as usize,
                channels: 3,
                reason: format!("image must be at least {MIN_DIMENSION}x{MIN_DIMENSION} pixels"),
            });
        }
        Ok(Self { pixels })
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Contrast-enhanced copy of a [`RawImage`]; never shares its buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct EnhancedImage {
    pixels: RgbImage,
}

impl EnhancedImage {
    pub(crate) fn from_pixels(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    /// Copy of the raw pixels for pipelines running with enhancement turned off.
    pub fn unenhanced(raw: &RawImage) -> Self {
        Self {
            pixels: raw.pixels.clone(),
        }
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Model input resolution taken from the descriptor's `[height, width, channels]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetShape {
    pub height: u32,
    pub width: u32,
}

impl TargetShape {
    pub fn from_input_shape(shape: &[usize]) -> Result<Self> {
        let dimension_error = |reason: &str| Error::Dimension {
            width: shape.get(1).copied().unwrap_or(0),
            height: shape.first().copied().unwrap_or(0),
            channels: shape.get(2).copied().unwrap_or(0),
            reason: reason.to_string(),
        };

        match *shape {
            [height, width, 3] if height > 0 && width > 0 => Ok(Self {
                height: height as u32,
                width: width as u32,
            }),
            [_, _, 3] => Err(dimension_error("spatial dimensions must be non-zero")),
            [_, _, _] => Err(dimension_error("expected 3 color channels")),
            _ => Err(dimension_error(
                "input shape must be [height, width, channels]",
            )),
        }
    }
}

impl Default for TargetShape {
    fn default() -> Self {
        Self {
            height: 224,
            width: 224,
        }
    }
}

/// NHWC batch of one, values in [0, 1]. Consumed by a single inference call.
#[derive(Debug)]
pub struct InputTensor {
    data: Array4<f32>,
}

impl InputTensor {
    pub(crate) fn new(data: Array4<f32>) -> Self {
        Self { data }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn view(&self) -> ndarray::ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_by_nine_is_rejected() {
        let err = RawImage::new(RgbImage::new(9, 9)).unwrap_err();
        assert!(matches!(err, Error::Dimension { width: 9, height: 9, .. }));
    }

    #[test]
    fn ten_by_ten_is_accepted() {
        let raw = RawImage::new(RgbImage::new(10, 10)).unwrap();
        assert_eq!((raw.width(), raw.height()), (10, 10));
    }

    #[test]
    fn narrow_strip_is_rejected() {
        assert!(RawImage::new(RgbImage::new(500, 9)).is_err());
    }

    #[test]
    fn target_shape_requires_three_channels() {
        assert_eq!(
            TargetShape::from_input_shape(&[224, 224, 3]).unwrap(),
            TargetShape::default()
        );
        assert!(matches!(
            TargetShape::from_input_shape(&[224, 224, 1]),
            Err(Error::Dimension { channels: 1, .. })
        ));
        assert!(TargetShape::from_input_shape(&[224, 3]).is_err());
        assert!(TargetShape::from_input_shape(&[0, 224, 3]).is_err());
    }
}
