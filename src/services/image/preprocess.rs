use crate::error::{Error, Result};
use crate::models::image_types::{EnhancedImage, InputTensor, TargetShape};
use image::imageops::{self, FilterType};
use ndarray::Array4;

/// Resize straight to the model resolution, scale to [0, 1], add the batch axis.
///
/// Aspect ratio is not preserved; the model was trained on images squashed the same way.
pub fn preprocess(image: &EnhancedImage, target: TargetShape) -> Result<InputTensor> {
    if image.width() == 0 || image.height() == 0 {
        return Err(Error::Dimension {
            width: image.width() as usize,
            height: image.height() as usize,
            channels: 3,
            reason: "image has no pixels".to_string(),
        });
    }

    let resized = imageops::resize(
        image.pixels(),
        target.width,
        target.height,
        FilterType::Triangle,
    );

    let data: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|v| v as f32 / 255.0)
        .collect();

    let tensor = Array4::from_shape_vec(
        (1, target.height as usize, target.width as usize, 3),
        data,
    )
    .map_err(|e| Error::Dimension {
        width: target.width as usize,
        height: target.height as usize,
        channels: 3,
        reason: format!("failed to create tensor: {e}"),
    })?;

    Ok(InputTensor::new(tensor))
}
