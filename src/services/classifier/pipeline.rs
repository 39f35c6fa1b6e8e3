use crate::error::Result;
use crate::models::classify_types::PredictionResult;
use crate::models::image_types::{EnhancedImage, InputTensor, RawImage, TargetShape};
use crate::models::label_types::LabelRemap;
use crate::services::classifier::inference::InferenceEngine;
use crate::services::classifier::model_manager::{
    self, EngineOptions, ModelBundle, ModelMetadata, ModelVariant,
};
use crate::services::classifier::ranker;
use crate::services::image::{enhancer, loader, preprocess};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// Pipeline switches that do not depend on the model.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub enhance: bool,
    pub relabel: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            enhance: true,
            relabel: true,
        }
    }
}

/// Everything a request needs, built once at startup and never mutated.
pub struct ServingContext {
    engine: Box<dyn InferenceEngine>,
    metadata: ModelMetadata,
    target: TargetShape,
    remap: Option<LabelRemap>,
    enhance: bool,
}

impl ServingContext {
    pub fn new(
        engine: Box<dyn InferenceEngine>,
        metadata: ModelMetadata,
        options: &PipelineOptions,
    ) -> Result<Self> {
        let target = metadata.target_shape()?;
        Ok(Self {
            engine,
            metadata,
            target,
            remap: options.relabel.then(LabelRemap::standard),
            enhance: options.enhance,
        })
    }

    /// Load the model bundle from disk and wrap it.
    pub fn load(
        bundle: &ModelBundle,
        variant: ModelVariant,
        engine_options: &EngineOptions,
        options: &PipelineOptions,
    ) -> Result<Self> {
        let (engine, metadata) = model_manager::load(bundle, variant, engine_options)?;
        Self::new(engine, metadata, options)
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn labels(&self) -> &[String] {
        &self.metadata.class_names
    }

    pub fn variant(&self) -> ModelVariant {
        self.engine.variant()
    }

    /// Classify raw encoded image bytes.
    pub fn classify(&self, bytes: &[u8]) -> Result<PredictionResult> {
        let raw = loader::load_bytes(bytes)?;
        self.classify_image(&raw)
    }

    /// Classify an image file on disk.
    pub fn classify_path(&self, path: &Path) -> Result<PredictionResult> {
        let raw = loader::load_path(path)?;
        self.classify_image(&raw)
    }

    /// Run an already-decoded image through enhancement, inference and ranking.
    pub fn classify_image(&self, raw: &RawImage) -> Result<PredictionResult> {
        let tensor = self.prepare(raw)?;
        let scores = self.infer(tensor)?;
        self.rank(&scores)
    }

    /// Enhancement and preprocessing; safe to run in parallel.
    pub fn prepare(&self, raw: &RawImage) -> Result<InputTensor> {
        let started = Instant::now();
        let enhanced = if self.enhance {
            enhancer::enhance(raw)
        } else {
            EnhancedImage::unenhanced(raw)
        };
        let tensor = preprocess::preprocess(&enhanced, self.target)?;
        debug!(
            width = raw.width(),
            height = raw.height(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "image prepared"
        );
        Ok(tensor)
    }

    pub fn infer(&self, tensor: InputTensor) -> Result<Vec<f32>> {
        let started = Instant::now();
        let scores = self.engine.classify(tensor)?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "model invoked");
        Ok(scores)
    }

    /// Rank scores and apply the presentation relabeling when enabled.
    pub fn rank(&self, scores: &[f32]) -> Result<PredictionResult> {
        let result = ranker::rank(scores, self.labels())?;
        Ok(match &self.remap {
            Some(remap) => result.relabel(remap),
            None => result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::label_types::CLASS_NAMES;
    use crate::services::classifier::inference::stub::FixedEngine;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn metadata() -> ModelMetadata {
        ModelMetadata {
            class_names: CLASS_NAMES.iter().map(|s| s.to_string()).collect(),
            num_classes: 10,
            input_shape: vec![224, 224, 3],
            model_name: "tomato_disease_model".into(),
        }
    }

    fn context(scores: Vec<f32>, options: PipelineOptions) -> ServingContext {
        ServingContext::new(Box::new(FixedEngine::new(scores)), metadata(), &options).unwrap()
    }

    fn png(img: RgbImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn black_image_yields_a_complete_result() {
        let mut scores = vec![0.05f32; 10];
        scores[2] = 0.55;
        let ctx = context(scores, PipelineOptions::default());

        let result = ctx.classify(&png(RgbImage::new(224, 224))).unwrap();
        assert_eq!(result.predicted, "healthy");
        assert_eq!(result.all_predictions.len(), 10);
        assert_eq!(result.top_predictions.len(), 3);
        assert!(result
            .all_predictions
            .contains(&("Tomato___healthy".to_string(), 0.55)));
    }

    #[test]
    fn corrupt_bytes_are_a_decode_error() {
        let ctx = context(vec![0.1; 10], PipelineOptions::default());
        let mut bytes = png(RgbImage::from_pixel(64, 64, Rgb([10, 200, 10])));
        bytes.truncate(30);
        assert!(matches!(ctx.classify(&bytes), Err(Error::Decode { .. })));
    }

    #[test]
    fn prepared_tensor_matches_model_resolution() {
        let ctx = context(vec![0.1; 10], PipelineOptions::default());
        let raw = loader::load_bytes(&png(RgbImage::from_fn(313, 97, |x, y| {
            Rgb([(x % 256) as u8, (y * 2) as u8, 128])
        })))
        .unwrap();

        let tensor = ctx.prepare(&raw).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert!(tensor.view().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn raw_labels_when_relabeling_is_off() {
        let mut scores = vec![0.0f32; 10];
        scores[1] = 1.0;
        let ctx = context(
            scores,
            PipelineOptions {
                enhance: false,
                relabel: false,
            },
        );
        let result = ctx.classify(&png(RgbImage::new(10, 10))).unwrap();
        assert_eq!(result.predicted, "Tomato___Early_blight");
    }

    #[test]
    fn wrong_score_count_surfaces_as_shape_mismatch() {
        let ctx = context(vec![0.5; 4], PipelineOptions::default());
        let err = ctx.classify(&png(RgbImage::new(16, 16))).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { expected: 10, actual: 4 }));
    }
}
