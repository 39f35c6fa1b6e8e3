use crate::error::{Error, Result};
use crate::models::image_types::TargetShape;
use crate::models::label_types::{is_known_label, NUM_CLASSES};
use crate::services::classifier::inference::{InferenceEngine, OnnxEngine};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

pub const DEFAULT_MODEL_DIR: &str = "model/saved_models";
pub const DEFAULT_MODEL_NAME: &str = "tomato_disease_model";

/// Which exported graph to serve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// Full-precision graph.
    Full,
    /// Reduced-precision export.
    Quantized,
}

impl ModelVariant {
    fn weights_suffix(&self) -> &'static str {
        match self {
            ModelVariant::Full => "onnx",
            ModelVariant::Quantized => "quant.onnx",
        }
    }
}

/// Sidecar descriptor saved next to the weights by the training tooling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    pub class_names: Vec<String>,
    pub num_classes: usize,
    pub input_shape: Vec<usize>,
    pub model_name: String,
}

impl ModelMetadata {
    pub fn from_json(name: &str, content: &str) -> Result<Self> {
        let metadata: ModelMetadata = serde_json::from_str(content)
            .map_err(|e| Error::model_load(name, format!("invalid descriptor: {e}")))?;
        metadata.validate()?;
        Ok(metadata)
    }

    fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(Error::model_load(&self.model_name, reason));

        if self.num_classes != NUM_CLASSES {
            return fail(format!(
                "descriptor declares {} classes, expected {NUM_CLASSES}",
                self.num_classes
            ));
        }
        if self.class_names.len() != self.num_classes {
            return fail(format!(
                "descriptor lists {} class names for {} classes",
                self.class_names.len(),
                self.num_classes
            ));
        }
        if let Some(unknown) = self.class_names.iter().find(|n| !is_known_label(n)) {
            return fail(format!("unknown class label {unknown:?}"));
        }
        let distinct: HashSet<&String> = self.class_names.iter().collect();
        if distinct.len() != self.class_names.len() {
            return fail("class names contain duplicates".to_string());
        }
        self.target_shape()
            .map_err(|e| Error::model_load(&self.model_name, e))?;
        Ok(())
    }

    pub fn target_shape(&self) -> Result<TargetShape> {
        TargetShape::from_input_shape(&self.input_shape)
    }
}

/// Runtime knobs for building a session.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub use_gpu: bool,
    pub intra_threads: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            use_gpu: false,
            intra_threads: 4,
        }
    }
}

/// Files making up one exported model in a model directory.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub model_dir: PathBuf,
    pub model_name: String,
}

impl ModelBundle {
    pub fn new(model_dir: impl Into<PathBuf>, model_name: impl Into<String>) -> Self {
        Self {
            model_dir: model_dir.into(),
            model_name: model_name.into(),
        }
    }

    pub fn weights_path(&self, variant: ModelVariant) -> PathBuf {
        self.model_dir
            .join(format!("{}.{}", self.model_name, variant.weights_suffix()))
    }

    pub fn descriptor_path(&self) -> PathBuf {
        self.model_dir
            .join(format!("{}_metadata.json", self.model_name))
    }

    pub fn read_metadata(&self) -> Result<ModelMetadata> {
        let path = self.descriptor_path();
        require_file(&path)?;
        let content = std::fs::read_to_string(&path)
            .map_err(|e| {
                let reason = format!("failed to read {}: {e}", path.display());
                Error::model_load(&self.model_name, reason)
            })?;
        ModelMetadata::from_json(&self.model_name, &content)
    }
}

/// Load weights and descriptor for `variant`, returning the engine and its metadata.
pub fn load(
    bundle: &ModelBundle,
    variant: ModelVariant,
    options: &EngineOptions,
) -> Result<(Box<dyn InferenceEngine>, ModelMetadata)> {
    let weights = bundle.weights_path(variant);
    require_file(&weights)?;
    let metadata = bundle.read_metadata()?;

    let started = Instant::now();
    let engine = OnnxEngine::load(&weights, variant, &metadata, options)?;
    info!(
        model = %metadata.model_name,
        ?variant,
        path = %weights.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "model loaded"
    );

    Ok((Box::new(engine), metadata))
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::ModelNotFound {
            path: path.to_path_buf(),
        })
    }
}
