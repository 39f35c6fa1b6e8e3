//! Runtime configuration assembled from CLI flags and environment.

use crate::services::classifier::model_manager::{
    EngineOptions, ModelBundle, ModelVariant, DEFAULT_MODEL_DIR, DEFAULT_MODEL_NAME,
};
use crate::services::classifier::pipeline::PipelineOptions;
use std::path::PathBuf;

/// Where the model lives and how to run it.
#[derive(Debug, Clone)]
pub struct ServingConfig {
    pub model_dir: PathBuf,
    pub model_name: String,
    pub variant: ModelVariant,
    pub engine: EngineOptions,
    pub pipeline: PipelineOptions,
}

impl ServingConfig {
    pub fn bundle(&self) -> ModelBundle {
        ModelBundle::new(&self.model_dir, &self.model_name)
    }
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            variant: ModelVariant::Quantized,
            engine: EngineOptions::default(),
            pipeline: PipelineOptions::default(),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
    /// Where uploads are staged while they are classified.
    pub upload_dir: PathBuf,
}

impl ServerConfig {
    pub fn max_upload_mb(&self) -> usize {
        self.max_upload_bytes / (1024 * 1024)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: 16 * 1024 * 1024,
            upload_dir: std::env::temp_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_exported_bundle_layout() {
        let config = ServingConfig::default();
        let bundle = config.bundle();
        assert_eq!(
            bundle.weights_path(config.variant),
            PathBuf::from("model/saved_models/tomato_disease_model.quant.onnx")
        );
        assert_eq!(ServerConfig::default().max_upload_mb(), 16);
    }
}
