use crate::error::{Error, Result};
use crate::models::image_types::{InputTensor, TargetShape};
use crate::services::classifier::model_manager::{EngineOptions, ModelMetadata, ModelVariant};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{Value, ValueType};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Something that maps one preprocessed image to per-class scores.
///
/// Implementations must return scores in the label order fixed when the model was
/// loaded and must be shareable across request threads.
pub trait InferenceEngine: Send + Sync {
    fn variant(&self) -> ModelVariant;

    fn classify(&self, input: InputTensor) -> Result<Vec<f32>>;
}

/// ONNX Runtime session behind a mutex; `Session::run` needs exclusive access,
/// so concurrent requests take turns for the duration of one run.
pub struct OnnxEngine {
    session: Mutex<Session>,
    variant: ModelVariant,
    input_name: String,
    input_type: Option<TensorElementType>,
}

impl OnnxEngine {
    pub fn load(
        weights: &Path,
        variant: ModelVariant,
        metadata: &ModelMetadata,
        options: &EngineOptions,
    ) -> Result<Self> {
        let name = metadata.model_name.as_str();
        let _ = ort::init().with_name("tomato-lens").commit();

        let mut builder = Session::builder()
            .map_err(load_error(name, "failed to create session builder"))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(load_error(name, "failed to set optimization level"))?
            .with_intra_threads(options.intra_threads)
            .map_err(load_error(name, "failed to set intra threads"))?;

        let use_gpu = match variant {
            ModelVariant::Full => options.use_gpu,
            ModelVariant::Quantized => {
                if options.use_gpu {
                    warn!("quantized model runs on CPU; ignoring GPU request");
                }
                false
            }
        };

        if use_gpu {
            builder = builder
                .with_execution_providers([
                    ort::execution_providers::CUDAExecutionProvider::default().build(),
                    ort::execution_providers::CoreMLExecutionProvider::default().build(),
                    ort::execution_providers::CPUExecutionProvider::default().build(),
                ])
                .map_err(load_error(name, "failed to register GPU execution providers"))?;
        } else {
            builder = builder
                .with_execution_providers([
                    ort::execution_providers::CPUExecutionProvider::default().build(),
                ])
                .map_err(load_error(name, "failed to register CPU execution provider"))?;
        }

        let session = builder
            .commit_from_file(weights)
            .map_err(load_error(name, "failed to load ONNX model"))?;

        let input = session
            .inputs()
            .first()
            .ok_or_else(|| Error::model_load(name, "model declares no inputs"))?;
        let input_name = input.name().to_string();
        let (input_type, input_dims) = match input.dtype() {
            ValueType::Tensor { ty, shape, .. } => {
                (Some(*ty), shape.iter().copied().collect::<Vec<i64>>())
            }
            _ => (None, Vec::new()),
        };

        check_input_shape(&input_dims, metadata.target_shape()?)
            .map_err(|e| Error::model_load(name, e))?;

        Ok(Self {
            session: Mutex::new(session),
            variant,
            input_name,
            input_type,
        })
    }
}

impl InferenceEngine for OnnxEngine {
    fn variant(&self) -> ModelVariant {
        self.variant
    }

    fn classify(&self, input: InputTensor) -> Result<Vec<f32>> {
        check_input_dtype(self.variant, self.input_type)?;

        let input_tensor = Value::from_array(input.into_array())
            .map_err(|e| Error::Inference(format!("failed to create tensor value: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::Inference("session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| Error::Inference(e.to_string()))?;

        let output_value = outputs
            .values()
            .next()
            .ok_or_else(|| Error::Inference("model produced no outputs".to_string()))?;

        let (_, data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(format!("failed to extract output tensor: {e}")))?;

        let scores = data.to_vec();
        debug!(classes = scores.len(), "inference complete");
        Ok(scores)
    }
}

fn load_error<'a, E: std::fmt::Display>(
    name: &'a str,
    what: &'static str,
) -> impl FnOnce(E) -> Error + 'a {
    move |e| Error::model_load(name, format!("{what}: {e}"))
}

/// The pipeline only ever produces f32 tensors; refuse models declaring anything else.
fn check_input_dtype(variant: ModelVariant, declared: Option<TensorElementType>) -> Result<()> {
    match declared {
        Some(TensorElementType::Float32) => Ok(()),
        Some(other) => Err(Error::DtypeMismatch {
            expected: format!("{other:?}"),
            actual: "Float32".to_string(),
        }),
        None => Err(Error::DtypeMismatch {
            expected: format!("non-tensor input ({variant:?} model)"),
            actual: "Float32".to_string(),
        }),
    }
}

/// Compare a declared NHWC input shape with the descriptor; dynamic dims (< 1) match anything.
fn check_input_shape(declared: &[i64], target: TargetShape) -> Result<()> {
    if declared.is_empty() {
        return Ok(());
    }
    let expected = [1, target.height as i64, target.width as i64, 3];
    let compatible = declared.len() == expected.len()
        && declared
            .iter()
            .zip(expected)
            .all(|(&dim, want)| dim < 1 || dim == want);

    if compatible {
        Ok(())
    } else {
        Err(Error::Dimension {
            width: target.width as usize,
            height: target.height as usize,
            channels: 3,
            reason: format!("model input shape {declared:?} does not match descriptor"),
        })
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns the same scores for every input and counts calls.
    pub struct FixedEngine {
        pub scores: Vec<f32>,
        pub calls: AtomicUsize,
    }

    impl FixedEngine {
        pub fn new(scores: Vec<f32>) -> Self {
            Self {
                scores,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl InferenceEngine for FixedEngine {
        fn variant(&self) -> ModelVariant {
            ModelVariant::Quantized
        }

        fn classify(&self, input: InputTensor) -> Result<Vec<f32>> {
            assert_eq!(input.shape()[0], 1);
            assert_eq!(input.shape()[3], 3);
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(self.scores.clone())
        }
    }
}
