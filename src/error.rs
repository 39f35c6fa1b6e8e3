use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the classification pipeline and model loading.
#[derive(Debug, Error)]
pub enum Error {
    /// Input bytes or file could not be decoded as an image.
    #[error("failed to decode image {origin}: {reason}")]
    Decode { origin: String, reason: String },

    /// Image or tensor shape violates the pipeline's dimension rules.
    #[error("invalid image dimensions {width}x{height}x{channels}: {reason}")]
    Dimension {
        width: usize,
        height: usize,
        channels: usize,
        reason: String,
    },

    /// Weights or descriptor file missing from the model directory.
    #[error("model file not found: {}", path.display())]
    ModelNotFound { path: PathBuf },

    /// Weights or descriptor present but unusable.
    #[error("failed to load model {name}: {reason}")]
    ModelLoad { name: String, reason: String },

    /// Input precision does not match what the runtime was exported for.
    #[error("input dtype mismatch: model expects {expected}, pipeline provides {actual}")]
    DtypeMismatch { expected: String, actual: String },

    /// Score vector and label list disagree in length.
    #[error("score vector has {actual} entries but {expected} labels are loaded")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("failed to encode thumbnail: {0}")]
    Thumbnail(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn decode(origin: impl Into<String>, reason: impl ToString) -> Self {
        Error::Decode {
            origin: origin.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn model_load(name: impl Into<String>, reason: impl ToString) -> Self {
        Error::ModelLoad {
            name: name.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures caused by the submitted image rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Decode { .. } | Error::Dimension { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_decode_and_dimension_only() {
        assert!(Error::decode("upload", "bad header").is_client_error());
        assert!(Error::Dimension {
            width: 9,
            height: 9,
            channels: 3,
            reason: "too small".into(),
        }
        .is_client_error());
        assert!(!Error::Inference("boom".into()).is_client_error());
        assert!(!Error::ShapeMismatch { expected: 10, actual: 9 }.is_client_error());
    }

    #[test]
    fn model_not_found_mentions_path() {
        let err = Error::ModelNotFound {
            path: PathBuf::from("models/tomato.onnx"),
        };
        assert!(err.to_string().contains("models/tomato.onnx"));
    }
}
