use crate::models::label_types::LabelRemap;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RankedPrediction {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f32,
    pub percentage: f32,
}

/// Outcome of classifying one image.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PredictionResult {
    #[serde(rename = "predicted_class")]
    pub predicted: String,
    pub confidence: f32,
    /// Every label with its score, in model output order.
    #[serde(serialize_with = "serialize_ordered_map")]
    pub all_predictions: Vec<(String, f32)>,
    pub top_predictions: Vec<RankedPrediction>,
}

impl PredictionResult {
    /// Swap verbose labels for client keys on the predicted class and top list.
    /// `all_predictions` keeps the model's own labels.
    pub fn relabel(mut self, remap: &LabelRemap) -> Self {
        self.predicted = remap.apply(&self.predicted).to_string();
        for ranked in &mut self.top_predictions {
            ranked.class_name = remap.apply(&ranked.class_name).to_string();
        }
        self
    }
}

fn serialize_ordered_map<S>(entries: &[(String, f32)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (label, score) in entries {
        map.serialize_entry(label, score)?;
    }
    map.end()
}

#[derive(Debug, Serialize, Clone)]
pub struct ModelStatus {
    pub status: &'static str,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}
