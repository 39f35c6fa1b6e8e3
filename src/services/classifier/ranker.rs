use crate::error::{Error, Result};
use crate::models::classify_types::{PredictionResult, RankedPrediction};
use crate::models::label_types::TOP_K;
use std::cmp::Ordering;

/// Turn a score vector into a ranked prediction over `labels` (index aligned).
///
/// Ordering is by score descending, ties going to the lower label index, so equal
/// scores always rank the same way. NaN scores sort last.
pub fn rank(scores: &[f32], labels: &[String]) -> Result<PredictionResult> {
    if scores.len() != labels.len() {
        return Err(Error::ShapeMismatch {
            expected: labels.len(),
            actual: scores.len(),
        });
    }
    if scores.is_empty() {
        return Err(Error::ShapeMismatch {
            expected: 1,
            actual: 0,
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| compare_scores(scores[b], scores[a]).then(a.cmp(&b)));

    let best = order[0];
    let top_predictions = order
        .iter()
        .take(TOP_K)
        .map(|&idx| RankedPrediction {
            class_name: labels[idx].clone(),
            confidence: scores[idx],
            percentage: scores[idx] * 100.0,
        })
        .collect();

    Ok(PredictionResult {
        predicted: labels[best].clone(),
        confidence: scores[best],
        all_predictions: labels.iter().cloned().zip(scores.iter().copied()).collect(),
        top_predictions,
    })
}

fn compare_scores(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}
