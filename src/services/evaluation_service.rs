use crate::error::{Error, Result};
use crate::services::classifier::model_manager::ModelVariant;
use crate::services::classifier::pipeline::ServingContext;
use crate::services::classifier::ranker;
use crate::services::fs_service;
use crate::services::image::loader;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{info, warn};

const PROGRESS_EVERY: usize = 50;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f32,
    pub recall: f32,
    pub f1_score: f32,
    pub support: usize,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct AverageMetrics {
    pub precision: f32,
    pub recall: f32,
    pub f1_score: f32,
}

#[derive(Debug, Serialize, Clone)]
pub struct SkippedFile {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize, Clone)]
pub struct EvaluationReport {
    pub model_name: String,
    pub variant: ModelVariant,
    pub samples: usize,
    pub skipped: Vec<SkippedFile>,
    pub accuracy: f32,
    pub per_class: Vec<ClassMetrics>,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
    /// Rows are true classes, columns predicted classes, both in label order.
    pub confusion_matrix: Vec<Vec<usize>>,
}

/// Labelled images under `<data_dir>/test/<label>/`, or `<data_dir>/<label>/`
/// when there is no `test` split.
pub fn collect_samples(labels: &[String], data_dir: &Path) -> Result<Vec<(PathBuf, usize)>> {
    let test_dir = data_dir.join("test");
    let root = if test_dir.is_dir() { test_dir } else { data_dir.to_path_buf() };

    let mut samples = Vec::new();
    for class_dir in fs_service::list_subdirectories(&root)? {
        let name = class_dir
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let Some(index) = labels.iter().position(|l| *l == name) else {
            warn!(directory = %class_dir.display(), "skipping directory that is not a known class");
            continue;
        };
        for path in fs_service::list_image_files(&class_dir)? {
            samples.push((path, index));
        }
    }
    Ok(samples)
}

/// Classify every labelled test image and score the model.
pub fn evaluate(ctx: &ServingContext, data_dir: &Path) -> Result<EvaluationReport> {
    let labels = ctx.labels();
    let samples = collect_samples(labels, data_dir)?;
    if samples.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "no labelled images found under {}",
            data_dir.display()
        )));
    }

    let total = samples.len();
    info!(total, data_dir = %data_dir.display(), "evaluating model");
    let done = AtomicUsize::new(0);
    let started = Instant::now();

    // Decoding and enhancement run in parallel; the engine serializes the runs itself.
    let outcomes: Vec<(usize, std::result::Result<usize, SkippedFile>)> = samples
        .par_iter()
        .map(|(path, truth)| {
            let predicted = predict_index(ctx, path).map_err(|e| SkippedFile {
                path: path.display().to_string(),
                error: e.to_string(),
            });

            let count = done.fetch_add(1, Ordering::Relaxed) + 1;
            if count % PROGRESS_EVERY == 0 || count == total {
                let elapsed = started.elapsed().as_secs_f64();
                let remaining = elapsed / count as f64 * total.saturating_sub(count) as f64;
                info!(count, total, remaining_secs = remaining as u64, "evaluation progress");
            }

            (*truth, predicted)
        })
        .collect();

    let mut pairs = Vec::with_capacity(outcomes.len());
    let mut skipped = Vec::new();
    for (truth, outcome) in outcomes {
        match outcome {
            Ok(predicted) => pairs.push((truth, predicted)),
            Err(skip) => {
                warn!(path = %skip.path, error = %skip.error, "failed to classify test image");
                skipped.push(skip);
            }
        }
    }

    let mut report = score(labels, &pairs);
    report.model_name = ctx.metadata().model_name.clone();
    report.variant = ctx.variant();
    report.skipped = skipped;
    info!(
        samples = report.samples,
        accuracy = report.accuracy,
        elapsed_secs = started.elapsed().as_secs(),
        "evaluation finished"
    );
    Ok(report)
}

fn predict_index(ctx: &ServingContext, path: &Path) -> Result<usize> {
    let raw = loader::load_path(path)?;
    let tensor = ctx.prepare(&raw)?;
    let scores = ctx.infer(tensor)?;
    let ranking = ranker::rank(&scores, ctx.labels())?;
    ctx.labels()
        .iter()
        .position(|l| *l == ranking.predicted)
        .ok_or_else(|| Error::Inference(format!("unknown predicted label {}", ranking.predicted)))
}

/// Accuracy, per-class metrics and confusion matrix for `(truth, predicted)` index pairs.
pub fn score(labels: &[String], pairs: &[(usize, usize)]) -> EvaluationReport {
    let n = labels.len();
    let mut matrix = vec![vec![0usize; n]; n];
    for &(truth, predicted) in pairs {
        if truth < n && predicted < n {
            matrix[truth][predicted] += 1;
        }
    }

    let samples: usize = matrix.iter().flatten().sum();
    let correct: usize = (0..n).map(|i| matrix[i][i]).sum();

    let per_class: Vec<ClassMetrics> = (0..n)
        .map(|i| {
            let tp = matrix[i][i] as f32;
            let support: usize = matrix[i].iter().sum();
            let predicted: usize = matrix.iter().map(|row| row[i]).sum();
            let precision = ratio(tp, predicted as f32);
            let recall = ratio(tp, support as f32);
            let f1_score = ratio(2.0 * precision * recall, precision + recall);
            ClassMetrics {
                label: labels[i].clone(),
                precision,
                recall,
                f1_score,
                support,
            }
        })
        .collect();

    let macro_avg = average(&per_class, |_| 1.0);
    let weighted_avg = average(&per_class, |m| m.support as f32);

    EvaluationReport {
        model_name: String::new(),
        variant: ModelVariant::Full,
        samples,
        skipped: Vec::new(),
        accuracy: ratio(correct as f32, samples as f32),
        per_class,
        macro_avg,
        weighted_avg,
        confusion_matrix: matrix,
    }
}

fn ratio(num: f32, den: f32) -> f32 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn average(metrics: &[ClassMetrics], weight: impl Fn(&ClassMetrics) -> f32) -> AverageMetrics {
    let total: f32 = metrics.iter().map(&weight).sum();
    let weighted = |field: fn(&ClassMetrics) -> f32| {
        ratio(metrics.iter().map(|m| field(m) * weight(m)).sum(), total)
    };
    AverageMetrics {
        precision: weighted(|m| m.precision),
        recall: weighted(|m| m.recall),
        f1_score: weighted(|m| m.f1_score),
    }
}
