use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// One ranked candidate label with its confidence in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    pub label: String,
    pub confidence: f32,
}

/// Result of classifying one image. Immutable once built.
#[derive(Debug, Clone)]
pub struct PredictionRecord {
    origin: PathBuf,
    image: DynamicImage,
    label: String,
    confidence: f32,
    alternatives: Vec<Alternative>,
}

impl PredictionRecord {
    /// Build a record from a raw score vector. Returns `None` for an empty vector.
    pub fn from_scores(
        origin: impl Into<PathBuf>,
        image: DynamicImage,
        scores: &[f32],
        labels: &[String],
        k: usize,
    ) -> Option<Self> {
        let alternatives = rank_top_k(scores, labels, k.max(1));
        let top = alternatives.first()?.clone();
        Some(Self {
            origin: origin.into(),
            image,
            label: top.label,
            confidence: top.confidence,
            alternatives,
        })
    }

    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// File name of the source image, used as the record id in evaluation logs.
    pub fn file_name(&self) -> String {
        self.origin
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.origin.to_string_lossy().into_owned())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Top confidence in [0,1].
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Confidence as a percentage with three decimals, e.g. `"87.125"`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.3}", self.confidence * 100.0)
    }

    /// Ranked candidates, highest confidence first. `alternatives()[0]` is the label.
    pub fn alternatives(&self) -> &[Alternative] {
        &self.alternatives
    }

    /// Human readable headline, e.g. `I am 91.000% sure it's a golden retriever`.
    pub fn headline(&self) -> String {
        format!(
            "I am {}% sure it's a {}",
            self.confidence_percent(),
            self.label.replace('_', " ")
        )
    }
}

/// Rank a score vector and keep the `k` best entries, highest first.
///
/// Ties keep the lower class index first. Scores without a matching label are named
/// `class_{idx}`. NaN scores sort last.
pub fn rank_top_k(scores: &[f32], labels: &[String], k: usize) -> Vec<Alternative> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| compare_desc(scores[a], scores[b]));
    order
        .into_iter()
        .take(k)
        .map(|idx| Alternative {
            label: labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class_{idx}")),
            confidence: scores[idx],
        })
        .collect()
}

fn compare_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
