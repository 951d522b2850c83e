//! ONNX Runtime classifier backend (`ort` feature).

use crate::classifier::{Classifier, ClassifierError};
use crate::config::ModelConfig;
use crate::labels::{LabelsError, load_labels};
use image::{DynamicImage, imageops::FilterType};
use ndarray::{Array4, CowArray};
use once_cell::sync::OnceCell;
use ort::{
    GraphOptimizationLevel, SessionBuilder, environment::Environment, session::Session,
    tensor::OrtOwnedTensor, value::Value,
};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

static ORT_ENV: OnceCell<Arc<Environment>> = OnceCell::new();

#[derive(Debug, Error)]
pub enum OnnxError {
    #[error("model file missing: {0}")]
    MissingModel(PathBuf),
    #[error(transparent)]
    Labels(#[from] LabelsError),
    #[error("onnx runtime error: {0}")]
    Runtime(#[from] ort::OrtError),
}

fn environment() -> Result<Arc<Environment>, OnnxError> {
    ORT_ENV
        .get_or_try_init(|| {
            Ok(Environment::builder()
                .with_name("identibreed")
                .build()?
                .into_arc())
        })
        .cloned()
}

/// Image classifier backed by ONNX Runtime.
pub struct OnnxClassifier {
    session: Session,
    labels: Vec<String>,
    input_size: u32,
    channels_last: bool,
    logits: bool,
}

impl OnnxClassifier {
    pub fn new(cfg: &ModelConfig) -> Result<Self, OnnxError> {
        if !cfg.model_path.exists() {
            return Err(OnnxError::MissingModel(cfg.model_path.clone()));
        }
        let labels = load_labels(&cfg.labels_path)?;
        let env = environment()?;
        let session = SessionBuilder::new(&env)?
            .with_optimization_level(GraphOptimizationLevel::Level1)?
            .with_model_from_file(&cfg.model_path)?;
        tracing::info!(
            "loaded model {} with {} labels",
            cfg.model_path.display(),
            labels.len()
        );
        Ok(Self {
            session,
            labels,
            input_size: cfg.input_size,
            channels_last: cfg.channels_last,
            logits: cfg.logits,
        })
    }

    fn prepare_input(&self, img: &DynamicImage) -> Array4<f32> {
        let size = self.input_size as usize;
        let resized = img
            .resize_exact(self.input_size, self.input_size, FilterType::Triangle)
            .to_rgb8();
        let mut array = if self.channels_last {
            Array4::<f32>::zeros((1, size, size, 3))
        } else {
            Array4::<f32>::zeros((1, 3, size, size))
        };
        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for (c, value) in pixel.0.iter().enumerate() {
                let v = *value as f32 / 255.0;
                if self.channels_last {
                    array[[0, y, x, c]] = v;
                } else {
                    array[[0, c, y, x]] = v;
                }
            }
        }
        array
    }
}

impl Classifier for OnnxClassifier {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn classify(&self, image: &DynamicImage) -> Result<Vec<f32>, ClassifierError> {
        let backend = |e: ort::OrtError| ClassifierError::Backend(e.to_string());
        let input_array = self.prepare_input(image).into_dyn();
        let cow = CowArray::from(input_array.view());
        let input = Value::from_array(self.session.allocator(), &cow).map_err(backend)?;
        let outputs: Vec<Value> = self.session.run(vec![input]).map_err(backend)?;
        let first = outputs.first().ok_or(ClassifierError::EmptyOutput)?;
        let tensor: OrtOwnedTensor<f32, _> = first.try_extract().map_err(backend)?;
        let scores: Vec<f32> = tensor.view().iter().cloned().collect();
        if scores.is_empty() {
            return Err(ClassifierError::EmptyOutput);
        }
        Ok(if self.logits { softmax(&scores) } else { scores })
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|x| x / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn softmax_sums_to_one_and_keeps_order() {
        let probs = softmax(&[1.0, 3.0, 2.0]);
        assert_relative_eq!(probs.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert!(probs[1] > probs[2] && probs[2] > probs[0]);
    }

    #[test]
    fn missing_model_is_reported() {
        let cfg = ModelConfig {
            model_path: PathBuf::from("does/not/exist.onnx"),
            ..ModelConfig::default()
        };
        assert!(matches!(
            OnnxClassifier::new(&cfg),
            Err(OnnxError::MissingModel(_))
        ));
    }
}
