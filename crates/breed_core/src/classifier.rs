use image::DynamicImage;
use thiserror::Error;

/// Errors raised by a classifier backend for a single image.
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier backend failed: {0}")]
    Backend(String),
    #[error("classifier returned an empty score vector")]
    EmptyOutput,
}

/// Pre-trained image classifier treated as an opaque collaborator.
///
/// `classify` returns one score per entry of `labels()`, in label order. Ranking is
/// done by the session builder. Identical input must yield identical scores.
pub trait Classifier {
    fn labels(&self) -> &[String];

    fn classify(&self, image: &DynamicImage) -> Result<Vec<f32>, ClassifierError>;
}

impl<C: Classifier + ?Sized> Classifier for &C {
    fn labels(&self) -> &[String] {
        (**self).labels()
    }

    fn classify(&self, image: &DynamicImage) -> Result<Vec<f32>, ClassifierError> {
        (**self).classify(image)
    }
}
