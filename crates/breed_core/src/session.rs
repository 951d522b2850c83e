use crate::classifier::Classifier;
use crate::naming::{self, Timestamp};
use crate::persist::{ArtifactDescriptor, ArtifactKind, PersistError, Persistence};
use crate::policy::{PolicyError, SavePolicy};
use crate::record::PredictionRecord;
use crate::render::render_prediction_card;
use crate::scan::ImageBlob;
use image::DynamicImage;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Number of ranked alternatives kept per record.
pub const DEFAULT_TOP_K: usize = 5;

/// Why an image contributed no record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("could not decode image: {0}")]
    Decode(String),
    #[error("classifier failed: {0}")]
    Classifier(String),
    #[error("classifier returned no scores")]
    NoScores,
}

/// Per-image result of session construction.
#[derive(Debug)]
pub enum ImageOutcome {
    Ready(PredictionRecord),
    Skip { origin: PathBuf, reason: SkipReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No image could be decoded and classified.
    Empty,
    Filled,
}

/// Output of [`construct_session`].
#[derive(Debug)]
pub struct SessionBuild {
    pub session: PredictionSession,
    pub status: SessionStatus,
    pub skipped: Vec<(PathBuf, SkipReason)>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("record index {index} out of range for a session of {len}")]
    OutOfRange { index: usize, len: usize },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Classify a batch of images into a session.
///
/// Decoding runs in parallel and keeps input order; classification is sequential.
/// Failing images are logged and skipped, never propagated.
pub fn construct_session<C: Classifier + ?Sized>(
    blobs: Vec<ImageBlob>,
    classifier: &C,
    top_k: usize,
) -> SessionBuild {
    let total = blobs.len();
    tracing::info!("predicting dog breeds for {total} image(s)");
    let decoded: Vec<(PathBuf, Result<DynamicImage, SkipReason>)> = blobs
        .into_par_iter()
        .map(|blob| {
            let img = image::load_from_memory(&blob.bytes)
                .map_err(|e| SkipReason::Decode(e.to_string()));
            (blob.origin, img)
        })
        .collect();

    let mut records = Vec::with_capacity(total);
    let mut skipped = Vec::new();
    for (origin, img) in decoded {
        match classify_one(origin, img, classifier, top_k) {
            ImageOutcome::Ready(record) => records.push(record),
            ImageOutcome::Skip { origin, reason } => {
                tracing::warn!("skipping {}: {reason}", origin.display());
                skipped.push((origin, reason));
            }
        }
    }

    let status = if records.is_empty() {
        SessionStatus::Empty
    } else {
        SessionStatus::Filled
    };
    tracing::info!(
        "prediction complete: {} record(s), {} skipped",
        records.len(),
        skipped.len()
    );
    SessionBuild {
        session: PredictionSession::new(records),
        status,
        skipped,
    }
}

fn classify_one<C: Classifier + ?Sized>(
    origin: PathBuf,
    img: Result<DynamicImage, SkipReason>,
    classifier: &C,
    top_k: usize,
) -> ImageOutcome {
    let img = match img {
        Ok(img) => img,
        Err(reason) => return ImageOutcome::Skip { origin, reason },
    };
    let scores = match classifier.classify(&img) {
        Ok(scores) => scores,
        Err(e) => {
            return ImageOutcome::Skip {
                origin,
                reason: SkipReason::Classifier(e.to_string()),
            };
        }
    };
    match PredictionRecord::from_scores(origin.clone(), img, &scores, classifier.labels(), top_k) {
        Some(record) => ImageOutcome::Ready(record),
        None => ImageOutcome::Skip {
            origin,
            reason: SkipReason::NoScores,
        },
    }
}

/// One classified batch plus its save bookkeeping.
#[derive(Debug)]
pub struct PredictionSession {
    records: Vec<PredictionRecord>,
    policy: Option<SavePolicy>,
    saved: BTreeMap<usize, ArtifactDescriptor>,
}

impl PredictionSession {
    pub fn new(records: Vec<PredictionRecord>) -> Self {
        Self {
            records,
            policy: None,
            saved: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&PredictionRecord> {
        self.records.get(index)
    }

    pub fn policy(&self) -> Option<SavePolicy> {
        self.policy
    }

    /// Lock in the save policy. Only the first call succeeds.
    pub fn select_policy(&mut self, policy: SavePolicy) -> Result<(), PolicyError> {
        if let Some(current) = self.policy {
            return Err(PolicyError::AlreadySelected(current));
        }
        tracing::debug!("save policy selected: {policy}");
        self.policy = Some(policy);
        Ok(())
    }

    pub fn saved(&self, index: usize) -> Option<&ArtifactDescriptor> {
        self.saved.get(&index)
    }

    pub fn saved_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.saved.keys().copied()
    }

    /// Persist the prediction card for `index` once; later calls return the cached
    /// descriptor without writing.
    pub fn persist<P: Persistence + ?Sized>(
        &mut self,
        index: usize,
        store: &mut P,
        at: Timestamp,
    ) -> Result<ArtifactDescriptor, SessionError> {
        if let Some(existing) = self.saved.get(&index) {
            return Ok(existing.clone());
        }
        let record = self.records.get(index).ok_or(SessionError::OutOfRange {
            index,
            len: self.records.len(),
        })?;
        let name = naming::prediction_file_name(record.label(), &record.confidence_percent(), at);
        let card = render_prediction_card(record);
        let descriptor = store.persist_artifact(ArtifactKind::Prediction, &card, &name)?;
        tracing::info!("{}", descriptor.status_line());
        self.saved.insert(index, descriptor.clone());
        Ok(descriptor)
    }
}
