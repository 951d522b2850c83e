//! Prediction-session core for IdentiBreed.
//!
//! A batch of dog photos is classified once into [`PredictionRecord`]s, wrapped in a
//! [`PredictionSession`] and then browsed through a [`NavigationController`], which
//! drives the selected [`SavePolicy`] and the optional evaluation gate on every move.

pub mod classifier;
pub mod config;
pub mod correction;
pub mod evaluation;
pub mod labels;
pub mod naming;
pub mod navigation;
#[cfg(feature = "ort")]
pub mod onnx;
pub mod persist;
pub mod policy;
pub mod record;
pub mod render;
pub mod scan;
pub mod session;

pub use classifier::{Classifier, ClassifierError};
pub use config::{AppConfig, ConfigError, ModelConfig};
pub use correction::{CorrectedLabel, CorrectionPrompt, PromptStep, USER_SUBMITTED_PREFIX};
pub use evaluation::{Correctness, EvaluationGate, EvaluationLog, LogEntry, LogError, LogIdentity, Verdict};
pub use labels::{LabelsError, load_labels, normalize_label};
pub use naming::Timestamp;
pub use navigation::{Controls, Judgment, NavState, NavigationController, NavigationError, SaveState, Step};
pub use persist::{
    ArtifactDescriptor, ArtifactKind, FlushOutcome, FsStore, Persistence, PersistError,
};
pub use policy::{PolicyError, SavePolicy};
pub use record::{Alternative, PredictionRecord, rank_top_k};
pub use scan::{ImageBlob, ScanError, ScanOptions, scan_folder, scan_folder_with};
pub use session::{
    DEFAULT_TOP_K, ImageOutcome, PredictionSession, SessionBuild, SessionError, SessionStatus,
    SkipReason, construct_session,
};

#[cfg(feature = "ort")]
pub use onnx::{OnnxClassifier, OnnxError};
