//! Human evaluation of predictions, collected as retraining data.

use crate::correction::CorrectedLabel;
use crate::naming::{self, Timestamp};
use crate::persist::{ArtifactDescriptor, FlushOutcome, PersistError, Persistence};
use crate::record::PredictionRecord;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Label written for an `Unknown` verdict.
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Debug, Error)]
pub enum LogError {
    #[error("record {0} has already been evaluated")]
    AlreadyEvaluated(usize),
    #[error("evaluation log {0} was already submitted")]
    Sealed(LogIdentity),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// The user's judgment of one prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect(CorrectedLabel),
    Unknown,
}

/// Stored correctness flag; an unknown verdict has no flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correctness {
    /// The model was right (`1`).
    Correct,
    /// The user corrected the label (`0`).
    Corrected,
}

impl Correctness {
    pub fn flag(self) -> &'static str {
        match self {
            Correctness::Correct => "1",
            Correctness::Corrected => "0",
        }
    }
}

impl Verdict {
    /// Label the log asserts for `record` under this verdict.
    pub fn asserted_label(&self, record: &PredictionRecord) -> String {
        match self {
            Verdict::Correct => record.label().to_string(),
            Verdict::Incorrect(corrected) => corrected.label(),
            Verdict::Unknown => UNKNOWN_LABEL.to_string(),
        }
    }

    pub fn correctness(&self) -> Option<Correctness> {
        match self {
            Verdict::Correct => Some(Correctness::Correct),
            Verdict::Incorrect(_) => Some(Correctness::Corrected),
            Verdict::Unknown => None,
        }
    }

    /// Submission file name for the photo, or `None` when nothing is submitted.
    pub fn submission_name(&self, record: &PredictionRecord, at: Timestamp) -> Option<String> {
        match self {
            Verdict::Correct => Some(naming::submission_file_name(None, record.label(), at)),
            Verdict::Incorrect(corrected) => Some(naming::submission_file_name(
                corrected.prefix(),
                corrected.bare(),
                at,
            )),
            Verdict::Unknown => None,
        }
    }
}

/// `{user_id}_{YYYYMMDD-HHMMSS}_log`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogIdentity(String);

impl LogIdentity {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn for_user(user_id: &str, at: Timestamp) -> Self {
        Self(naming::log_identity(user_id, at))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the evaluation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Source image name, the record id.
    pub file_name: String,
    /// Submitted copy of the photo, empty when none was stored.
    pub image_snapshot: String,
    pub label: String,
    pub correctness: Option<Correctness>,
}

/// Append-only list of judgments, flushed once when the session is complete.
#[derive(Debug, Clone)]
pub struct EvaluationLog {
    identity: LogIdentity,
    entries: Vec<LogEntry>,
    flushed: Option<FlushOutcome>,
}

impl EvaluationLog {
    pub fn new(identity: LogIdentity) -> Self {
        Self {
            identity,
            entries: Vec::new(),
            flushed: None,
        }
    }

    pub fn identity(&self) -> &LogIdentity {
        &self.identity
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed.is_some()
    }

    pub fn append(&mut self, entry: LogEntry) -> Result<(), LogError> {
        if self.flushed.is_some() {
            return Err(LogError::Sealed(self.identity.clone()));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Persist the log. Repeated calls reach the store again, which skips the write
    /// because a log with this identity already exists.
    pub fn flush<P: Persistence + ?Sized>(&mut self, store: &mut P) -> Result<FlushOutcome, LogError> {
        let outcome = store.flush_log(&self.identity, &self.entries)?;
        if self.flushed.is_none() {
            self.flushed = Some(outcome.clone());
        }
        Ok(outcome)
    }
}

/// Per-index evaluation state layered over navigation.
#[derive(Debug, Clone)]
pub struct EvaluationGate {
    log: EvaluationLog,
    verdicts: BTreeMap<usize, Verdict>,
}

impl EvaluationGate {
    pub fn new(log: EvaluationLog) -> Self {
        Self {
            log,
            verdicts: BTreeMap::new(),
        }
    }

    pub fn log(&self) -> &EvaluationLog {
        &self.log
    }

    pub fn is_pending(&self, index: usize) -> bool {
        !self.verdicts.contains_key(&index)
    }

    pub fn verdict(&self, index: usize) -> Option<&Verdict> {
        self.verdicts.get(&index)
    }

    pub fn evaluated_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.verdicts.keys().copied()
    }

    /// Record the verdict for `index`; each index accepts exactly one.
    pub fn record(
        &mut self,
        index: usize,
        record: &PredictionRecord,
        verdict: Verdict,
        submission: Option<&ArtifactDescriptor>,
    ) -> Result<&LogEntry, LogError> {
        if !self.is_pending(index) {
            return Err(LogError::AlreadyEvaluated(index));
        }
        let entry = LogEntry {
            file_name: record.file_name(),
            image_snapshot: submission
                .map(|d| d.path.to_string_lossy().into_owned())
                .unwrap_or_default(),
            label: verdict.asserted_label(record),
            correctness: verdict.correctness(),
        };
        self.log.append(entry)?;
        self.verdicts.insert(index, verdict);
        let entries = self.log.entries();
        Ok(&entries[entries.len() - 1])
    }

    pub fn flush<P: Persistence + ?Sized>(&mut self, store: &mut P) -> Result<FlushOutcome, LogError> {
        self.log.flush(store)
    }
}
