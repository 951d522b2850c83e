//! Navigation controller: the single owner of the active session.
//!
//! Every move runs to completion on the caller's thread: the cursor changes, the save
//! policy side effect fires for the new index, and the evaluation gate (when attached)
//! decides whether forward navigation stays blocked. Front-ends render [`Controls`]
//! and never toggle state themselves.

use crate::evaluation::{EvaluationGate, EvaluationLog, LogEntry, LogError, Verdict};
use crate::naming::Timestamp;
use crate::persist::{ArtifactDescriptor, ArtifactKind, FlushOutcome, Persistence};
use crate::policy::SavePolicy;
use crate::record::PredictionRecord;
use crate::session::{PredictionSession, SessionError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("no active session")]
    NotActive,
    #[error("select a save policy before browsing predictions")]
    PolicyNotSelected,
    #[error("cannot move {direction} from record {cursor} of {len}")]
    OutOfRange {
        direction: &'static str,
        cursor: usize,
        len: usize,
    },
    #[error("record {0} must be evaluated before moving on")]
    EvaluationPending(usize),
    #[error("evaluation is not enabled for this session")]
    NoEvaluation,
    #[error("manual saving is not available with the `{0}` save policy")]
    ManualSaveUnavailable(SavePolicy),
    #[error("the evaluation log can only be submitted once the last record is evaluated")]
    SubmitUnavailable,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Log(#[from] LogError),
}

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    Inactive,
    Active { cursor: usize, len: usize },
}

/// Which user actions are currently allowed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Controls {
    pub previous: bool,
    pub next: bool,
    pub save: bool,
    pub evaluation_pending: bool,
    pub submit: bool,
}

/// Persistence status of the displayed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    Unsaved,
    Saved(ArtifactDescriptor),
    /// The save policy tried to persist and the write failed.
    Failed(String),
}

/// What to display after arriving at a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub index: usize,
    pub len: usize,
    pub save: SaveState,
    pub verdict: Option<Verdict>,
}

impl Step {
    /// One-based position, e.g. `2/5`.
    pub fn counter(&self) -> String {
        format!("{}/{}", self.index + 1, self.len)
    }
}

/// Result of judging the current record.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub entry: LogEntry,
    pub submission: Option<ArtifactDescriptor>,
    /// The step taken by the automatic advance, `None` on the last record.
    pub advanced: Option<Step>,
}

/// Holds at most one [`PredictionSession`] and is the only writer of its cursor,
/// saved set and evaluation state.
pub struct NavigationController<P> {
    store: P,
    session: Option<PredictionSession>,
    cursor: Option<usize>,
    gate: Option<EvaluationGate>,
    clock: fn() -> Timestamp,
}

impl<P: Persistence> NavigationController<P> {
    pub fn new(store: P) -> Self {
        Self {
            store,
            session: None,
            cursor: None,
            gate: None,
            clock: Timestamp::now,
        }
    }

    /// Replace the wall clock used for artifact names.
    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn session(&self) -> Option<&PredictionSession> {
        self.session.as_ref()
    }

    pub fn gate(&self) -> Option<&EvaluationGate> {
        self.gate.as_ref()
    }

    pub fn state(&self) -> NavState {
        match (&self.session, self.cursor) {
            (Some(session), Some(cursor)) => NavState::Active {
                cursor,
                len: session.len(),
            },
            _ => NavState::Inactive,
        }
    }

    pub fn current_record(&self) -> Option<&PredictionRecord> {
        let cursor = self.cursor?;
        self.session.as_ref()?.record(cursor)
    }

    /// Take ownership of `session` and show its first record.
    ///
    /// Any previous session is deactivated first. An empty session is held but stays
    /// inert (`Ok(None)`, every control disabled); a non-empty one needs a selected
    /// save policy and is dropped otherwise.
    pub fn activate(
        &mut self,
        session: PredictionSession,
        evaluation: Option<EvaluationLog>,
    ) -> Result<Option<Step>, NavigationError> {
        self.deactivate();
        if session.is_empty() {
            tracing::info!("activated an empty session; navigation stays disabled");
            self.session = Some(session);
            return Ok(None);
        }
        if session.policy().is_none() {
            return Err(NavigationError::PolicyNotSelected);
        }
        tracing::info!(
            "session activated with {} record(s), policy {}, evaluation {}",
            session.len(),
            session.policy().map(|p| p.to_string()).unwrap_or_default(),
            if evaluation.is_some() { "on" } else { "off" }
        );
        self.session = Some(session);
        self.gate = evaluation.map(EvaluationGate::new);
        self.arrive(0).map(Some)
    }

    /// Leave the active state and hand the session back.
    pub fn deactivate(&mut self) -> Option<PredictionSession> {
        if let Some(gate) = self.gate.take()
            && !gate.log().is_flushed()
            && !gate.log().entries().is_empty()
        {
            tracing::warn!(
                "discarding {} unsubmitted evaluation(s) from {}",
                gate.log().entries().len(),
                gate.log().identity()
            );
        }
        self.cursor = None;
        self.session.take()
    }

    pub fn next(&mut self) -> Result<Step, NavigationError> {
        let (cursor, len) = self.active()?;
        if cursor + 1 >= len {
            return Err(NavigationError::OutOfRange {
                direction: "forward",
                cursor,
                len,
            });
        }
        if self.is_pending(cursor) {
            return Err(NavigationError::EvaluationPending(cursor));
        }
        self.arrive(cursor + 1)
    }

    pub fn previous(&mut self) -> Result<Step, NavigationError> {
        let (cursor, len) = self.active()?;
        if cursor == 0 {
            return Err(NavigationError::OutOfRange {
                direction: "backward",
                cursor,
                len,
            });
        }
        self.arrive(cursor - 1)
    }

    /// Persist the current record under the manual policy. Repeat calls return the
    /// descriptor of the first write.
    pub fn save_current(&mut self) -> Result<ArtifactDescriptor, NavigationError> {
        let (cursor, _) = self.active()?;
        let at = (self.clock)();
        let session = self.session.as_mut().ok_or(NavigationError::NotActive)?;
        match session.policy() {
            Some(SavePolicy::Manual) => Ok(session.persist(cursor, &mut self.store, at)?),
            Some(other) => Err(NavigationError::ManualSaveUnavailable(other)),
            None => Err(NavigationError::PolicyNotSelected),
        }
    }

    /// Record the user's verdict for the current record and advance when possible.
    ///
    /// Correct and incorrect verdicts submit a copy of the photo first; if that write
    /// fails nothing is recorded.
    pub fn judge(&mut self, verdict: Verdict) -> Result<Judgment, NavigationError> {
        let (cursor, len) = self.active()?;
        let gate = self.gate.as_mut().ok_or(NavigationError::NoEvaluation)?;
        if !gate.is_pending(cursor) {
            return Err(LogError::AlreadyEvaluated(cursor).into());
        }
        let record = self
            .session
            .as_ref()
            .and_then(|s| s.record(cursor))
            .ok_or(NavigationError::NotActive)?;

        let submission = match verdict.submission_name(record, (self.clock)()) {
            Some(name) => {
                let photo = record.image().to_rgb8();
                let descriptor = self
                    .store
                    .persist_artifact(ArtifactKind::Submission, &photo, &name)
                    .map_err(|e| NavigationError::Session(e.into()))?;
                Some(descriptor)
            }
            None => None,
        };
        let entry = gate
            .record(cursor, record, verdict, submission.as_ref())?
            .clone();
        tracing::debug!("record {cursor} judged as {:?}", entry.correctness);

        let advanced = if cursor + 1 < len {
            Some(self.arrive(cursor + 1)?)
        } else {
            None
        };
        Ok(Judgment {
            entry,
            submission,
            advanced,
        })
    }

    /// Flush the evaluation log. Only offered on the last record once it is judged;
    /// repeat submissions are no-ops at the store.
    pub fn submit_log(&mut self) -> Result<FlushOutcome, NavigationError> {
        if !self.controls().submit {
            return match self.gate {
                None => Err(NavigationError::NoEvaluation),
                Some(_) => Err(NavigationError::SubmitUnavailable),
            };
        }
        let gate = self.gate.as_mut().ok_or(NavigationError::NoEvaluation)?;
        Ok(gate.flush(&mut self.store)?)
    }

    pub fn controls(&self) -> Controls {
        let (cursor, len) = match self.state() {
            NavState::Active { cursor, len } => (cursor, len),
            NavState::Inactive => return Controls::default(),
        };
        let pending = self.is_pending(cursor);
        let manual = self
            .session
            .as_ref()
            .and_then(|s| s.policy())
            .is_some_and(SavePolicy::allows_manual_save);
        Controls {
            previous: cursor > 0,
            next: cursor + 1 < len && !pending,
            save: manual,
            evaluation_pending: pending,
            submit: self.gate.is_some() && cursor + 1 == len && !pending,
        }
    }

    fn active(&self) -> Result<(usize, usize), NavigationError> {
        match self.state() {
            NavState::Active { cursor, len } => Ok((cursor, len)),
            NavState::Inactive => Err(NavigationError::NotActive),
        }
    }

    fn is_pending(&self, index: usize) -> bool {
        self.gate.as_ref().is_some_and(|g| g.is_pending(index))
    }

    fn arrive(&mut self, index: usize) -> Result<Step, NavigationError> {
        let at = (self.clock)();
        let session = self.session.as_mut().ok_or(NavigationError::NotActive)?;
        let len = session.len();
        if index >= len {
            return Err(SessionError::OutOfRange { index, len }.into());
        }
        self.cursor = Some(index);

        let save = if session.policy().is_some_and(SavePolicy::saves_on_display) {
            match session.persist(index, &mut self.store, at) {
                Ok(descriptor) => SaveState::Saved(descriptor),
                Err(e) => {
                    tracing::warn!("saving record {index} failed: {e}");
                    SaveState::Failed(e.to_string())
                }
            }
        } else {
            match session.saved(index) {
                Some(descriptor) => SaveState::Saved(descriptor.clone()),
                None => SaveState::Unsaved,
            }
        };
        let verdict = self.gate.as_ref().and_then(|g| g.verdict(index).cloned());
        tracing::debug!("cursor at {}/{}", index + 1, len);
        Ok(Step {
            index,
            len,
            save,
            verdict,
        })
    }
}
