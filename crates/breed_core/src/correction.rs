//! Corrected-label prompt used when the user marks a prediction as incorrect.

use crate::labels::normalize_label;

/// Marks a breed label typed by the user that is not in the known vocabulary.
pub const USER_SUBMITTED_PREFIX: &str = "US";

/// Label supplied by the user to replace a wrong prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrectedLabel {
    /// Member of the closed breed vocabulary.
    Known(String),
    /// Free text, unverified until staff review.
    UserSubmitted(String),
}

impl CorrectedLabel {
    /// Label as stored in the evaluation log (`US_` prefixed for free text).
    pub fn label(&self) -> String {
        match self {
            CorrectedLabel::Known(l) => l.clone(),
            CorrectedLabel::UserSubmitted(l) => format!("{USER_SUBMITTED_PREFIX}_{l}"),
        }
    }

    /// Label without any prefix.
    pub fn bare(&self) -> &str {
        match self {
            CorrectedLabel::Known(l) | CorrectedLabel::UserSubmitted(l) => l,
        }
    }

    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            CorrectedLabel::Known(_) => None,
            CorrectedLabel::UserSubmitted(_) => Some(USER_SUBMITTED_PREFIX),
        }
    }
}

/// Outcome of feeding one answer to a [`CorrectionPrompt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptStep {
    /// Nothing usable was typed; ask again without counting an attempt.
    Blank,
    /// Not in the vocabulary and attempts remain; `attempt` is the one just spent.
    Retry { attempt: u32, max: u32 },
    Accepted(CorrectedLabel),
}

/// Finite prompt sequence for a corrected label.
///
/// Vocabulary hits are accepted at once. Unknown names are bounced back until the
/// last attempt, where the answer is taken as a user-submitted label.
#[derive(Debug, Clone)]
pub struct CorrectionPrompt {
    attempt: u32,
    max_attempts: u32,
}

impl CorrectionPrompt {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn attempts_used(&self) -> u32 {
        self.attempt
    }

    pub fn submit(&mut self, answer: &str, vocabulary: &[String]) -> PromptStep {
        let label = normalize_label(answer);
        if label.is_empty() {
            return PromptStep::Blank;
        }
        if vocabulary.iter().any(|known| *known == label) {
            return PromptStep::Accepted(CorrectedLabel::Known(label));
        }
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            PromptStep::Accepted(CorrectedLabel::UserSubmitted(label))
        } else {
            PromptStep::Retry {
                attempt: self.attempt,
                max: self.max_attempts,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vec<String> {
        vec!["beagle".into(), "golden_retriever".into()]
    }

    #[test]
    fn known_breed_is_accepted_immediately() {
        let mut prompt = CorrectionPrompt::new(3);
        assert_eq!(
            prompt.submit("Golden Retriever", &vocab()),
            PromptStep::Accepted(CorrectedLabel::Known("golden_retriever".into()))
        );
    }

    #[test]
    fn blank_answer_does_not_spend_an_attempt() {
        let mut prompt = CorrectionPrompt::new(2);
        assert_eq!(prompt.submit("   ", &vocab()), PromptStep::Blank);
        assert_eq!(prompt.attempts_used(), 0);
    }

    #[test]
    fn unknown_breed_becomes_user_submitted_on_last_attempt() {
        let mut prompt = CorrectionPrompt::new(3);
        assert_eq!(
            prompt.submit("dogo canario", &vocab()),
            PromptStep::Retry { attempt: 1, max: 3 }
        );
        assert_eq!(
            prompt.submit("dogo canario", &vocab()),
            PromptStep::Retry { attempt: 2, max: 3 }
        );
        let step = prompt.submit("Dogo Canario", &vocab());
        let PromptStep::Accepted(label) = step else {
            panic!("expected acceptance, got {step:?}");
        };
        assert_eq!(label.label(), "US_dogo_canario");
        assert_eq!(label.bare(), "dogo_canario");
        assert_eq!(label.prefix(), Some("US"));
    }

    #[test]
    fn single_attempt_accepts_free_text_at_once() {
        let mut prompt = CorrectionPrompt::new(1);
        assert_eq!(
            prompt.submit("azawakh", &vocab()),
            PromptStep::Accepted(CorrectedLabel::UserSubmitted("azawakh".into()))
        );
    }
}
