//! Artifact and log naming conventions.

use chrono::{Local, NaiveDateTime};
use std::fmt;

const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Second-resolution wall-clock stamp embedded in artifact names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    pub fn now() -> Self {
        Self(Local::now().naive_local())
    }

    pub fn from_naive(at: NaiveDateTime) -> Self {
        Self(at)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_FORMAT))
    }
}

/// `{label}_{confidence}%_{YYYYMMDD-HHMMSS}.jpg`
pub fn prediction_file_name(label: &str, confidence_percent: &str, at: Timestamp) -> String {
    format!("{label}_{confidence_percent}%_{at}.jpg")
}

/// `{label}_{ts}.jpg`, or `{prefix}_{label}_{ts}.jpg` for unverified labels.
pub fn submission_file_name(prefix: Option<&str>, label: &str, at: Timestamp) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}_{label}_{at}.jpg"),
        None => format!("{label}_{at}.jpg"),
    }
}

/// `{user_id}_{ts}_log`
pub fn log_identity(user_id: &str, at: Timestamp) -> String {
    format!("{user_id}_{at}_log")
}

#[cfg(test)]
pub(crate) fn fixed(h: u32, m: u32, s: u32) -> Timestamp {
    use chrono::NaiveDate;
    let at = NaiveDate::from_ymd_opt(2023, 5, 11)
        .and_then(|d| d.and_hms_opt(h, m, s))
        .unwrap();
    Timestamp::from_naive(at)
}
