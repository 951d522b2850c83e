use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// When a record's rendering is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavePolicy {
    /// Persist every record the first time it is displayed.
    All,
    /// Never persist automatically.
    None,
    /// Persist only on explicit `save_current`.
    Manual,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("save policy already selected for this session ({0})")]
    AlreadySelected(SavePolicy),
    #[error("unknown save policy `{0}` (expected all, none or manual)")]
    Unknown(String),
}

impl SavePolicy {
    pub fn saves_on_display(self) -> bool {
        matches!(self, SavePolicy::All)
    }

    pub fn allows_manual_save(self) -> bool {
        matches!(self, SavePolicy::Manual)
    }
}

impl fmt::Display for SavePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SavePolicy::All => "all",
            SavePolicy::None => "none",
            SavePolicy::Manual => "manual",
        })
    }
}

impl FromStr for SavePolicy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "a" => Ok(SavePolicy::All),
            "none" | "n" => Ok(SavePolicy::None),
            "manual" | "m" => Ok(SavePolicy::Manual),
            other => Err(PolicyError::Unknown(other.to_string())),
        }
    }
}
