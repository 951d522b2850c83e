//! `config.toml` handling.

use crate::persist::FsStore;
use crate::policy::SavePolicy;
use crate::session::DEFAULT_TOP_K;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Classifier model files and preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    pub labels_path: PathBuf,
    pub input_size: u32,
    /// NHWC input layout when true, NCHW otherwise.
    pub channels_last: bool,
    /// Model emits logits that still need a softmax.
    pub logits: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/identibreed.onnx"),
            labels_path: PathBuf::from("data/labels.csv"),
            input_size: 224,
            channels_last: true,
            logits: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Anonymous id embedded in evaluation log names.
    pub user_id: String,
    pub output_dir: PathBuf,
    pub submissions_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub download_dir: PathBuf,
    pub model: ModelConfig,
    pub top_k: usize,
    /// Answers allowed before an unknown breed is taken as user-submitted.
    pub correction_attempts: u32,
    /// Page opened after an evaluation log is submitted.
    pub submission_url: Option<String>,
    pub default_policy: Option<SavePolicy>,
    pub evaluate: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_id: String::new(),
            output_dir: PathBuf::from("user/output"),
            submissions_dir: PathBuf::from("data/user_submissions"),
            logs_dir: PathBuf::from("data/evaluation_logs"),
            download_dir: PathBuf::from("user/downloads"),
            model: ModelConfig::default(),
            top_k: DEFAULT_TOP_K,
            correction_attempts: 3,
            submission_url: None,
            default_policy: None,
            evaluate: false,
        }
    }
}

impl AppConfig {
    /// Load `path`, or create it with defaults and a fresh user id when missing.
    /// A config without a user id gets one assigned and written back.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load(path)?
        } else {
            tracing::info!("no config at {}, writing defaults", path.display());
            Self::default()
        };
        if config.user_id.trim().is_empty() {
            config.user_id = generate_user_id();
            config.save(path)?;
        }
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).map_err(write_err)
    }

    /// Resolve relative directories and model files against `base`.
    pub fn rooted_at(mut self, base: &Path) -> Self {
        for dir in [
            &mut self.output_dir,
            &mut self.submissions_dir,
            &mut self.logs_dir,
            &mut self.download_dir,
            &mut self.model.model_path,
            &mut self.model.labels_path,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
        self
    }

    pub fn store(&self) -> FsStore {
        FsStore::new(&self.output_dir, &self.submissions_dir, &self.logs_dir)
    }
}

fn generate_user_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_config_is_created_with_a_user_id() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("identibreed").join(CONFIG_FILE_NAME);
        let created = AppConfig::load_or_create(&path)?;
        assert_eq!(created.user_id.len(), 8);
        assert!(path.exists());
        let reloaded = AppConfig::load_or_create(&path)?;
        assert_eq!(reloaded, created);
        Ok(())
    }

    #[test]
    fn partial_config_keeps_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(
            &path,
            "user_id = \"abc\"\ndefault_policy = \"manual\"\n[model]\ninput_size = 299\n",
        )?;
        let cfg = AppConfig::load(&path)?;
        assert_eq!(cfg.user_id, "abc");
        assert_eq!(cfg.default_policy, Some(SavePolicy::Manual));
        assert_eq!(cfg.model.input_size, 299);
        assert!(cfg.model.channels_last);
        assert_eq!(cfg.top_k, DEFAULT_TOP_K);
        assert_eq!(cfg.correction_attempts, 3);
        Ok(())
    }

    #[test]
    fn malformed_config_reports_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "top_k = \"five\"")?;
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Parse { .. })));
        Ok(())
    }

    #[test]
    fn relative_paths_are_rooted() {
        let base = Path::new("/srv/identibreed");
        let mut cfg = AppConfig::default();
        cfg.logs_dir = PathBuf::from("/var/log/breed");
        let cfg = cfg.rooted_at(base);
        assert_eq!(cfg.output_dir, base.join("user/output"));
        assert_eq!(cfg.logs_dir, PathBuf::from("/var/log/breed"));
        assert_eq!(cfg.model.labels_path, base.join("data/labels.csv"));
    }
}
