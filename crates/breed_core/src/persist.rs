//! Persistence collaborator: prediction cards, user submissions and evaluation logs.

use crate::evaluation::{LogEntry, LogIdentity};
use image::{ImageFormat, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Failed to prepare directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write image {path}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Failed to write log {path}: {source}")]
    Log { path: PathBuf, source: csv::Error },
}

/// Destination class of a persisted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Rendered prediction card (save policies).
    Prediction,
    /// Raw photo labelled by the user (evaluation gate).
    Submission,
}

/// Where an artifact ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub path: PathBuf,
}

impl ArtifactDescriptor {
    /// Status line shown next to the navigation controls.
    pub fn status_line(&self) -> String {
        match self.kind {
            ArtifactKind::Prediction => format!(
                "Prediction saved to output folder under name: {}",
                self.file_name
            ),
            ArtifactKind::Submission => {
                format!("Image submitted for training under name: {}", self.file_name)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Written(PathBuf),
    /// A log with this identity already exists; nothing was written.
    AlreadyExists(PathBuf),
}

/// Durable side effects of a session.
pub trait Persistence {
    /// Write `image` under (approximately) `suggested_name`.
    fn persist_artifact(
        &mut self,
        kind: ArtifactKind,
        image: &RgbImage,
        suggested_name: &str,
    ) -> Result<ArtifactDescriptor, PersistError>;

    /// Write `rows` as the log `identity`, unless such a log already exists.
    fn flush_log(
        &mut self,
        identity: &LogIdentity,
        rows: &[LogEntry],
    ) -> Result<FlushOutcome, PersistError>;
}

impl<P: Persistence + ?Sized> Persistence for &mut P {
    fn persist_artifact(
        &mut self,
        kind: ArtifactKind,
        image: &RgbImage,
        suggested_name: &str,
    ) -> Result<ArtifactDescriptor, PersistError> {
        (**self).persist_artifact(kind, image, suggested_name)
    }

    fn flush_log(
        &mut self,
        identity: &LogIdentity,
        rows: &[LogEntry],
    ) -> Result<FlushOutcome, PersistError> {
        (**self).flush_log(identity, rows)
    }
}

/// Column headers of a flushed evaluation log.
pub const LOG_HEADERS: [&str; 4] = ["file_name", "image_snapshot", "label", "correctness"];

/// Filesystem-backed persistence rooted at three directories.
///
/// A name already taken on disk gets a `-2`, `-3`, ... suffix before the extension, so
/// two saves within the same second never overwrite each other.
#[derive(Debug, Clone)]
pub struct FsStore {
    output_dir: PathBuf,
    submissions_dir: PathBuf,
    logs_dir: PathBuf,
}

impl FsStore {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        submissions_dir: impl Into<PathBuf>,
        logs_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            submissions_dir: submissions_dir.into(),
            logs_dir: logs_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn log_path(&self, identity: &LogIdentity) -> PathBuf {
        self.logs_dir.join(format!("{identity}.csv"))
    }

    fn dir_for(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Prediction => &self.output_dir,
            ArtifactKind::Submission => &self.submissions_dir,
        }
    }
}

fn ensure_dir(path: &Path) -> Result<(), PersistError> {
    fs::create_dir_all(path).map_err(|source| PersistError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn unique_path(dir: &Path, name: &str) -> (String, PathBuf) {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return (name.to_string(), candidate);
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) => (stem, format!(".{ext}")),
        None => (name, String::new()),
    };
    let mut n = 2u32;
    loop {
        let file_name = format!("{stem}-{n}{ext}");
        let path = dir.join(&file_name);
        if !path.exists() {
            return (file_name, path);
        }
        n += 1;
    }
}

impl Persistence for FsStore {
    fn persist_artifact(
        &mut self,
        kind: ArtifactKind,
        image: &RgbImage,
        suggested_name: &str,
    ) -> Result<ArtifactDescriptor, PersistError> {
        let dir = self.dir_for(kind).to_path_buf();
        ensure_dir(&dir)?;
        let (file_name, path) = unique_path(&dir, suggested_name);
        image
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|source| PersistError::Image {
                path: path.clone(),
                source,
            })?;
        tracing::debug!("persisted {:?} artifact {}", kind, path.display());
        Ok(ArtifactDescriptor {
            kind,
            file_name,
            path,
        })
    }

    fn flush_log(
        &mut self,
        identity: &LogIdentity,
        rows: &[LogEntry],
    ) -> Result<FlushOutcome, PersistError> {
        let path = self.log_path(identity);
        if path.exists() {
            tracing::info!("evaluation log {} already exists, skipping", path.display());
            return Ok(FlushOutcome::AlreadyExists(path));
        }
        ensure_dir(&self.logs_dir)?;
        let log_err = |source| PersistError::Log {
            path: path.clone(),
            source,
        };
        // Rows go to a temp file first; only a complete log ever takes the final name.
        let tmp = NamedTempFile::new_in(&self.logs_dir).map_err(|e| log_err(e.into()))?;
        let mut wtr = csv::Writer::from_writer(tmp);
        wtr.write_record(LOG_HEADERS).map_err(log_err)?;
        for row in rows {
            let flag = row.correctness.map(|c| c.flag()).unwrap_or("");
            wtr.write_record([
                row.file_name.as_str(),
                row.image_snapshot.as_str(),
                row.label.as_str(),
                flag,
            ])
            .map_err(log_err)?;
        }
        let tmp = wtr
            .into_inner()
            .map_err(|e| log_err(e.into_error().into()))?;
        tmp.persist_noclobber(&path)
            .map_err(|e| log_err(e.error.into()))?;
        tracing::info!("evaluation log written to {}", path.display());
        Ok(FlushOutcome::Written(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Correctness;
    use image::Rgb;
    use tempfile::tempdir;

    fn store(root: &Path) -> FsStore {
        FsStore::new(root.join("output"), root.join("subs"), root.join("logs"))
    }

    #[test]
    fn same_name_twice_gets_a_suffix() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut store = store(dir.path());
        let img = RgbImage::from_pixel(4, 4, Rgb([1, 2, 3]));
        let name = "pug_50.000%_20230511-145316.jpg";
        let first = store.persist_artifact(ArtifactKind::Prediction, &img, name)?;
        let second = store.persist_artifact(ArtifactKind::Prediction, &img, name)?;
        assert_eq!(first.file_name, name);
        assert_eq!(second.file_name, "pug_50.000%_20230511-145316-2.jpg");
        assert!(first.path.exists() && second.path.exists());
        assert!(first.path.starts_with(dir.path().join("output")));
        Ok(())
    }

    #[test]
    fn submissions_go_to_their_own_directory() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut store = store(dir.path());
        let img = RgbImage::new(2, 2);
        let desc = store.persist_artifact(ArtifactKind::Submission, &img, "pug_1.jpg")?;
        assert_eq!(desc.path, dir.path().join("subs").join("pug_1.jpg"));
        assert!(desc.status_line().contains("pug_1.jpg"));
        Ok(())
    }

    #[test]
    fn log_is_written_once_per_identity() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut store = store(dir.path());
        let identity = LogIdentity::new("u1_20230511-145316_log");
        let rows = vec![
            LogEntry {
                file_name: "a.jpg".into(),
                image_snapshot: "subs/beagle.jpg".into(),
                label: "beagle".into(),
                correctness: Some(Correctness::Corrected),
            },
            LogEntry {
                file_name: "b.jpg".into(),
                image_snapshot: String::new(),
                label: "unknown".into(),
                correctness: None,
            },
        ];
        let first = store.flush_log(&identity, &rows)?;
        let path = store.log_path(&identity);
        assert_eq!(first, FlushOutcome::Written(path.clone()));
        assert_eq!(
            store.flush_log(&identity, &[])?,
            FlushOutcome::AlreadyExists(path.clone())
        );

        let mut rdr = csv::Reader::from_path(&path)?;
        assert_eq!(rdr.headers()?.iter().collect::<Vec<_>>(), LOG_HEADERS.to_vec());
        let recs: Vec<csv::StringRecord> = rdr.records().collect::<Result<_, _>>()?;
        assert_eq!(recs.len(), 2);
        assert_eq!(&recs[0][2], "beagle");
        assert_eq!(&recs[0][3], "0");
        assert_eq!(&recs[1][3], "");
        Ok(())
    }

    #[test]
    fn failed_log_write_leaves_nothing_behind() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let mut store = store(dir.path());
        let identity = LogIdentity::new("late/u1_20230511-145316_log");
        let rows = vec![LogEntry {
            file_name: "a.jpg".into(),
            image_snapshot: String::new(),
            label: "pug".into(),
            correctness: Some(Correctness::Correct),
        }];
        assert!(matches!(
            store.flush_log(&identity, &rows),
            Err(PersistError::Log { .. })
        ));
        let logs = dir.path().join("logs");
        assert!(!store.log_path(&identity).exists());
        assert_eq!(fs::read_dir(&logs)?.count(), 0);

        fs::create_dir(logs.join("late"))?;
        let path = store.log_path(&identity);
        assert_eq!(store.flush_log(&identity, &rows)?, FlushOutcome::Written(path.clone()));
        assert_eq!(fs::read_dir(&logs)?.count(), 1);
        assert_eq!(csv::Reader::from_path(&path)?.records().count(), 1);
        Ok(())
    }
}
