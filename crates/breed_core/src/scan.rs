use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Path does not exist: {0}")]
    Missing(PathBuf),
    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Options controlling how folder scanning behaves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// When true, scan subdirectories recursively.
    pub recursive: bool,
}

/// Scan a folder for images, non-recursively.
pub fn scan_folder(path: impl AsRef<Path>) -> Result<Vec<PathBuf>, ScanError> {
    scan_folder_with(path, ScanOptions::default())
}

/// Scan a folder with options. Results are sorted by path.
pub fn scan_folder_with(path: impl AsRef<Path>, opts: ScanOptions) -> Result<Vec<PathBuf>, ScanError> {
    let root = path.as_ref();
    if !root.exists() {
        return Err(ScanError::Missing(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let walker = if opts.recursive {
        WalkDir::new(root).into_iter()
    } else {
        WalkDir::new(root).max_depth(1).into_iter()
    };

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("walkdir error: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if path.is_file() && is_supported_image(path) {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            matches!(ext.as_str(), "jpg" | "jpeg" | "png")
        }
        None => false,
    }
}

/// Raw, undecoded image bytes plus where they came from.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub origin: PathBuf,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    pub fn new(origin: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            origin: origin.into(),
            bytes,
        }
    }

    pub fn read(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        Ok(Self::new(path, fs::read(path)?))
    }

    /// Read every path, logging and dropping the unreadable ones.
    pub fn read_all<I, P>(paths: I) -> Vec<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        paths
            .into_iter()
            .filter_map(|p| match Self::read(p.as_ref()) {
                Ok(blob) => Some(blob),
                Err(e) => {
                    tracing::warn!("skipping unreadable file {}: {e}", p.as_ref().display());
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn names(paths: Vec<PathBuf>) -> Vec<String> {
        paths
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn scan_folder_empty_returns_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        assert!(scan_folder(dir.path())?.is_empty());
        Ok(())
    }

    #[test]
    fn scan_folder_lists_only_images_non_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        File::create(dir.path().join("c.png"))?;
        File::create(dir.path().join("a.JPG"))?;
        File::create(dir.path().join("b.jpeg"))?;
        File::create(dir.path().join("notes.txt"))?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        File::create(nested.join("d.jpg"))?;

        let rows = scan_folder_with(dir.path(), ScanOptions { recursive: false })?;
        assert_eq!(names(rows), vec!["a.JPG", "b.jpeg", "c.png"]);
        Ok(())
    }

    #[test]
    fn scan_folder_descends_when_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        File::create(dir.path().join("a.jpg"))?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        File::create(nested.join("b.PNG"))?;

        let rows = scan_folder_with(dir.path(), ScanOptions { recursive: true })?;
        let mut files = names(rows);
        files.sort();
        assert_eq!(files, vec!["a.jpg", "b.PNG"]);
        Ok(())
    }

    #[test]
    fn scan_folder_rejects_files_and_missing_paths() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file = dir.path().join("one.jpg");
        File::create(&file)?;
        assert!(matches!(scan_folder(&file), Err(ScanError::NotADirectory(_))));
        assert!(matches!(
            scan_folder(dir.path().join("absent")),
            Err(ScanError::Missing(_))
        ));
        Ok(())
    }

    #[test]
    fn read_all_drops_unreadable_paths() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let good = dir.path().join("good.jpg");
        fs::write(&good, b"bytes")?;
        let blobs = ImageBlob::read_all([good.clone(), dir.path().join("gone.jpg")]);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].origin, good);
        assert_eq!(blobs[0].bytes, b"bytes");
        Ok(())
    }
}
