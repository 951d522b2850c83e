//! Input source resolution: a folder, a single image, or an image URL.

use anyhow::{Context, Result, bail};
use breed_core::scan::is_supported_image;
use breed_core::{ScanOptions, Timestamp, scan_folder_with};
use reqwest::Url;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Directory(PathBuf),
    File(PathBuf),
    Url(String),
}

impl InputSource {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return InputSource::Url(raw.to_string());
        }
        let path = PathBuf::from(raw);
        if path.is_dir() {
            InputSource::Directory(path)
        } else {
            InputSource::File(path)
        }
    }

    /// Turn the source into local image files. Errors are meant for the user.
    pub fn resolve(&self, download_dir: &Path, opts: ScanOptions) -> Result<Vec<PathBuf>> {
        match self {
            InputSource::Directory(dir) => Ok(scan_folder_with(dir, opts)?),
            InputSource::File(path) => {
                if !path.is_file() {
                    bail!("File not found: {}", path.display());
                }
                if !is_supported_image(path) {
                    bail!("Not a supported image (jpg, jpeg, png): {}", path.display());
                }
                Ok(vec![path.clone()])
            }
            InputSource::Url(raw) => Ok(vec![download(raw, download_dir)?]),
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSource::Directory(p) | InputSource::File(p) => write!(f, "{}", p.display()),
            InputSource::Url(u) => f.write_str(u),
        }
    }
}

fn download(raw: &str, download_dir: &Path) -> Result<PathBuf> {
    let url = Url::parse(raw).with_context(|| format!("Invalid URL: {raw}"))?;
    tracing::info!("downloading {url}");
    let bytes = reqwest::blocking::get(url.clone())
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .with_context(|| format!("Could not fetch image from {url}"))?;
    if bytes.is_empty() {
        bail!("URL returned no data: {url}");
    }
    fs::create_dir_all(download_dir)
        .with_context(|| format!("Could not create {}", download_dir.display()))?;
    let path = download_dir.join(download_file_name(&url, Timestamp::now()));
    fs::write(&path, &bytes).with_context(|| format!("Could not write {}", path.display()))?;
    Ok(path)
}

fn download_file_name(url: &Url, at: Timestamp) -> String {
    let ext = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|last| last.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or_else(|| "jpg".to_string());
    format!("download_{at}.{ext}")
}
