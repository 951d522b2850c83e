//! Breed vocabulary loading.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column holding the breed name in a `labels.csv` dataset file.
pub const BREED_COLUMN: &str = "breed";

#[derive(Debug, Error)]
pub enum LabelsError {
    #[error("labels file not readable at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("labels csv at {path} is malformed: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("labels csv at {0} has no `breed` column")]
    MissingColumn(PathBuf),
    #[error("labels file at {0} contains no labels")]
    Empty(PathBuf),
}

/// Load the closed label vocabulary.
///
/// `.csv` files contribute the unique, sorted values of their `breed` column; any
/// other file is read as one label per line.
pub fn load_labels(path: impl AsRef<Path>) -> Result<Vec<String>, LabelsError> {
    let path = path.as_ref();
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let labels = if is_csv {
        load_csv_labels(path)?
    } else {
        load_text_labels(path)?
    };
    if labels.is_empty() {
        return Err(LabelsError::Empty(path.to_path_buf()));
    }
    tracing::debug!("loaded {} labels from {}", labels.len(), path.display());
    Ok(labels)
}

fn load_csv_labels(path: &Path) -> Result<Vec<String>, LabelsError> {
    let csv_err = |source| LabelsError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv::Reader::from_path(path).map_err(csv_err)?;
    let column = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .position(|h| h.trim() == BREED_COLUMN)
        .ok_or_else(|| LabelsError::MissingColumn(path.to_path_buf()))?;
    let mut unique = BTreeSet::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        if let Some(value) = record.get(column).map(str::trim)
            && !value.is_empty()
        {
            unique.insert(value.to_string());
        }
    }
    Ok(unique.into_iter().collect())
}

fn load_text_labels(path: &Path) -> Result<Vec<String>, LabelsError> {
    let raw = fs::read_to_string(path).map_err(|source| LabelsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut labels: Vec<String> = Vec::new();
    for line in raw.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !labels.iter().any(|l| l == line) {
            labels.push(line.to_string());
        }
    }
    Ok(labels)
}

/// Bring free text into the dataset's label style: lowercase, words joined by `_`.
///
/// Anything other than letters, digits and `-` becomes a single `_`, so a label is
/// always usable as part of a file name.
pub fn normalize_label(text: &str) -> String {
    let mut label = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '-' {
            label.push(c);
        } else if !label.is_empty() && !label.ends_with('_') {
            label.push('_');
        }
    }
    if label.ends_with('_') {
        label.pop();
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::tempdir;

    #[test]
    fn csv_labels_are_unique_and_sorted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("labels.csv");
        fs::write(
            &path,
            "id,breed\n000bec,boston_bull\n001513,dingo\n001cdf,pekinese\n00214f,dingo\n",
        )?;
        assert_eq!(load_labels(&path)?, vec!["boston_bull", "dingo", "pekinese"]);
        Ok(())
    }

    #[test]
    fn csv_without_breed_column_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("labels.csv");
        fs::write(&path, "id,name\n1,x\n")?;
        assert!(matches!(load_labels(&path), Err(LabelsError::MissingColumn(_))));
        Ok(())
    }

    #[test]
    fn text_labels_keep_file_order() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("unique_labels.txt");
        fs::write(&path, "pug\n\n  beagle \npug\n")?;
        assert_eq!(load_labels(&path)?, vec!["pug", "beagle"]);
        Ok(())
    }

    #[test]
    fn empty_text_file_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("labels.txt");
        fs::write(&path, "\n\n")?;
        assert!(matches!(load_labels(&path), Err(LabelsError::Empty(_))));
        Ok(())
    }

    #[rstest]
    #[case("Golden Retriever", "golden_retriever")]
    #[case("  beagle ", "beagle")]
    #[case("German   Short Haired", "german_short_haired")]
    #[case("", "")]
    #[case("german/shepherd mix", "german_shepherd_mix")]
    #[case("../..\\boxer", "boxer")]
    #[case("bull-terrier (mini)", "bull-terrier_mini")]
    #[case(" / ", "")]
    fn normalizes_free_text(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_label(input), expected);
    }
}
