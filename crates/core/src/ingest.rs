use crate::error::IngestError;
use crate::extractor::extract_text;
use crate::models::{is_supported_extension, Document, IngestionOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_supported_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(is_supported_extension);

        if supported {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Extracts one file into a [`Document`] with a fresh id.
pub fn load_document(path: &Path, options: &IngestionOptions) -> Result<Document, IngestError> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?;

    let size = fs::metadata(path)?.len();
    if size > options.max_file_bytes {
        return Err(IngestError::FileTooLarge {
            path: path.display().to_string(),
            size,
            limit: options.max_file_bytes,
        });
    }

    let extracted = extract_text(path)?;
    if extracted.content.trim().is_empty() {
        return Err(IngestError::Extraction {
            path: path.display().to_string(),
            details: "no content extracted".to_string(),
        });
    }

    Ok(Document::new(
        filename,
        extracted.content,
        extracted.source_type,
    ))
}

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

impl LoadReport {
    /// Fails when nothing in the batch could be loaded.
    pub fn require_documents(&self) -> Result<(), IngestError> {
        if !self.documents.is_empty() {
            return Ok(());
        }

        let reasons = self
            .skipped
            .iter()
            .map(|skipped| format!("{}: {}", skipped.path.display(), skipped.reason))
            .collect::<Vec<_>>()
            .join("; ");
        Err(IngestError::NoValidDocuments {
            skipped: self.skipped.len(),
            reasons,
        })
    }
}

/// Loads every path, collecting failures instead of stopping at the first one.
pub fn load_documents_best_effort(paths: &[PathBuf], options: &IngestionOptions) -> LoadReport {
    let mut report = LoadReport::default();

    for path in paths {
        match load_document(path, options) {
            Ok(document) => {
                info!(
                    filename = %document.filename,
                    content_len = document.raw_content.len(),
                    source_type = document.source_type.as_str(),
                    "extracted document"
                );
                report.documents.push(document);
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping document");
                report.skipped.push(SkippedFile {
                    path: path.clone(),
                    reason: error.to_string(),
                });
            }
        }
    }

    report
}

/// Expands folders into their supported files; plain file paths pass through.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(discover_supported_files(input));
        } else {
            files.push(input.clone());
        }
    }

    if files.is_empty() {
        return Err(IngestError::InvalidArgument(
            "no supported files found in the given paths".to_string(),
        ));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discovery_is_recursive_and_filters_extensions() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        fs::write(nested.join("b.TXT"), "hello")?;
        fs::write(nested.join("c.md"), "ignored")?;

        let files = discover_supported_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn best_effort_skips_bad_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let good = dir.path().join("good.txt");
        let blank = dir.path().join("blank.txt");
        let broken = dir.path().join("broken.pdf");
        let slides = dir.path().join("slides.pptx");
        fs::write(&good, "stacks and queues")?;
        fs::write(&blank, "  \n ")?;
        fs::write(&broken, b"%PDF-1.4\n%broken")?;
        fs::write(&slides, b"PK")?;

        let report = load_documents_best_effort(
            &[good, blank, broken, slides],
            &IngestionOptions::default(),
        );

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].filename, "good.txt");
        assert_eq!(report.skipped.len(), 3);
        assert!(report.skipped[2].reason.contains("unsupported file type"));
        Ok(())
    }

    #[test]
    fn batch_with_only_skipped_files_is_a_failure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let bad = dir.path().join("bad.txt");
        fs::write(&bad, [0xffu8, 0xfe, 0x00])?;

        let report = load_documents_best_effort(&[bad], &IngestionOptions::default());
        match report.require_documents() {
            Err(IngestError::NoValidDocuments { skipped, reasons }) => {
                assert_eq!(skipped, 1);
                assert!(reasons.contains("bad.txt"));
            }
            other => panic!("expected NoValidDocuments, got {other:?}"),
        }

        let good = dir.path().join("good.txt");
        fs::write(&good, "heaps and priority queues")?;
        let report = load_documents_best_effort(&[good], &IngestionOptions::default());
        assert!(report.require_documents().is_ok());
        Ok(())
    }

    #[test]
    fn oversized_files_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("big.txt");
        fs::write(&path, "x".repeat(64))?;

        let options = IngestionOptions {
            max_file_bytes: 16,
            ..IngestionOptions::default()
        };
        assert!(matches!(
            load_document(&path, &options),
            Err(IngestError::FileTooLarge { size: 64, .. })
        ));
        Ok(())
    }

    #[test]
    fn empty_inputs_are_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        assert!(expand_inputs(&[dir.path().to_path_buf()]).is_err());
        Ok(())
    }
}
