//! Input handling: raw document payloads and the paths they come from.
//!
//! The pipeline itself only ever sees [`RawDocument`]: an identifier plus
//! opaque bytes, however they were obtained. The path helpers here serve the
//! CLI and callers that keep contracts on disk.

use crate::error::{ContractError, DocumentError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// How far into the payload the `%PDF` header may start. Some generators
/// prepend a few bytes of junk before it.
const MAGIC_SEARCH_WINDOW: usize = 1024;

/// One document payload and the identifier it is reported under.
///
/// Bytes are reference-counted so the payload can move onto a blocking
/// thread without copying.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: String,
    pub bytes: Arc<[u8]>,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: id.into(),
            bytes: bytes.into(),
        }
    }

    /// Reject payloads that are obviously not PDFs before pdfium sees them.
    pub fn check_magic(&self) -> Result<(), DocumentError> {
        let window = &self.bytes[..self.bytes.len().min(MAGIC_SEARCH_WINDOW)];
        if window.windows(4).any(|w| w == b"%PDF") {
            return Ok(());
        }
        Err(DocumentError::NotAPdf {
            id: self.id.clone(),
            magic: self.bytes.iter().take(4).copied().collect(),
        })
    }
}

/// Expand the given paths into a sorted list of PDF files.
///
/// Files are taken as-is (their content is checked later, per document).
/// Directories contribute their `*.pdf` entries, non-recursively.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ContractError> {
    let mut files = Vec::new();
    for path in paths {
        let meta = std::fs::metadata(path).map_err(|e| map_io(path, e))?;
        if meta.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(|e| map_io(path, e))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_pdf_name(p))
                .collect();
            if found.is_empty() {
                return Err(ContractError::NoDocuments { path: path.clone() });
            }
            found.sort();
            debug!("{}: {} PDF files", path.display(), found.len());
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }
    files.dedup();
    Ok(files)
}

/// Read one file into a [`RawDocument`] identified by its file name.
pub async fn load_document(path: &Path) -> Result<RawDocument, ContractError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| map_io(path, e))?;
    let id = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    debug!("Loaded {} ({} bytes)", id, bytes.len());
    Ok(RawDocument::new(id, bytes))
}

/// Read every path into memory, in order.
pub async fn load_documents(paths: &[PathBuf]) -> Result<Vec<RawDocument>, ContractError> {
    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        docs.push(load_document(path).await?);
    }
    Ok(docs)
}

fn is_pdf_name(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn map_io(path: &Path, e: std::io::Error) -> ContractError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => ContractError::PermissionDenied {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::NotFound => ContractError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => ContractError::Internal(format!("{}: {}", path.display(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_at_start_is_accepted() {
        let doc = RawDocument::new("a.pdf", b"%PDF-1.7\n...".to_vec());
        assert!(doc.check_magic().is_ok());
    }

    #[test]
    fn magic_after_junk_is_accepted() {
        let mut bytes = vec![0u8; 16];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert!(RawDocument::new("a.pdf", bytes).check_magic().is_ok());
    }

    #[test]
    fn non_pdf_is_rejected_with_magic() {
        let doc = RawDocument::new("notes.txt", b"Hello world".to_vec());
        match doc.check_magic() {
            Err(DocumentError::NotAPdf { id, magic }) => {
                assert_eq!(id, "notes.txt");
                assert_eq!(magic, b"Hell".to_vec());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(RawDocument::new("empty.pdf", Vec::new()).check_magic().is_err());
    }

    #[test]
    fn collect_inputs_expands_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("a.PDF"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let files = collect_inputs(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn collect_inputs_reports_missing_path() {
        let err = collect_inputs(&[PathBuf::from("/definitely/not/here.pdf")]).unwrap_err();
        assert!(matches!(err, ContractError::InputNotFound { .. }));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_inputs(&[dir.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, ContractError::NoDocuments { .. }));
    }

    #[tokio::test]
    async fn load_document_uses_file_name_as_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GEMC-1.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();
        let doc = load_document(&path).await.unwrap();
        assert_eq!(doc.id, "GEMC-1.pdf");
        assert_eq!(&doc.bytes[..], b"%PDF-1.7");
    }
}
