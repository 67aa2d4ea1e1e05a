//! Error types for the edgequake-contracts library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`ContractError`]: **Fatal for the run**: nothing can be processed at all
//!   (bad configuration, unreadable vocabulary, pdfium not loadable, output
//!   directory not writable). Returned as `Err(ContractError)` from the
//!   top-level batch functions.
//!
//! * [`DocumentError`]: **Fatal for one document**: the payload cannot be
//!   opened as a PDF. The batch records the document identifier and the reason
//!   in [`crate::batch::BatchOutput::failures`] and keeps going with the others.
//!
//! * [`RecognitionError`]: **Not fatal at all**: one page could not be
//!   transcribed. The page contributes empty text and the document proceeds
//!   with whatever was recognised.
//!
//! Missing fields and unparsable numbers are not errors: they are represented
//! as data (the sentinel value and `0.0` respectively).

use std::path::PathBuf;
use thiserror::Error;

/// All fatal, run-level errors returned by the library.
#[derive(Debug, Error)]
pub enum ContractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input path was not found.
    #[error("Input not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// Process does not have read permission on the path.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// A directory input contained no PDF files.
    #[error("No PDF files found in '{path}'")]
    NoDocuments { path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The vocabulary file could not be read or parsed.
    #[error("Invalid vocabulary '{source_name}': {detail}")]
    InvalidVocabulary { source_name: String, detail: String },

    // ── Recognizer errors ─────────────────────────────────────────────────
    /// The configured recognizer could not be constructed.
    #[error("Recognizer '{backend}' is not available.\n{hint}")]
    RecognizerUnavailable { backend: String, hint: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or the directory containing it),\n\
or install pdfium where the system loader can find it.\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialising a table to CSV or JSON failed.
    #[error("Failed to serialise '{table}': {detail}")]
    SerializationFailed { table: String, detail: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure confined to a single document.
///
/// This is the only per-document condition reported as a failure; the batch
/// continues with the remaining documents.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentError {
    /// The payload does not start with the PDF magic bytes.
    #[error("'{id}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { id: String, magic: Vec<u8> },

    /// pdfium could not open the payload.
    #[error("'{id}' cannot be opened as a document: {detail}")]
    Unreadable { id: String, detail: String },

    /// The document is encrypted and no password is available.
    #[error("'{id}' is password protected")]
    PasswordProtected { id: String },

    /// Unexpected failure while processing this document.
    #[error("'{id}': internal error: {detail}")]
    Internal { id: String, detail: String },
}

impl DocumentError {
    /// Identifier of the document that failed.
    pub fn document_id(&self) -> &str {
        match self {
            DocumentError::NotAPdf { id, .. }
            | DocumentError::Unreadable { id, .. }
            | DocumentError::PasswordProtected { id }
            | DocumentError::Internal { id, .. } => id,
        }
    }
}

/// A non-fatal failure while recognising one page image.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum RecognitionError {
    /// The recognizer backend returned an error after all retries.
    #[error("Page {page}: recognition failed after {retries} retries: {detail}")]
    Failed {
        page: usize,
        retries: u8,
        detail: String,
    },

    /// Rasterised page could not be prepared for the recognizer.
    #[error("Page {page}: image preparation failed: {detail}")]
    ImageFailed { page: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_error_reports_id() {
        let e = DocumentError::Unreadable {
            id: "contract_01.pdf".into(),
            detail: "FormatError".into(),
        };
        assert_eq!(e.document_id(), "contract_01.pdf");
        assert!(e.to_string().contains("contract_01.pdf"));
        assert!(e.to_string().contains("FormatError"));
    }

    #[test]
    fn not_a_pdf_display() {
        let e = DocumentError::NotAPdf {
            id: "notes.txt".into(),
            magic: b"Hell".to_vec(),
        };
        assert!(e.to_string().contains("not a PDF"));
    }

    #[test]
    fn document_error_serialises_with_kind_tag() {
        let e = DocumentError::PasswordProtected { id: "a.pdf".into() };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains(r#""kind":"password_protected""#), "got: {json}");
    }

    #[test]
    fn recognition_error_display() {
        let e = RecognitionError::Failed {
            page: 2,
            retries: 3,
            detail: "HTTP 503".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 2"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn output_write_failed_display() {
        let e = ContractError::OutputWriteFailed {
            path: PathBuf::from("/out/Dim_Buyer.csv"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.to_string().contains("Dim_Buyer.csv"));
    }
}
