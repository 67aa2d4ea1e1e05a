//! Per-document pipeline stages for contract extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested alone and a backend (pdfium, a recognizer) can be swapped without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ acquire ──▶ normalize ──▶ sections ──▶ fields ──▶ assemble
//! (bytes)   (text/OCR)   (cleanup)     (zones)     (chains)   (record)
//!              │
//!              ├─ render  pdfium text layer + page rasters
//!              ├─ encode  PNG / base64 for vision recognizers
//!              └─ ocr     recognizer trait + implementations
//! ```
//!
//! 1. [`input`]     read payloads and check the `%PDF` signature
//! 2. [`acquire`]   text layer, falling back to recognition when it is
//!    empty, too short, or corrupted; bounded by a per-document timeout
//! 3. [`normalize`] strip encoding artifacts and boilerplate, canonical lines
//! 4. [`sections`]  slice the text into organisation, buyer, seller and
//!    product zones
//! 5. [`fields`]    ordered strategy chains per canonical field
//! 6. [`assemble`]  one [`crate::record::ExtractedRecord`] with sentinels
//!
//! Nothing here keeps state between documents; the star-schema reduction in
//! [`crate::model`] runs after every document is done.

pub mod acquire;
pub mod assemble;
pub mod encode;
pub mod fields;
pub mod input;
pub mod normalize;
pub mod ocr;
pub mod render;
pub mod sections;
