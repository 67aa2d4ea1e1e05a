//! Prompts for vision-model page transcription.
//!
//! The vision recognizer is used as an OCR engine, not as a document
//! converter: the prompt asks for plain text in reading order with one
//! label/value pair per line, which is the shape the field extractor expects.
//! Callers can override it via [`crate::config::PipelineConfig::system_prompt`].

/// Default system prompt for transcribing one contract page image.
pub const DEFAULT_TRANSCRIPTION_PROMPT: &str = r#"You are an OCR engine. Transcribe the text of this scanned contract page exactly as printed.

Rules:
1. Output plain text only. No Markdown, no tables, no code fences, no commentary.
2. Keep the reading order a human would use, top to bottom, left to right.
3. Put each label and its value on one line as "Label : Value" when they appear side by side.
4. Put each table row on its own line with cells separated by " | ".
5. Copy numbers, identifiers, e-mail addresses, and phone numbers character for character. Never round, reformat, or complete them.
6. Skip text in scripts other than Latin unless it is the only text in a cell.
7. If the page is blank or unreadable, output nothing."#;

/// The user turn that accompanies the page image.
pub fn page_instruction(page_num: usize) -> String {
    format!("Transcribe page {page_num}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_asks_for_plain_text() {
        assert!(DEFAULT_TRANSCRIPTION_PROMPT.contains("plain text"));
        assert!(DEFAULT_TRANSCRIPTION_PROMPT.contains("Label : Value"));
    }

    #[test]
    fn page_instruction_names_page() {
        assert_eq!(page_instruction(3), "Transcribe page 3.");
    }
}
