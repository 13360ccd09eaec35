//! Context assembly: builds the session system prompt from local files.
//!
//! The assembled prompt is the ordered concatenation of whichever context
//! documents exist, followed by the configured instruction preamble. A
//! missing document contributes nothing; the assistant stays usable with
//! partial (or no) context.

use std::fs;
use std::path::Path;

const SECTION_DELIMITER: &str = "\n\n---\n\n";

/// Context documents in assembly order, with the heading each is rendered
/// under. Order matters: later text sits closer to the user turn in the
/// final prompt.
const CONTEXT_SECTIONS: [(&str, &str); 3] = [
    ("profile.md", "About this person"),
    ("preferences.md", "Their preferences"),
    ("current_focus.md", "Current focus"),
];

/// Read a single context file, returning empty text if it is missing or
/// unreadable.
fn load_context_file(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

/// Assemble the full system prompt from the context directory.
pub fn build_system_prompt(context_dir: &Path, preamble: &str) -> String {
    let mut sections = Vec::new();

    for (file, heading) in CONTEXT_SECTIONS {
        let content = load_context_file(&context_dir.join(file));
        if !content.trim().is_empty() {
            sections.push(format!("## {heading}\n\n{}", content.trim_end()));
        }
    }

    let preamble = preamble.trim();
    if !preamble.is_empty() {
        sections.push(preamble.to_string());
    }

    sections.join(SECTION_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).expect("Failed to write context file");
    }

    #[test]
    fn empty_directory_yields_preamble_only() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let prompt = build_system_prompt(dir.path(), "Be helpful.");
        assert_eq!(prompt, "Be helpful.");
    }

    #[test]
    fn no_context_and_no_preamble_yields_empty_prompt() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let prompt = build_system_prompt(dir.path(), "");
        assert_eq!(prompt, "");
    }

    #[test]
    fn single_document_is_rendered_under_its_heading() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        write(&dir, "preferences.md", "Short answers.");

        let prompt = build_system_prompt(dir.path(), "Be helpful.");
        assert_eq!(
            prompt,
            "## Their preferences\n\nShort answers.\n\n---\n\nBe helpful."
        );
    }

    #[test]
    fn all_documents_appear_in_fixed_order_with_preamble_last() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        // Written out of order on purpose; assembly order must not depend on it
        write(&dir, "current_focus.md", "Shipping v2.");
        write(&dir, "profile.md", "A software engineer.");
        write(&dir, "preferences.md", "Short answers.");

        let prompt = build_system_prompt(dir.path(), "Be helpful.");

        let profile = prompt.find("A software engineer.").unwrap();
        let preferences = prompt.find("Short answers.").unwrap();
        let focus = prompt.find("Shipping v2.").unwrap();
        let preamble = prompt.find("Be helpful.").unwrap();
        assert!(profile < preferences);
        assert!(preferences < focus);
        assert!(focus < preamble);
    }

    #[test]
    fn missing_documents_contribute_nothing() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        write(&dir, "profile.md", "A software engineer.");
        write(&dir, "current_focus.md", "Shipping v2.");

        let prompt = build_system_prompt(dir.path(), "");
        assert_eq!(
            prompt,
            "## About this person\n\nA software engineer.\n\n---\n\n## Current focus\n\nShipping v2."
        );
        assert!(!prompt.contains("Their preferences"));
    }

    #[test]
    fn whitespace_only_documents_are_skipped() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        write(&dir, "profile.md", "  \n\t\n");

        let prompt = build_system_prompt(dir.path(), "Be helpful.");
        assert_eq!(prompt, "Be helpful.");
    }
}
