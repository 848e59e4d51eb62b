//! Per-format text extraction.
//!
//! Extractors are keyed by file extension. Each returns the file's text split
//! into pages; formats without pages return a single entry unless the text
//! contains form feeds.

use docsage_core::{AppError, AppResult};
use std::fs;
use std::path::Path;
use std::sync::Arc;

const PAGE_BREAK: char = '\u{0C}';

/// Pluggable text extraction for a family of file extensions.
pub trait FormatExtractor: Send + Sync {
    /// Short name used in logs and the `file_type` metadata field.
    fn name(&self) -> &'static str;

    /// Lowercase extensions without the dot.
    fn extensions(&self) -> &'static [&'static str];

    /// Extract text, one entry per page.
    fn extract(&self, path: &Path) -> AppResult<Vec<String>>;
}

/// Built-in extractors for text, markdown, HTML, source code and PDF.
pub fn default_extractors() -> Vec<Arc<dyn FormatExtractor>> {
    vec![
        Arc::new(PlainTextExtractor),
        Arc::new(MarkdownExtractor),
        Arc::new(HtmlExtractor),
        Arc::new(CodeExtractor),
        Arc::new(PdfExtractor),
    ]
}

pub struct PlainTextExtractor;

impl FormatExtractor for PlainTextExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["txt", "text", "log", "csv", "rst"]
    }

    fn extract(&self, path: &Path) -> AppResult<Vec<String>> {
        Ok(split_pages(&read_text(path)?))
    }
}

pub struct MarkdownExtractor;

impl FormatExtractor for MarkdownExtractor {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["md", "markdown"]
    }

    fn extract(&self, path: &Path) -> AppResult<Vec<String>> {
        let raw = read_text(path)?;
        Ok(split_pages(&raw).iter().map(|p| clean_markdown(p)).collect())
    }
}

pub struct HtmlExtractor;

impl FormatExtractor for HtmlExtractor {
    fn name(&self) -> &'static str {
        "html"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["html", "htm"]
    }

    fn extract(&self, path: &Path) -> AppResult<Vec<String>> {
        Ok(vec![clean_html(&read_text(path)?)])
    }
}

pub struct CodeExtractor;

impl FormatExtractor for CodeExtractor {
    fn name(&self) -> &'static str {
        "code"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[
            "rs", "py", "js", "ts", "go", "c", "cpp", "h", "java", "sh", "toml", "json", "yaml",
            "yml",
        ]
    }

    fn extract(&self, path: &Path) -> AppResult<Vec<String>> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        Ok(vec![clean_code(&read_text(path)?, &extension)])
    }
}

pub struct PdfExtractor;

impl FormatExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["pdf"]
    }

    fn extract(&self, path: &Path) -> AppResult<Vec<String>> {
        let bytes = fs::read(path).map_err(|e| AppError::load(path, e.to_string()))?;
        // pdf-extract panics on some malformed fonts.
        let text = match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes)) {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                return Err(AppError::load(path, format!("PDF extraction failed: {}", e)))
            }
            Err(_) => {
                tracing::warn!(path = %path.display(), "pdf-extract panicked");
                return Err(AppError::load(path, "PDF extraction panicked"));
            }
        };

        if text.trim().is_empty() {
            return Err(AppError::load(
                path,
                "PDF contains no extractable text (scanned or image-only?)",
            ));
        }

        Ok(split_pages(&text))
    }
}

fn read_text(path: &Path) -> AppResult<String> {
    let raw = fs::read_to_string(path).map_err(|e| AppError::load(path, e.to_string()))?;
    if !is_likely_text(&raw) {
        return Err(AppError::load(path, "file looks binary"));
    }
    Ok(raw)
}

/// Split on form feeds. Text without any yields one page.
pub fn split_pages(text: &str) -> Vec<String> {
    if !text.contains(PAGE_BREAK) {
        return vec![text.to_string()];
    }
    let mut pages: Vec<String> = text.split(PAGE_BREAK).map(str::to_string).collect();
    // A trailing form feed ends the last page rather than starting a new one.
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Clean markdown by removing excess formatting.
fn clean_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim_start_matches('#').trim();

        // Horizontal rules and code fences carry no text.
        if trimmed.starts_with("---") || trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

/// Strip tags, dropping script and style bodies.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut in_script = false;
    let mut in_style = false;

    for (i, ch) in text.char_indices() {
        if ch == '<' {
            in_tag = true;
            let rest = &text[i..];
            if starts_with_ignore_case(rest, "<script") {
                in_script = true;
            } else if starts_with_ignore_case(rest, "</script") {
                in_script = false;
            } else if starts_with_ignore_case(rest, "<style") {
                in_style = true;
            } else if starts_with_ignore_case(rest, "</style") {
                in_style = false;
            }
        } else if ch == '>' {
            in_tag = false;
            result.push(' ');
        } else if !in_tag && !in_script && !in_style {
            result.push(ch);
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Line comment markers by extension. `#` only where it starts a comment,
/// so Rust attributes and C preprocessor lines survive.
fn line_comment_markers(extension: &str) -> &'static [&'static str] {
    match extension {
        "py" | "sh" | "toml" | "yaml" | "yml" => &["#"],
        "rs" | "js" | "ts" | "go" | "c" | "cpp" | "h" | "java" => &["//"],
        _ => &[],
    }
}

/// Drop blank lines and single-line comments.
fn clean_code(text: &str, extension: &str) -> String {
    let markers = line_comment_markers(extension);
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim();

        if markers.iter().any(|m| trimmed.starts_with(m)) {
            continue;
        }

        if !trimmed.is_empty() {
            result.push_str(trimmed);
            result.push('\n');
        }
    }

    result.trim().to_string()
}

fn is_likely_text(data: &str) -> bool {
    !data.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_pages() {
        assert_eq!(split_pages("one page"), vec!["one page".to_string()]);
        assert_eq!(
            split_pages("first\u{0C}second\u{0C}"),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[test]
    fn test_clean_markdown() {
        let input = "# Header\n\nSome text\n\n```rust\ncode\n```\n\nMore text";
        let output = clean_markdown(input);
        assert!(output.contains("Header"));
        assert!(output.contains("Some text"));
        assert!(output.contains("More text"));
        assert!(!output.contains("```"));
    }

    #[test]
    fn test_clean_html() {
        let input = "<html><head><style>p{}</style></head><body><p>Hello <b>world</b></p><SCRIPT>x()</SCRIPT></body></html>";
        assert_eq!(clean_html(input), "Hello world");
    }

    #[test]
    fn test_clean_html_multibyte() {
        assert_eq!(clean_html("<p>café</p><p>naïve</p>"), "café naïve");
    }

    #[test]
    fn test_clean_code() {
        let input = "// Comment\nfn main() {\n    println!(\"hello\");\n}";
        let output = clean_code(input, "rs");
        assert!(!output.contains("// Comment"));
        assert!(output.contains("fn main()"));
    }

    #[test]
    fn test_clean_code_keeps_hash_lines_where_they_are_code() {
        let rust = clean_code("#[derive(Debug)]\n// note\nstruct Block;", "rs");
        assert_eq!(rust, "#[derive(Debug)]\nstruct Block;");

        let c = clean_code("#include <stdio.h>\nint main() {}", "c");
        assert!(c.starts_with("#include <stdio.h>"));

        let python = clean_code("# setup\nimport os\n// not a comment here", "py");
        assert_eq!(python, "import os\n// not a comment here");
    }

    #[test]
    fn test_code_extractor_reads_attributes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lib.RS");
        std::fs::write(&path, "#[cfg(test)]\nmod tests {}\n").unwrap();
        let pages = CodeExtractor.extract(&path).unwrap();
        assert_eq!(pages, vec!["#[cfg(test)]\nmod tests {}".to_string()]);
    }

    #[test]
    fn test_binary_text_file_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blob.txt");
        std::fs::write(&path, b"abc\0def").unwrap();
        let err = PlainTextExtractor.extract(&path).unwrap_err();
        assert!(matches!(err, AppError::Load { .. }));
    }

    #[test]
    fn test_invalid_pdf_is_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf").unwrap();
        let err = PdfExtractor.extract(&path).unwrap_err();
        assert!(matches!(err, AppError::Load { .. }));
    }
}
