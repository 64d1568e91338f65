
use std::path::{Path, PathBuf};

use anyhow::Context;
use lopdf::Document;
use tracing::{debug, info, warn};

use crate::{PdfChatError, Result};

/// Extracted text of one PDF page
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    /// The page text, trimmed
    pub text: String,
    /// File name of the source document
    pub source_file: String,
    /// Human-facing page label (1-based page number)
    pub page_label: String,
}

/// Load a corpus from a mix of PDF file paths and directory paths.
///
/// Directories contribute every `*.pdf` beneath them, recursively. Missing
/// paths fail fast before any extraction work begins.
#[inline]
pub fn load_corpus(inputs: &[PathBuf]) -> Result<Vec<PageText>> {
    for input in inputs {
        if !input.exists() {
            return Err(PdfChatError::NotFound(input.clone()));
        }
    }

    let files = discover_pdf_files(inputs)?;
    let mut pages = Vec::new();
    for file in &files {
        pages.extend(extract_page_texts(file)?);
    }

    info!("Loaded {} pages from {} file(s)", pages.len(), files.len());
    Ok(pages)
}

/// Resolve input paths to a sorted, deduplicated list of PDF files
#[inline]
pub fn discover_pdf_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            collect_pdfs_in_dir(input, &mut files)?;
        } else {
            files.push(input.clone());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn collect_pdfs_in_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        if path.is_dir() {
            collect_pdfs_in_dir(&path, files)?;
        } else if is_pdf(&path) {
            files.push(path);
        }
    }

    Ok(())
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Extract one `PageText` per non-empty page of a PDF file.
///
/// Pages that fail to extract are skipped with a warning; a file that cannot
/// be parsed at all is an error.
#[inline]
pub fn extract_page_texts(path: &Path) -> Result<Vec<PageText>> {
    let source_file = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

    let document = Document::load(path)
        .with_context(|| format!("failed to parse PDF {}", path.display()))?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().keys() {
        match document.extract_text(&[*page_number]) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("Skipping empty page {} of {}", page_number, source_file);
                    continue;
                }
                pages.push(PageText {
                    text: text.to_string(),
                    source_file: source_file.clone(),
                    page_label: page_number.to_string(),
                });
            }
            Err(e) => {
                warn!(
                    "Failed to extract text from page {} of {}: {}",
                    page_number, source_file, e
                );
            }
        }
    }

    debug!("Extracted {} non-empty pages from {}", pages.len(), source_file);
    Ok(pages)
}
