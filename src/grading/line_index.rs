use crate::model::{NormalizedLine, RecognizedDocument};

use super::normalize::normalize;

const PAGE_BREAK: char = '\u{000C}';

/// Splits a recognized document into normalized, non-empty lines.
///
/// `index` counts every source line, blank ones included, so it stays a stable tie-break key.
pub fn build_index(document: &RecognizedDocument) -> Vec<NormalizedLine> {
    let pages = document_pages(document);

    let mut lines = Vec::new();
    let mut ordinal = 0usize;
    for (page_index, page) in pages.iter().enumerate() {
        for raw_line in page.lines() {
            let text = normalize(raw_line);
            if !text.is_empty() {
                lines.push(NormalizedLine {
                    index: ordinal,
                    page: page_index + 1,
                    text,
                });
            }
            ordinal += 1;
        }
    }

    lines
}

fn document_pages(document: &RecognizedDocument) -> Vec<&str> {
    let sources: Vec<&str> = if document.pages.is_empty() {
        vec![document.raw_text.as_str()]
    } else {
        document.pages.iter().map(String::as_str).collect()
    };

    sources
        .into_iter()
        .flat_map(|source| source.split(PAGE_BREAK))
        .collect()
}

/// Whole-document view used by blob matching.
pub fn blob_text(lines: &[NormalizedLine]) -> String {
    lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<&str>>()
        .join(" ")
}
