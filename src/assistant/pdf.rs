//! PDF text extraction.
//!
//! Thin layer over `lopdf`: parse the bytes, pull text out page by page, and offer the
//! two renderings the front ends need (plain concatenation for document chat,
//! page-tagged text for library reads).

use lopdf::Document;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("not a readable PDF: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("the PDF has no pages")]
    NoPages,
}

/// Text pulled out of a PDF, one entry per extracted page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPdf {
    /// Text of the extracted pages, in page order.
    pub pages: Vec<String>,
    /// Number of pages in the document, including any past the extraction limit.
    pub page_count: usize,
}

impl ExtractedPdf {
    /// All extracted pages concatenated.
    pub fn full_text(&self) -> String {
        self.pages.concat()
    }

    /// Pages prefixed with `[Document: <name> | Page <n>]` tags.
    pub fn tagged_text(&self, document_name: &str) -> String {
        let mut out = String::new();
        for (idx, page) in self.pages.iter().enumerate() {
            out.push_str(&format!(
                "[Document: {} | Page {}]\n{}\n\n",
                document_name,
                idx + 1,
                page.trim_end()
            ));
        }
        out
    }

    pub fn is_truncated(&self) -> bool {
        self.pages.len() < self.page_count
    }
}

/// Extract text from PDF bytes, stopping after `max_pages` pages when given.
///
/// A page whose content stream cannot be decoded contributes an empty string rather
/// than failing the whole document.
pub fn extract_pages(bytes: &[u8], max_pages: Option<usize>) -> Result<ExtractedPdf, PdfError> {
    let document = Document::load_mem(bytes)?;
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    if page_numbers.is_empty() {
        return Err(PdfError::NoPages);
    }

    let take = max_pages.unwrap_or(page_numbers.len()).min(page_numbers.len());
    let mut pages = Vec::with_capacity(take);
    for page_number in &page_numbers[..take] {
        match document.extract_text(&[*page_number]) {
            Ok(text) => pages.push(text),
            Err(err) => {
                log::warn!("skipping text of page {}: {}", page_number, err);
                pages.push(String::new());
            }
        }
    }

    log::debug!(
        "extracted {} of {} pages ({} chars)",
        pages.len(),
        page_numbers.len(),
        pages.iter().map(|p| p.len()).sum::<usize>()
    );

    Ok(ExtractedPdf {
        pages,
        page_count: page_numbers.len(),
    })
}

/// Read and extract a PDF from disk.
pub fn extract_file(path: &Path, max_pages: Option<usize>) -> Result<ExtractedPdf, PdfError> {
    let bytes = std::fs::read(path).map_err(|source| PdfError::Io {
        path: path.display().to_string(),
        source,
    })?;
    extract_pages(&bytes, max_pages)
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Build an in-memory PDF with one page per entry of `pages`.
    pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }
}
