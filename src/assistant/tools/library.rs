//! Library tools: find PDFs by filename and read one of them.
//!
//! Both operations always produce text for the model. Failures are folded into that
//! text instead of being returned as errors.

use std::sync::Arc;

use crate::config::Limits;
use crate::drive::{find_pdf, DriveApi, NameQuery};
use crate::pdf::{extract_pages, truncate_chars};
use crate::session::LoadedDocuments;

pub struct LibraryTools {
    drive: Arc<dyn DriveApi>,
    loaded: LoadedDocuments,
    search_result_limit: usize,
    read_page_limit: usize,
    read_char_limit: usize,
}

impl LibraryTools {
    pub fn new(drive: Arc<dyn DriveApi>, loaded: LoadedDocuments, limits: &Limits) -> Self {
        Self {
            drive,
            loaded,
            search_result_limit: limits.search_result_limit,
            read_page_limit: limits.read_page_limit,
            read_char_limit: limits.read_char_limit,
        }
    }

    /// List PDFs whose name contains `keyword`, one `- <name>` line each.
    pub async fn search(&self, keyword: &str) -> String {
        let files = match self
            .drive
            .search_pdfs(
                &NameQuery::Contains(keyword.to_string()),
                self.search_result_limit,
            )
            .await
        {
            Ok(files) => files,
            Err(err) => {
                log::warn!("library search for '{}' failed: {}", keyword, err);
                return format!("Library search failed: {}", err);
            }
        };

        if files.is_empty() {
            return format!("No PDF files found matching '{}'.", keyword);
        }

        let mut out = String::new();
        for file in files.iter().take(self.search_result_limit) {
            out.push_str("- ");
            out.push_str(&file.name);
            out.push('\n');
        }
        out
    }

    /// Resolve `filename`, download it and return its page-tagged text.
    pub async fn read(&self, filename: &str) -> String {
        if self.loaded.contains(filename).await {
            return already_loaded(filename);
        }

        let file = match find_pdf(self.drive.as_ref(), filename).await {
            Ok(Some(file)) => file,
            Ok(None) => return format!("File not found: '{}'.", filename),
            Err(err) => {
                log::warn!("lookup of '{}' failed: {}", filename, err);
                return format!("Failed to read '{}': {}", filename, err);
            }
        };

        // The approximate name may resolve to a file read earlier under its full name.
        if file.name != filename && self.loaded.contains(&file.name).await {
            return already_loaded(&file.name);
        }

        let bytes = match self.drive.download(&file.id).await {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("download of '{}' failed: {}", file.name, err);
                return format!("Failed to read '{}': {}", file.name, err);
            }
        };

        let pdf = match extract_pages(&bytes, Some(self.read_page_limit)) {
            Ok(pdf) => pdf,
            Err(err) => {
                log::warn!("extraction of '{}' failed: {}", file.name, err);
                return format!("Failed to read '{}': {}", file.name, err);
            }
        };

        let tagged = pdf.tagged_text(&file.name);
        let text = truncate_chars(&tagged, self.read_char_limit);
        if text.len() < tagged.len() || pdf.is_truncated() {
            log::info!(
                "'{}' cut to {} of {} pages / {} chars",
                file.name,
                pdf.pages.len(),
                pdf.page_count,
                self.read_char_limit
            );
        }

        self.loaded.insert(file.name.clone()).await;
        text.to_string()
    }
}

fn already_loaded(name: &str) -> String {
    format!(
        "Document '{}' is already loaded in this conversation; use the text returned earlier.",
        name
    )
}
