//! Document chat: upload one PDF and ask questions about it.
//!
//! Every question is a single-message completion carrying the expert instructions,
//! the active project, the document text and the question. Earlier turns are shown to
//! the user but are not sent to the model.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use crate::client_wrapper::{ClientWrapper, Message};
use crate::config::Limits;
use crate::pdf::{extract_file, extract_pages, ExtractedPdf, PdfError};
use crate::prompt::build_document_prompt;
use crate::session::{ChatSession, LoadedDocument};

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("could not read the PDF: {0}")]
    Pdf(#[from] PdfError),
    #[error("model call failed: {0}")]
    Llm(#[source] Box<dyn Error + Send + Sync>),
}

pub struct DocumentChat {
    client: Arc<dyn ClientWrapper>,
    session: ChatSession,
    limits: Limits,
}

impl DocumentChat {
    pub fn new(client: Arc<dyn ClientWrapper>, session: ChatSession, limits: Limits) -> Self {
        Self {
            client,
            session,
            limits,
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn model_name(&self) -> &str {
        self.client.model_name()
    }

    pub fn set_project(&mut self, project: impl Into<String>) {
        self.session.set_project(project);
    }

    /// Extract `bytes` and make it the active document. Returns the page count.
    ///
    /// On error the previously loaded document, if any, stays active.
    pub fn load_pdf_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<usize, ChatError> {
        let pdf = extract_pages(bytes, None)?;
        Ok(self.install(name, pdf))
    }

    pub fn load_pdf_file(&mut self, path: &Path) -> Result<usize, ChatError> {
        let pdf = extract_file(path, None)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(self.install(&name, pdf))
    }

    fn install(&mut self, name: &str, pdf: ExtractedPdf) -> usize {
        let text = pdf.full_text();
        if text.trim().is_empty() {
            log::warn!("'{}' has no extractable text (scanned drawing?)", name);
        }
        log::info!("loaded '{}': {} pages, {} chars", name, pdf.page_count, text.chars().count());
        self.session.set_document(LoadedDocument {
            name: name.to_string(),
            text,
            page_count: pdf.page_count,
        });
        pdf.page_count
    }

    /// Ask a question about the active document, or from general knowledge if none
    /// is loaded.
    pub async fn ask(&mut self, question: &str) -> Result<String, ChatError> {
        self.session.history_mut().push_user(question);

        let prompt = build_document_prompt(
            self.session.project(),
            self.session.document().map(|d| d.text.as_str()),
            question,
            self.limits.upload_char_limit,
        );
        log::debug!("document prompt is {} chars", prompt.chars().count());

        let reply = self
            .client
            .send_message(&[Message::user(prompt)])
            .await
            .map_err(ChatError::Llm)?;

        self.session.history_mut().push_assistant(reply.content.clone());
        Ok(reply.content)
    }

    /// Clear the document and the conversation.
    pub async fn reset(&mut self) {
        self.session.reset().await;
    }
}
