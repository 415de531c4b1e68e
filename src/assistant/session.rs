//! Per-session state.
//!
//! Everything here lives in memory for the lifetime of one interactive session and is
//! dropped (or explicitly reset) afterwards. Nothing is persisted.

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::client_wrapper::Role;

/// One rendered line of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

/// Ordered, append-only user/assistant transcript.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<ChatTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn {
            role: Role::User,
            text: text.into(),
        });
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(ChatTurn {
            role: Role::Assistant,
            text: text.into(),
        });
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Filenames already fetched from the library in this session.
///
/// Cloning yields another handle onto the same set, so the session and the document
/// read tool observe the same bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct LoadedDocuments {
    names: Arc<RwLock<BTreeSet<String>>>,
}

impl LoadedDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a filename; returns `false` if it was already present.
    pub async fn insert(&self, name: impl Into<String>) -> bool {
        self.names.write().await.insert(name.into())
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.names.read().await.contains(name)
    }

    /// Sorted snapshot for display.
    pub async fn names(&self) -> Vec<String> {
        self.names.read().await.iter().cloned().collect()
    }

    pub async fn is_empty(&self) -> bool {
        self.names.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.names.write().await.clear();
    }
}

/// Text of the most recently uploaded local PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub name: String,
    pub text: String,
    pub page_count: usize,
}

/// State of one interactive session, shared by both front ends.
#[derive(Debug, Clone)]
pub struct ChatSession {
    project: String,
    history: ConversationHistory,
    loaded_documents: LoadedDocuments,
    document: Option<LoadedDocument>,
}

impl ChatSession {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            history: ConversationHistory::new(),
            loaded_documents: LoadedDocuments::new(),
            document: None,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn set_project(&mut self, project: impl Into<String>) {
        self.project = project.into();
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut ConversationHistory {
        &mut self.history
    }

    /// Handle onto the loaded-document set, for the document read tool.
    pub fn loaded_documents(&self) -> &LoadedDocuments {
        &self.loaded_documents
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    /// Replace the uploaded document; the most recent upload wins.
    pub fn set_document(&mut self, document: LoadedDocument) {
        self.document = Some(document);
    }

    /// Forget the conversation and every loaded document. The project is kept.
    pub async fn reset(&mut self) {
        self.history.clear();
        self.loaded_documents.clear().await;
        self.document = None;
    }
}
