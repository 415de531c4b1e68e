pub mod agent;
pub mod auth;
pub mod client_wrapper;
pub mod clients;
pub mod config;
pub mod console;
pub mod document_chat;
pub mod drive;
pub mod pdf;
pub mod prompt;
pub mod session;
pub mod tool_protocol;
pub mod tool_protocols;
pub mod tools;
pub mod web_search;

pub use agent::Agent;
pub use document_chat::DocumentChat;
