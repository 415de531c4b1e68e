//! The tools offered to the library agent.
//!
//! - [`LibraryTools`] - search the PDF library by filename and read a document
//! - [`WebSearchTool`] - public web search
//!
//! They are exposed to the model through
//! [`PipingToolProtocol`](crate::tool_protocols::PipingToolProtocol).

pub mod library;
pub mod web;

pub use library::LibraryTools;
pub use web::WebSearchTool;
