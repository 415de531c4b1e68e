//! # Piping Assistant
//!
//! A chat assistant for piping engineers, backed by Google Gemini.
//!
//! Two front ends share one session model:
//!
//! * **Document chat** ([`DocumentChat`]): load a local PDF, its text is extracted and sent
//!   with every question.
//! * **Library agent** ([`Agent`]): the model is offered three tools (search the Drive PDF
//!   library by filename, read a PDF from it, search the web) and an explicit dispatch loop
//!   runs whatever it asks for before it answers.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use piping_assistant::clients::gemini::GeminiClient;
//! use piping_assistant::config::Limits;
//! use piping_assistant::session::ChatSession;
//! use piping_assistant::DocumentChat;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(GeminiClient::new_with_model_string(
//!     &std::env::var("GEMINI_API_KEY")?,
//!     "gemini-2.5-flash",
//! ));
//! let mut chat = DocumentChat::new(client, ChatSession::new("General"), Limits::default());
//! chat.load_pdf_file(std::path::Path::new("PS-001 Piping Spec.pdf"))?;
//! println!("{}", chat.ask("What is the corrosion allowance for carbon steel?").await?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Tools
//!
//! The agent reaches its tools through [`tool_protocol::ToolRegistry`], populated from a
//! [`tool_protocol::ToolProtocol`]. [`tool_protocols::PipingToolProtocol`] is the one the
//! binary wires up; tests plug in their own.

use std::sync::Once;

static INIT_LOGGER: Once = Once::new();

/// Initialise the global [`env_logger`] subscriber exactly once.
///
/// ```rust
/// piping_assistant::init_logger();
/// log::info!("Logger is ready");
/// ```
pub fn init_logger() {
    INIT_LOGGER.call_once(|| {
        env_logger::init();
    });
}

/// Like [`init_logger`], but `default_level` applies when `RUST_LOG` is unset.
pub fn init_logger_with_default(default_level: &str) {
    INIT_LOGGER.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .init();
    });
}

pub mod assistant;

pub use assistant::agent;
pub use assistant::agent::{Agent, AgentResponse};
pub use assistant::auth;
pub use assistant::client_wrapper;
pub use assistant::client_wrapper::{ClientWrapper, Message, Role, TokenUsage};
pub use assistant::clients;
pub use assistant::config;
pub use assistant::config::AssistantConfig;
pub use assistant::console;
pub use assistant::document_chat;
pub use assistant::document_chat::DocumentChat;
pub use assistant::drive;
pub use assistant::pdf;
pub use assistant::prompt;
pub use assistant::session;
pub use assistant::session::ChatSession;
pub use assistant::tool_protocol;
pub use assistant::tool_protocols;
pub use assistant::tools;
pub use assistant::web_search;
