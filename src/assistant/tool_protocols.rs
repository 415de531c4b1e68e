//! [`ToolProtocol`] implementation exposing the library and web tools to the agent.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::error::Error;

use crate::tool_protocol::{
    required_str, ToolError, ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol,
    ToolResult,
};
use crate::tools::{LibraryTools, WebSearchTool};

pub const SEARCH_LIBRARY: &str = "search_library";
pub const READ_DOCUMENT: &str = "read_document";
pub const WEB_SEARCH: &str = "web_search";

pub struct PipingToolProtocol {
    library: LibraryTools,
    web: WebSearchTool,
}

impl PipingToolProtocol {
    pub fn new(library: LibraryTools, web: WebSearchTool) -> Self {
        Self { library, web }
    }

    fn catalogue() -> Vec<ToolMetadata> {
        vec![
            ToolMetadata::new(
                SEARCH_LIBRARY,
                "Search the project PDF library for files whose name contains a keyword. \
                 Returns up to 20 matching filenames.",
            )
            .with_parameter(
                ToolParameter::new("keyword", ToolParameterType::String)
                    .with_description("Part of the filename, e.g. 'line list' or 'PS-001'")
                    .required(),
            ),
            ToolMetadata::new(
                READ_DOCUMENT,
                "Download a PDF from the library and return its text, tagged with document \
                 name and page number.",
            )
            .with_parameter(
                ToolParameter::new("filename", ToolParameterType::String)
                    .with_description("Filename as returned by search_library")
                    .required(),
            ),
            ToolMetadata::new(
                WEB_SEARCH,
                "Search the public web. Returns up to 5 results as title and link.",
            )
            .with_parameter(
                ToolParameter::new("query", ToolParameterType::String)
                    .with_description("Free-text search query")
                    .required(),
            ),
        ]
    }
}

#[async_trait]
impl ToolProtocol for PipingToolProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: JsonValue,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        log::debug!("executing {} with {}", tool_name, parameters);
        let output = match tool_name {
            SEARCH_LIBRARY => {
                let keyword = required_str(&parameters, "keyword")?;
                self.library.search(keyword).await
            }
            READ_DOCUMENT => {
                let filename = required_str(&parameters, "filename")?;
                self.library.read(filename).await
            }
            WEB_SEARCH => {
                let query = required_str(&parameters, "query")?;
                self.web.search(query).await
            }
            other => return Err(Box::new(ToolError::NotFound(other.to_string()))),
        };
        Ok(ToolResult::text(output))
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(Self::catalogue())
    }

    fn protocol_name(&self) -> &str {
        "piping"
    }
}
