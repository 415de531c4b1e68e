use std::sync::Arc;

use crate::web_search::WebSearch;

/// Web search formatted for the model.
pub struct WebSearchTool {
    provider: Arc<dyn WebSearch>,
    max_results: usize,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn WebSearch>, max_results: usize) -> Self {
        Self {
            provider,
            max_results,
        }
    }

    pub async fn search(&self, query: &str) -> String {
        match self.provider.search(query, self.max_results).await {
            Ok(hits) if hits.is_empty() => format!("No web results found for '{}'.", query),
            Ok(hits) => {
                let mut out = format!("Web results for '{}':\n", query);
                for hit in hits.iter().take(self.max_results) {
                    out.push_str(&format!("- {}: {}\n", hit.title, hit.url));
                }
                out
            }
            Err(err) => {
                log::warn!("web search for '{}' failed: {}", query, err);
                format!("Web search failed: {}", err)
            }
        }
    }
}
