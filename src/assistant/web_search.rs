//! Web search provider.
//!
//! [`DuckDuckGoSearch`] queries the keyless DuckDuckGo HTML endpoint and scrapes the
//! result anchors. Only title and URL are kept; ranking is the provider's.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;

use crate::clients::http_pool::get_http_client;

pub const DUCKDUCKGO_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("search provider returned HTTP {0}")]
    Status(u16),
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        SearchError::Request(err.to_string())
    }
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError>;
}

pub struct DuckDuckGoSearch {
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self::new_with_endpoint(DUCKDUCKGO_HTML_ENDPOINT)
    }

    pub fn new_with_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
        }
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, SearchError> {
        let http = get_http_client(&self.endpoint)?;
        let response = http
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }
        let html = response.text().await?;
        let hits = parse_results(&html, max_results);
        log::debug!("web search '{}' returned {} hits", query, hits.len());
        Ok(hits)
    }
}

lazy_static! {
    static ref RESULT_ANCHOR: Regex =
        Regex::new(r#"(?s)<a\s([^>]*class="[^"]*result__a[^"]*"[^>]*)>(.*?)</a>"#)
            .expect("result anchor pattern");
    static ref HREF: Regex = Regex::new(r#"href="([^"]*)""#).expect("href pattern");
    static ref TAG: Regex = Regex::new(r"<[^>]+>").expect("tag pattern");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace pattern");
}

/// Extract up to `max_results` hits from a DuckDuckGo HTML result page.
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for caps in RESULT_ANCHOR.captures_iter(html) {
        if hits.len() >= max_results {
            break;
        }
        let attrs = &caps[1];
        let href = match HREF.captures(attrs) {
            Some(h) => decode_entities(&h[1]),
            None => continue,
        };
        let url = resolve_redirect(&href);
        let title = TAG.replace_all(&caps[2], "");
        let title = WHITESPACE
            .replace_all(decode_entities(&title).trim(), " ")
            .into_owned();
        if url.is_empty() || title.is_empty() {
            continue;
        }
        hits.push(SearchHit { title, url });
    }
    hits
}

/// DuckDuckGo wraps targets as `//duckduckgo.com/l/?uddg=<encoded>&rut=...`.
fn resolve_redirect(href: &str) -> String {
    if let Some(start) = href.find("uddg=") {
        let encoded = &href[start + 5..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    href.to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAGE: &str = r#"
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.asme.org%2Fcodes%2Db31%2D3&amp;rut=abc">ASME <b>B31.3</b> Process Piping</a>
  </h2>
</div>
<div class="result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="https://en.wikipedia.org/wiki/Nominal_Pipe_Size">Nominal Pipe Size &amp; Schedules</a>
  </h2>
</div>
<div class="result">
  <a class="result__a" href="//example.com/flanges">Flange ratings</a>
</div>
"#;

    #[test]
    fn parses_titles_and_urls() {
        let hits = parse_results(PAGE, 5);
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].title, "ASME B31.3 Process Piping");
        assert_eq!(hits[0].url, "https://www.asme.org/codes-b31-3");
        assert_eq!(hits[1].title, "Nominal Pipe Size & Schedules");
        assert_eq!(hits[1].url, "https://en.wikipedia.org/wiki/Nominal_Pipe_Size");
        assert_eq!(hits[2].url, "https://example.com/flanges");
    }

    #[test]
    fn respects_result_cap() {
        assert_eq!(parse_results(PAGE, 2).len(), 2);
        assert!(parse_results("<html>no results</html>", 5).is_empty());
    }

    #[tokio::test]
    async fn search_hits_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .and(query_param("q", "pipe schedule 40"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;

        let search = DuckDuckGoSearch::new_with_endpoint(&format!("{}/html/", server.uri()));
        let hits = search.search("pipe schedule 40", 5).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let search = DuckDuckGoSearch::new_with_endpoint(&format!("{}/html/", server.uri()));
        let err = search.search("x", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::Status(503)));
    }
}
