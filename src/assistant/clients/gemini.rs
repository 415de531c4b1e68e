use crate::client_wrapper::{ClientWrapper, Message, Role, TokenUsage};
use crate::clients::common::{send_and_track, to_chat_messages};
use crate::clients::http_pool::get_http_client;
use async_trait::async_trait;
use log::{debug, error, warn};
use openai_rust2 as openai_rust;
use serde::Deserialize;
use std::collections::HashSet;
use std::error::Error;
use tokio::sync::Mutex;

/// OpenAI-compatible surface of the Gemini API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
/// Native Gemini REST root, used for model listing.
pub const DEFAULT_API_ROOT: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiClient {
    client: openai_rust::Client,
    chat_path: String,
    pub model: String,
    token_usage: Mutex<Option<TokenUsage>>,
}

impl GeminiClient {
    pub fn new_with_model_string(secret_key: &str, model_name: &str) -> Self {
        Self::new_with_base_url(secret_key, model_name, DEFAULT_BASE_URL)
    }

    /// Create a client against a custom OpenAI-compatible base URL.
    /// The default base URL is "<https://generativelanguage.googleapis.com/v1beta/openai/>".
    pub fn new_with_base_url(secret_key: &str, model_name: &str, base_url: &str) -> Self {
        GeminiClient {
            client: openai_rust::Client::new_with_base_url(secret_key, base_url),
            chat_path: chat_completions_path(base_url),
            model: model_name.to_string(),
            token_usage: Mutex::new(None),
        }
    }
}

/// Absolute request path of the chat completions endpoint under `base_url`.
fn chat_completions_path(base_url: &str) -> String {
    let path = reqwest::Url::parse(base_url)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| "/v1beta/openai/".to_string());
    format!("{}/chat/completions", path.trim_end_matches('/'))
}

#[async_trait]
impl ClientWrapper for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn send_message(
        &self,
        messages: &[Message],
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let result = send_and_track(
            &self.client,
            &self.model,
            to_chat_messages(messages),
            Some(self.chat_path.clone()),
            &self.token_usage,
        )
        .await;

        match result {
            Ok(content) => Ok(Message {
                role: Role::Assistant,
                content,
            }),
            Err(err) => {
                if log::log_enabled!(log::Level::Error) {
                    error!("GeminiClient::send_message error: {}", err);
                }
                Err(err)
            }
        }
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}

/// One entry of the Gemini `models.list` response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Resource name, e.g. `models/gemini-2.5-flash`.
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// Name without the `models/` prefix.
    pub fn id(&self) -> &str {
        self.name.strip_prefix("models/").unwrap_or(&self.name)
    }

    pub fn can_generate(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
    next_page_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ModelSelectionError {
    #[error("no available Gemini model (preferred: {0})")]
    NoAvailableModel(String),
    #[error("failed to list Gemini models: {0}")]
    Listing(String),
}

const MAX_MODEL_PAGES: usize = 20;

/// List the models this API key can see.
///
/// Paging stops on an empty token, a token already seen, or after
/// `MAX_MODEL_PAGES` pages.
pub async fn list_models(
    api_key: &str,
    api_root: &str,
) -> Result<Vec<ModelInfo>, ModelSelectionError> {
    let http = get_http_client(api_root).map_err(|e| ModelSelectionError::Listing(e.to_string()))?;
    let url = format!("{}/v1beta/models", api_root.trim_end_matches('/'));

    let mut models = Vec::new();
    let mut page_token: Option<String> = None;
    let mut seen_tokens = HashSet::new();
    for _ in 0..MAX_MODEL_PAGES {
        let mut request = http
            .get(&url)
            .query(&[("key", api_key), ("pageSize", "1000")]);
        if let Some(token) = &page_token {
            request = request.query(&[("pageToken", token.as_str())]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ModelSelectionError::Listing(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelSelectionError::Listing(format!("HTTP {}: {}", status, body)));
        }
        let page: ListModelsResponse = response
            .json()
            .await
            .map_err(|e| ModelSelectionError::Listing(e.to_string()))?;

        models.extend(page.models);
        match page.next_page_token {
            Some(token) if !token.is_empty() => {
                if !seen_tokens.insert(token.clone()) {
                    warn!("model listing repeated page token '{}'; stopping", token);
                    page_token = None;
                    break;
                }
                page_token = Some(token);
            }
            _ => {
                page_token = None;
                break;
            }
        }
    }
    if page_token.is_some() {
        warn!("model listing truncated after {} pages", MAX_MODEL_PAGES);
    }

    debug!("Gemini reports {} models", models.len());
    Ok(models)
}

/// Pick the first preferred model that is available, falling back to any other
/// Gemini model that supports content generation.
pub fn select_model(available: &[ModelInfo], preferred: &[String]) -> Option<String> {
    for wanted in preferred {
        if available
            .iter()
            .any(|m| m.can_generate() && m.id() == wanted.as_str())
        {
            return Some(wanted.clone());
        }
    }

    available
        .iter()
        .find(|m| m.can_generate() && m.id().starts_with("gemini"))
        .map(|m| m.id().to_string())
}

/// Resolve which model to talk to at startup.
///
/// A listing that succeeds but offers nothing usable is fatal. A listing that fails is
/// not: the first preferred model is used as-is and the chat call will surface any error.
pub async fn resolve_model(
    api_key: &str,
    api_root: &str,
    preferred: &[String],
) -> Result<String, ModelSelectionError> {
    match list_models(api_key, api_root).await {
        Ok(models) => select_model(&models, preferred)
            .ok_or_else(|| ModelSelectionError::NoAvailableModel(preferred.join(", "))),
        Err(err) => {
            warn!("{}; using the first preferred model", err);
            preferred
                .first()
                .cloned()
                .ok_or_else(|| ModelSelectionError::NoAvailableModel(String::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn info(name: &str, methods: &[&str]) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            supported_generation_methods: methods.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn preferred() -> Vec<String> {
        vec!["gemini-2.5-flash".to_string(), "gemini-1.5-flash".to_string()]
    }

    #[test]
    fn chat_path_follows_base_url() {
        assert_eq!(
            chat_completions_path(DEFAULT_BASE_URL),
            "/v1beta/openai/chat/completions"
        );
        assert_eq!(
            chat_completions_path("http://127.0.0.1:9000/proxy"),
            "/proxy/chat/completions"
        );
    }

    #[test]
    fn first_preferred_model_wins() {
        let available = vec![
            info("models/gemini-1.5-flash", &["generateContent"]),
            info("models/gemini-2.5-flash", &["generateContent", "countTokens"]),
        ];
        assert_eq!(
            select_model(&available, &preferred()),
            Some("gemini-2.5-flash".to_string())
        );
    }

    #[test]
    fn falls_back_to_second_preference() {
        let available = vec![
            info("models/embedding-001", &["embedContent"]),
            info("models/gemini-1.5-flash", &["generateContent"]),
        ];
        assert_eq!(
            select_model(&available, &preferred()),
            Some("gemini-1.5-flash".to_string())
        );
    }

    #[test]
    fn any_generating_gemini_model_is_last_resort() {
        let available = vec![
            info("models/gemini-2.5-flash", &["embedContent"]),
            info("models/gemini-2.0-flash", &["generateContent"]),
        ];
        assert_eq!(
            select_model(&available, &preferred()),
            Some("gemini-2.0-flash".to_string())
        );
    }

    #[test]
    fn nothing_usable_selects_nothing() {
        let available = vec![info("models/text-embedding-004", &["embedContent"])];
        assert_eq!(select_model(&available, &preferred()), None);
    }

    #[tokio::test]
    async fn resolve_model_reads_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .and(query_param("key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    {"name": "models/gemini-1.5-flash", "supportedGenerationMethods": ["generateContent"]}
                ]
            })))
            .mount(&server)
            .await;

        let model = resolve_model("k", &server.uri(), &preferred()).await.unwrap();
        assert_eq!(model, "gemini-1.5-flash");
    }

    #[tokio::test]
    async fn listing_stops_when_page_token_repeats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    {"name": "models/gemini-2.5-flash", "supportedGenerationMethods": ["generateContent"]}
                ],
                "nextPageToken": "same-token"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let models = list_models("k", &server.uri()).await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].id(), "gemini-2.5-flash");
    }

    #[tokio::test]
    async fn resolve_model_fails_when_listing_has_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
            .mount(&server)
            .await;

        let err = resolve_model("k", &server.uri(), &preferred())
            .await
            .unwrap_err();
        assert!(matches!(err, ModelSelectionError::NoAvailableModel(_)));
    }

    #[tokio::test]
    async fn resolve_model_tolerates_listing_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let model = resolve_model("k", &server.uri(), &preferred()).await.unwrap();
        assert_eq!(model, "gemini-2.5-flash");
    }
}
