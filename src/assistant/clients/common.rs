use crate::client_wrapper::{Message, TokenUsage};
use openai_rust::chat;
use openai_rust2 as openai_rust;
use std::error::Error;
use tokio::sync::Mutex;

/// Failure talking to a chat-completions endpoint.
#[derive(Debug, thiserror::Error)]
#[error("LLM request failed: {0}")]
pub struct ClientError(pub String);

/// Convert our messages into the wire format expected by `openai_rust`.
pub fn to_chat_messages(messages: &[Message]) -> Vec<chat::Message> {
    let mut formatted = Vec::with_capacity(messages.len());
    for msg in messages {
        formatted.push(chat::Message {
            role: msg.role.as_str().to_owned(),
            content: msg.content.clone(),
        });
    }
    formatted
}

/// Send a chat request, record its usage, and return the assistant's content.
pub async fn send_and_track(
    api: &openai_rust::Client,
    model: &str,
    formatted_msgs: Vec<chat::Message>,
    url_path: Option<String>,
    usage_slot: &Mutex<Option<TokenUsage>>,
) -> Result<String, Box<dyn Error + Send + Sync>> {
    let chat_arguments = chat::ChatArguments::new(model, formatted_msgs);

    let response = match api.create_chat(chat_arguments, url_path).await {
        Ok(response) => response,
        Err(err) => {
            log::error!("send_and_track: chat completion error from {}: {}", model, err);
            return Err(Box::new(ClientError(err.to_string())));
        }
    };

    let usage = TokenUsage {
        input_tokens: response.usage.prompt_tokens as usize,
        output_tokens: response.usage.completion_tokens as usize,
        total_tokens: response.usage.total_tokens as usize,
    };
    log::debug!(
        "{}: {} input / {} output tokens",
        model,
        usage.input_tokens,
        usage.output_tokens
    );
    *usage_slot.lock().await = Some(usage);

    match response.choices.first() {
        Some(choice) => Ok(choice.message.content.clone()),
        None => Err(Box::new(ClientError(
            "response contained no choices".to_string(),
        ))),
    }
}
