//! Single-shot (non-streaming) chat completion against Ollama or an
//! OpenAI-compatible API. Shared by translation and answer generation.

use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::CapabilityError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Send `messages` and return the assistant's reply.
pub async fn complete(
    client: &reqwest::Client,
    config: &LlmConfig,
    capability: &'static str,
    messages: &[ChatMessage],
    temperature: f32,
) -> Result<String, CapabilityError> {
    match config.provider.as_str() {
        "ollama" => call_ollama(client, config, capability, messages, temperature).await,
        "openai" => call_openai(client, config, capability, messages, temperature).await,
        other => Err(CapabilityError::permanent(
            capability,
            format!("unknown LLM provider: {other}"),
        )),
    }
}

// ─── Ollama ──────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

async fn call_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    capability: &'static str,
    messages: &[ChatMessage],
    temperature: f32,
) -> Result<String, CapabilityError> {
    let url = format!("{}/api/chat", config.base_url.trim_end_matches('/'));

    let req = OllamaChatRequest {
        model: &config.chat_model,
        messages,
        stream: false,
        options: OllamaOptions { temperature },
    };

    let resp = client
        .post(&url)
        .json(&req)
        .send()
        .await
        .map_err(|e| CapabilityError::from_reqwest(capability, e))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(CapabilityError::from_status(capability, status, &body));
    }

    let body: OllamaChatResponse = resp
        .json()
        .await
        .map_err(|e| CapabilityError::from_reqwest(capability, e))?;
    Ok(body.message.content)
}

// ─── OpenAI-compatible ───────────────────────────────────

#[derive(Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

async fn call_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    capability: &'static str,
    messages: &[ChatMessage],
    temperature: f32,
) -> Result<String, CapabilityError> {
    let url = format!("{}/v1/chat/completions", config.base_url.trim_end_matches('/'));
    let api_key = config.api_key.as_deref().unwrap_or_default();

    let req = OpenAiChatRequest {
        model: &config.chat_model,
        messages,
        temperature,
    };

    let resp = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(&req)
        .send()
        .await
        .map_err(|e| CapabilityError::from_reqwest(capability, e))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(CapabilityError::from_status(capability, status, &body));
    }

    let body: OpenAiChatResponse = resp
        .json()
        .await
        .map_err(|e| CapabilityError::from_reqwest(capability, e))?;

    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| CapabilityError::permanent(capability, "response contained no choices"))
}
